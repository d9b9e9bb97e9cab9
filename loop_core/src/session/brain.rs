//! Decision seam for autonomous actors.
//!
//! Whatever decides for non-player actors (scripts, a dialogue model, ...)
//! sits behind [`ActorBrain`]. A call is synchronous from the turn loop's
//! point of view; `None` means the actor passes.

use serde::{Deserialize, Serialize};
use world_rules::{CombatEncounter, Registry, ThingId};

/// What an autonomous actor does on its turn outside combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActorDecision {
    Move { direction: String },
    Say(String),
    Attack(ThingId),
}

/// What a participant does on its combat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatDecision {
    Attack(ThingId),
    Flee,
    Pass,
}

pub trait ActorBrain {
    fn decide(&mut self, registry: &Registry, actor: ThingId) -> Option<ActorDecision>;

    /// Defaults to attacking the player.
    fn decide_combat(
        &mut self,
        _registry: &Registry,
        encounter: &CombatEncounter,
        _actor: ThingId,
    ) -> Option<CombatDecision> {
        Some(CombatDecision::Attack(encounter.player))
    }
}

/// Never acts outside combat; fights back when drawn in.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleBrain;

impl ActorBrain for IdleBrain {
    fn decide(&mut self, _registry: &Registry, _actor: ThingId) -> Option<ActorDecision> {
        None
    }
}
