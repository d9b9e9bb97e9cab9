//! Results of combat actions.

use serde::{Deserialize, Serialize};

use crate::entities::ThingId;

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEnd {
    /// Every hostile is down (or some are down and the rest fled).
    Victory,
    PlayerDefeated,
    PlayerFled,
    /// Every hostile fled without any being defeated.
    HostilesFled,
}

/// Lifecycle of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterState {
    Active,
    Ended(CombatEnd),
}

/// Why a combat action was refused. Not an error: the caller narrates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    EncounterOver,
    NotYourTurn { current: Option<ThingId> },
    ActorInactive,
    NotAParticipant,
    TargetDown,
    SelfTarget,
}

impl Rejection {
    /// Short sentence for the player.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::EncounterOver => "The fight is already over.",
            Rejection::NotYourTurn { .. } => "It is not your turn.",
            Rejection::ActorInactive => "You are in no state to act.",
            Rejection::NotAParticipant => "That is not part of this fight.",
            Rejection::TargetDown => "Your foe is already down.",
            Rejection::SelfTarget => "You cannot attack yourself.",
        }
    }
}

/// Either the action was resolved or it was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolution<T> {
    Done(T),
    Rejected(Rejection),
}

impl<T> Resolution<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Resolution::Done(value) => Some(value),
            Resolution::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Resolution::Done(_) => None,
            Resolution::Rejected(rejection) => Some(*rejection),
        }
    }
}

/// What one attack did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attacker: ThingId,
    pub target: ThingId,
    pub hit: bool,
    pub damage_applied: f64,
    pub target_amount: f64,
    pub target_capacity: f64,
    /// Remaining health as a fraction of capacity.
    pub target_volume: f64,
    pub target_defeated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleeOutcome {
    pub actor: ThingId,
    pub escaped: bool,
}
