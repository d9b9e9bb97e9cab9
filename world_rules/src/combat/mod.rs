//! Turn-based combat layered on the registry and the cell algebra.
//!
//! An encounter moves `Active -> Ended(..)`. Every participant, player or
//! not, takes a turn the same way: `attack` / `flee` / `pass`, then
//! `advance_turn`, then `check_end`.

mod outcome;

pub use outcome::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::cells;
use crate::config::RulesConfig;
use crate::entities::{EquipmentSlot, ThingId};
use crate::error::{KernelError, Result};
use crate::mechanics::{ExpressionResolver, ThingAttributes};
use crate::registry::Registry;

/// One combat session scoped to a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEncounter {
    pub location: ThingId,
    pub player: ThingId,
    /// Turn order.
    pub participants: Vec<ThingId>,
    pub defeated: BTreeSet<ThingId>,
    pub fled: BTreeSet<ThingId>,
    pub state: EncounterState,
    pub round: u32,
    health_cell: String,
    turn: usize,
}

impl CombatEncounter {
    /// Whose turn it is, if the encounter is still running.
    pub fn current_actor(&self) -> Option<ThingId> {
        match self.state {
            EncounterState::Active => self.participants.get(self.turn).copied(),
            EncounterState::Ended(_) => None,
        }
    }

    pub fn is_participant(&self, id: ThingId) -> bool {
        self.participants.contains(&id)
    }

    /// Participant neither defeated nor fled.
    pub fn is_active(&self, id: ThingId) -> bool {
        self.is_participant(id) && !self.defeated.contains(&id) && !self.fled.contains(&id)
    }

    pub fn active_participants(&self) -> Vec<ThingId> {
        self.participants
            .iter()
            .copied()
            .filter(|id| self.is_active(*id))
            .collect()
    }

    /// Every participant other than the player.
    pub fn hostiles(&self) -> Vec<ThingId> {
        self.participants
            .iter()
            .copied()
            .filter(|id| *id != self.player)
            .collect()
    }

    pub fn active_hostiles(&self) -> Vec<ThingId> {
        self.hostiles()
            .into_iter()
            .filter(|id| self.is_active(*id))
            .collect()
    }

    pub fn is_over(&self) -> bool {
        matches!(self.state, EncounterState::Ended(_))
    }

    pub fn health_cell(&self) -> &str {
        &self.health_cell
    }

    /// Mark participants that dropped out outside of combat actions:
    /// removed from the registry or spent health counts as defeated,
    /// having left the location counts as fled.
    fn sync(&mut self, registry: &Registry) {
        for id in self.participants.clone() {
            if !self.is_active(id) {
                continue;
            }
            match registry.get(id) {
                None => {
                    self.defeated.insert(id);
                }
                Some(thing) if thing.is_spent(&self.health_cell) => {
                    self.defeated.insert(id);
                }
                Some(_) => {
                    if registry.owning_place(id).ok() != Some(self.location) {
                        self.fled.insert(id);
                    }
                }
            }
        }
    }

    fn validate_turn(&self, actor: ThingId) -> Option<Rejection> {
        if self.is_over() {
            return Some(Rejection::EncounterOver);
        }
        if !self.is_participant(actor) {
            return Some(Rejection::NotAParticipant);
        }
        if !self.is_active(actor) {
            return Some(Rejection::ActorInactive);
        }
        let current = self.current_actor();
        if current != Some(actor) {
            return Some(Rejection::NotYourTurn { current });
        }
        None
    }
}

/// Open an encounter at `location`.
///
/// Participants are every visible actor at the location, followed by any
/// of `combatants` not already present. Turn order starts at `first_actor`.
pub fn start_encounter(
    registry: &Registry,
    location: ThingId,
    player: ThingId,
    combatants: &[ThingId],
    first_actor: ThingId,
    config: &RulesConfig,
) -> Result<CombatEncounter> {
    if !registry.require(location)?.is_place() {
        return Err(KernelError::NotAPlace(location));
    }

    let mut participants: Vec<ThingId> = registry.actors_at(location).iter().map(|t| t.id).collect();
    for id in combatants {
        registry.require(*id)?;
        if !participants.contains(id) {
            participants.push(*id);
        }
    }
    let turn = participants.iter().position(|id| *id == first_actor).unwrap_or(0);

    let mut encounter = CombatEncounter {
        location,
        player,
        participants,
        defeated: BTreeSet::new(),
        fled: BTreeSet::new(),
        state: EncounterState::Active,
        round: 1,
        health_cell: config.health_cell.clone(),
        turn,
    };
    encounter.sync(registry);

    info!(
        %location,
        participants = encounter.participants.len(),
        first = ?encounter.current_actor(),
        "encounter started"
    );
    Ok(encounter)
}

/// Damage expression of the attacker's weapon, main hand first.
fn weapon_damage(registry: &Registry, attacker: ThingId) -> Option<String> {
    let actor = registry.get(attacker)?.as_actor()?;
    let main = actor.equipped.get(&EquipmentSlot::MainHand);
    main.into_iter()
        .chain(actor.equipped.values())
        .filter_map(|id| registry.get(*id))
        .find_map(|item| item.as_item().and_then(|data| data.weapon.as_ref()))
        .map(|weapon| weapon.damage.clone())
}

/// Resolve one attack. Damage is consumed from the target's health cell.
pub fn attack(
    registry: &mut Registry,
    encounter: &mut CombatEncounter,
    attacker: ThingId,
    target: ThingId,
    resolver: &mut dyn ExpressionResolver,
    config: &RulesConfig,
) -> Result<Resolution<AttackOutcome>> {
    if let Some(rejection) = encounter.validate_turn(attacker) {
        return Ok(Resolution::Rejected(rejection));
    }
    if attacker == target {
        return Ok(Resolution::Rejected(Rejection::SelfTarget));
    }
    if !encounter.is_participant(target) {
        return Ok(Resolution::Rejected(Rejection::NotAParticipant));
    }
    if !encounter.is_active(target) {
        return Ok(Resolution::Rejected(Rejection::TargetDown));
    }

    let (hit, damage) = {
        let attrs = ThingAttributes::against(registry, attacker, target);
        let hit = resolver.check(&config.hit_check, &attrs)?;
        let damage = if hit {
            let expr = weapon_damage(registry, attacker).unwrap_or_else(|| config.unarmed_damage.clone());
            resolver.roll(&expr, &attrs)?.max(0.0)
        } else {
            0.0
        };
        (hit, damage)
    };

    let damage_applied = if hit {
        cells::consume(registry, target, &encounter.health_cell, damage)?.applied
    } else {
        0.0
    };

    let health = registry.require(target)?.cell(&encounter.health_cell).copied();
    let target_defeated = health.is_some_and(|cell| cell.is_empty());
    if target_defeated {
        encounter.defeated.insert(target);
    }

    let outcome = AttackOutcome {
        attacker,
        target,
        hit,
        damage_applied,
        target_amount: health.map(|c| c.amount()).unwrap_or(0.0),
        target_capacity: health.map(|c| c.capacity()).unwrap_or(0.0),
        target_volume: health.map(|c| c.fraction()).unwrap_or(0.0),
        target_defeated,
    };
    debug!(%attacker, %target, hit, damage_applied, target_defeated, "attack resolved");
    Ok(Resolution::Done(outcome))
}

/// Attempt to leave the fight. On success the actor drops out of turn order.
pub fn flee(
    registry: &Registry,
    encounter: &mut CombatEncounter,
    actor: ThingId,
    resolver: &mut dyn ExpressionResolver,
    config: &RulesConfig,
) -> Result<Resolution<FleeOutcome>> {
    if let Some(rejection) = encounter.validate_turn(actor) {
        return Ok(Resolution::Rejected(rejection));
    }

    let attrs = ThingAttributes::of(registry, actor);
    let escaped = resolver.check(&config.flee_check, &attrs)?;
    if escaped {
        encounter.fled.insert(actor);
    }
    debug!(%actor, escaped, "flee attempted");
    Ok(Resolution::Done(FleeOutcome { actor, escaped }))
}

/// Give up the current turn without acting.
pub fn pass(encounter: &CombatEncounter, actor: ThingId) -> Resolution<()> {
    match encounter.validate_turn(actor) {
        Some(rejection) => Resolution::Rejected(rejection),
        None => Resolution::Done(()),
    }
}

/// Move the turn pointer to the next active participant, wrapping.
///
/// Returns `None` (leaving the pointer alone) once no hostile is active,
/// at which point the encounter is over and `check_end` will say how.
pub fn advance_turn(registry: &Registry, encounter: &mut CombatEncounter) -> Option<ThingId> {
    if encounter.is_over() {
        return None;
    }
    encounter.sync(registry);
    if encounter.active_hostiles().is_empty() {
        return None;
    }

    let count = encounter.participants.len();
    for step in 1..=count {
        let index = (encounter.turn + step) % count;
        let candidate = encounter.participants[index];
        if encounter.is_active(candidate) {
            if index <= encounter.turn {
                encounter.round += 1;
            }
            encounter.turn = index;
            return Some(candidate);
        }
    }
    None
}

/// Decide whether the encounter has ended, and record it if so.
pub fn check_end(registry: &Registry, encounter: &mut CombatEncounter, player: ThingId) -> Option<CombatEnd> {
    if let EncounterState::Ended(end) = encounter.state {
        return Some(end);
    }
    encounter.sync(registry);

    let player_down = encounter.defeated.contains(&player)
        || registry
            .get(player)
            .is_some_and(|thing| thing.is_spent(&encounter.health_cell));

    let hostiles: Vec<ThingId> = encounter
        .participants
        .iter()
        .copied()
        .filter(|id| *id != player)
        .collect();
    let active_hostiles = hostiles.iter().filter(|id| encounter.is_active(**id)).count();

    let end = if player_down {
        CombatEnd::PlayerDefeated
    } else if encounter.fled.contains(&player) {
        CombatEnd::PlayerFled
    } else if active_hostiles == 0 {
        let all_fled = !hostiles.is_empty() && hostiles.iter().all(|id| encounter.fled.contains(id));
        if all_fled {
            CombatEnd::HostilesFled
        } else {
            CombatEnd::Victory
        }
    } else {
        return None;
    };

    encounter.state = EncounterState::Ended(end);
    info!(location = %encounter.location, ?end, rounds = encounter.round, "encounter ended");
    Some(end)
}
