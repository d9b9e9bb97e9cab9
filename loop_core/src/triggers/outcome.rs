//! Trigger outcomes - pure data describing what should happen.

use serde::{Deserialize, Serialize};
use world_rules::{FlagValue, KernelError, Receipt, Registry};

use crate::loop_runtime::ResetReason;

/// Request to roll the world back to a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetDirective {
    pub reason: ResetReason,
    /// Replaces the configured message for the reason.
    pub message: Option<String>,
}

/// A world-state change a trigger asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEffect {
    SetFlag { name: String, value: FlagValue },
    AdjustCounter { name: String, delta: i64 },
}

impl StateEffect {
    /// Apply to the registry's world-state record and log a note receipt.
    pub fn apply(&self, registry: &mut Registry) -> Result<(), KernelError> {
        let state = registry.world_state_mut()?;
        let detail = match self {
            StateEffect::SetFlag { name, value } => {
                state.flags.insert(name.clone(), value.clone());
                format!("{name} = {value:?}")
            }
            StateEffect::AdjustCounter { name, delta } => {
                let now = state.bump(name, *delta);
                format!("{name} += {delta} -> {now}")
            }
        };
        registry.record_receipt(Receipt::note("world-state", detail));
        Ok(())
    }
}

/// Everything the triggers matched for one event.
///
/// Messages concatenate in registration order, end-game is sticky, and the
/// first reset request wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub messages: Vec<String>,
    pub end_game: bool,
    pub reset: Option<ResetDirective>,
    pub effects: Vec<StateEffect>,
    /// Names of the triggers that fired, in order.
    pub fired: Vec<String>,
}

impl TriggerOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome carrying only a reset request.
    pub fn reset(reason: ResetReason, message: Option<String>) -> Self {
        Self {
            reset: Some(ResetDirective { reason, message }),
            ..Default::default()
        }
    }

    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.messages.push(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && !self.end_game && self.reset.is_none() && self.effects.is_empty()
    }

    pub fn request_reset(&mut self, directive: ResetDirective) {
        if self.reset.is_none() {
            self.reset = Some(directive);
        }
    }

    /// Fold a later outcome into this one.
    pub fn merge(&mut self, later: TriggerOutcome) {
        self.messages.extend(later.messages);
        self.end_game |= later.end_game;
        if let Some(directive) = later.reset {
            self.request_reset(directive);
        }
        self.effects.extend(later.effects);
        self.fired.extend(later.fired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_rules::Thing;

    #[test]
    fn test_first_reset_wins_and_messages_concatenate() {
        let mut first = TriggerOutcome::reset(ResetReason::new("bell"), Some("The bell tolls.".into()))
            .message("One");
        let second = TriggerOutcome::reset(ResetReason::death(), None).message("Two");

        first.merge(second);
        assert_eq!(first.messages, vec!["One", "Two"]);
        assert_eq!(first.reset.unwrap().reason, ResetReason::new("bell"));
    }

    #[test]
    fn test_end_game_is_sticky() {
        let mut outcome = TriggerOutcome::new();
        assert!(outcome.is_empty());
        outcome.merge(TriggerOutcome {
            end_game: true,
            ..Default::default()
        });
        outcome.merge(TriggerOutcome::new());
        assert!(outcome.end_game);
    }

    #[test]
    fn test_state_effects_apply() {
        let mut registry = Registry::new();
        registry.insert(Thing::world_state());

        StateEffect::SetFlag {
            name: "gate_open".into(),
            value: FlagValue::Bool(true),
        }
        .apply(&mut registry)
        .unwrap();
        StateEffect::AdjustCounter {
            name: "bells".into(),
            delta: 2,
        }
        .apply(&mut registry)
        .unwrap();

        let state = registry.world_state().unwrap();
        assert!(state.is_set("gate_open"));
        assert_eq!(state.counter("bells"), 2);
        assert_eq!(registry.receipts().len(), 2);
    }

    #[test]
    fn test_state_effect_without_world_state_fails() {
        let mut registry = Registry::new();
        let effect = StateEffect::AdjustCounter {
            name: "bells".into(),
            delta: 1,
        };
        assert!(matches!(effect.apply(&mut registry), Err(KernelError::MissingWorldState)));
    }
}
