//! Trigger engine - maps world events to narrative and state outcomes.
//!
//! Triggers are data: an event filter, an optional condition expression and
//! a list of effects. Firing an event evaluates every trigger in
//! registration order against an unchanged registry and folds the matches
//! into one [`TriggerOutcome`]. Applying that outcome is the caller's job.

mod outcome;

pub use outcome::*;

use serde::{Deserialize, Serialize};
use tracing::debug;
use world_rules::{ExpressionResolver, FlagValue, KernelError, Registry, ThingAttributes, ThingId};

use crate::events::{EventKind, WorldEvent};
use crate::loop_runtime::ResetReason;

/// One thing a trigger does when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Message(String),
    EndGame,
    Reset {
        reason: ResetReason,
        message: Option<String>,
    },
    State(StateEffect),
}

/// A declarative rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub on: EventKind,
    /// Only fire when the event target has this label.
    pub target: Option<String>,
    /// Only fire when the event object has this label.
    pub object: Option<String>,
    /// Only fire while the player is in this place.
    pub place: Option<ThingId>,
    /// Condition evaluated with the player as subject and the event target
    /// (if any) as `target.`.
    pub condition: Option<String>,
    /// Fire at most once per loop.
    #[serde(default)]
    pub once: bool,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Trigger {
    pub fn new(name: impl Into<String>, on: EventKind) -> Self {
        Self {
            name: name.into(),
            on,
            target: None,
            object: None,
            place: None,
            condition: None,
            once: false,
            effects: Vec::new(),
        }
    }

    pub fn targeting(mut self, label: impl Into<String>) -> Self {
        self.target = Some(label.into());
        self
    }

    pub fn with_object(mut self, label: impl Into<String>) -> Self {
        self.object = Some(label.into());
        self
    }

    pub fn at(mut self, place: ThingId) -> Self {
        self.place = Some(place);
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.effects.push(Effect::Message(text.into()));
        self
    }

    pub fn end_game(mut self) -> Self {
        self.effects.push(Effect::EndGame);
        self
    }

    pub fn reset(mut self, reason: ResetReason, message: Option<String>) -> Self {
        self.effects.push(Effect::Reset { reason, message });
        self
    }

    pub fn set_flag(mut self, name: impl Into<String>, value: FlagValue) -> Self {
        self.effects.push(Effect::State(StateEffect::SetFlag {
            name: name.into(),
            value,
        }));
        self
    }

    pub fn adjust_counter(mut self, name: impl Into<String>, delta: i64) -> Self {
        self.effects.push(Effect::State(StateEffect::AdjustCounter {
            name: name.into(),
            delta,
        }));
        self
    }

    /// World-state flag remembering that a one-shot trigger fired.
    pub fn fired_flag(&self) -> String {
        format!("fired.{}", self.name)
    }

    fn matches(&self, event: &WorldEvent, ctx: &TriggerContext<'_>) -> bool {
        if self.on != event.kind {
            return false;
        }
        if !label_matches(self.target.as_deref(), event.target_label.as_deref()) {
            return false;
        }
        if !label_matches(self.object.as_deref(), event.object_label.as_deref()) {
            return false;
        }
        if self.place.is_some_and(|place| place != ctx.plot) {
            return false;
        }
        if self.once {
            let fired = ctx
                .registry
                .world_state()
                .map(|state| state.is_set(&self.fired_flag()))
                .unwrap_or(false);
            if fired {
                return false;
            }
        }
        true
    }

    fn contribute(&self, outcome: &mut TriggerOutcome) {
        for effect in &self.effects {
            match effect {
                Effect::Message(text) => outcome.messages.push(text.clone()),
                Effect::EndGame => outcome.end_game = true,
                Effect::Reset { reason, message } => outcome.request_reset(ResetDirective {
                    reason: reason.clone(),
                    message: message.clone(),
                }),
                Effect::State(state) => outcome.effects.push(state.clone()),
            }
        }
        if self.once {
            outcome.effects.push(StateEffect::SetFlag {
                name: self.fired_flag(),
                value: FlagValue::Bool(true),
            });
        }
        outcome.fired.push(self.name.clone());
    }
}

fn label_matches(filter: Option<&str>, label: Option<&str>) -> bool {
    match (filter, label) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
        (Some(_), None) => false,
    }
}

/// What the engine needs to know about the world when firing.
#[derive(Clone, Copy)]
pub struct TriggerContext<'a> {
    pub registry: &'a Registry,
    /// The player's current place.
    pub plot: ThingId,
    pub player: ThingId,
    pub world_state: ThingId,
}

impl<'a> TriggerContext<'a> {
    pub fn new(registry: &'a Registry, plot: ThingId, player: ThingId) -> Self {
        Self {
            registry,
            plot,
            player,
            world_state: registry.world_state_id(),
        }
    }
}

/// Ordered set of triggers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerEngine {
    triggers: Vec<Trigger>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger after all existing ones.
    pub fn register(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn with(mut self, trigger: Trigger) -> Self {
        self.register(trigger);
        self
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Evaluate every trigger against `event` and fold the matches.
    ///
    /// The registry is only read; randomness can enter solely through the
    /// resolver.
    pub fn fire(
        &self,
        event: &WorldEvent,
        ctx: TriggerContext<'_>,
        resolver: &mut dyn ExpressionResolver,
    ) -> Result<TriggerOutcome, KernelError> {
        let mut outcome = TriggerOutcome::new();

        for trigger in &self.triggers {
            if !trigger.matches(event, &ctx) {
                continue;
            }
            if let Some(condition) = &trigger.condition {
                let attrs = match event.target_id {
                    Some(target) => ThingAttributes::against(ctx.registry, ctx.player, target),
                    None => ThingAttributes::of(ctx.registry, ctx.player),
                };
                if !resolver.check(condition, &attrs)? {
                    continue;
                }
            }
            debug!(trigger = %trigger.name, event = ?event.kind, "trigger matched");
            trigger.contribute(&mut outcome);
        }

        Ok(outcome)
    }
}
