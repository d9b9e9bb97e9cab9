//! Loop runtime - builds fresh worlds and decides when time runs out.
//!
//! A reset never edits the live registry. It constructs a complete new world
//! from the authoring source and hands it back; the caller swaps it in. If
//! construction fails the error propagates and the old world is untouched.

use serde::{Deserialize, Serialize};
use tracing::info;
use world_rules::{FlagValue, KernelError, Registry, Thing, ThingId};

use crate::config::LoopConfig;
use crate::error::{LoopError, Result, WorldBuildError};

/// Why a loop reset happened. Open-ended: content assigns meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResetReason(pub String);

impl ResetReason {
    pub const TIME_LIMIT: &'static str = "time-limit";
    pub const DEATH: &'static str = "death";

    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn time_limit() -> Self {
        Self::new(Self::TIME_LIMIT)
    }

    pub fn death() -> Self {
        Self::new(Self::DEATH)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete world snapshot: registry, start place and player.
#[derive(Debug, Clone)]
pub struct World {
    pub registry: Registry,
    pub start: ThingId,
    pub player: ThingId,
}

/// Constructs worlds from the authoring source.
pub trait WorldBuilder {
    fn build(&self) -> std::result::Result<World, WorldBuildError>;
}

impl<F> WorldBuilder for F
where
    F: Fn() -> std::result::Result<World, WorldBuildError>,
{
    fn build(&self) -> std::result::Result<World, WorldBuildError> {
        self()
    }
}

/// Result of a loop reset.
#[derive(Debug, Clone)]
pub struct LoopResetResult {
    pub world: World,
    pub reason: ResetReason,
    pub message: String,
    /// Loop iteration of the fresh world (the first world is 1).
    pub iteration: i64,
}

pub struct LoopRuntime {
    builder: Box<dyn WorldBuilder>,
    config: LoopConfig,
}

impl LoopRuntime {
    pub fn new(builder: impl WorldBuilder + 'static, config: LoopConfig) -> Self {
        Self {
            builder: Box::new(builder),
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Build the first world of a session.
    pub fn initial_world(&self) -> Result<World> {
        let mut world = self.construct()?;
        world.registry.world_state_mut()?.counters.insert(self.config.loop_counter.clone(), 1);
        Ok(world)
    }

    /// Build a fresh world to replace `registry`.
    ///
    /// The loop counter and the configured persistent flags carry over; all
    /// other state comes from the authoring source.
    pub fn reset(&self, registry: &Registry, reason: &ResetReason, message: Option<&str>) -> Result<LoopResetResult> {
        let mut world = self.construct()?;

        let previous = registry.world_state()?;
        let iteration = previous.counter(&self.config.loop_counter).max(1) + 1;
        let carried: Vec<(String, FlagValue)> = self
            .config
            .persistent_flags
            .iter()
            .filter_map(|name| previous.flag(name).map(|value| (name.clone(), value.clone())))
            .collect();

        let state = world.registry.world_state_mut()?;
        state.counters.insert(self.config.loop_counter.clone(), iteration);
        state.flags.extend(carried);

        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| self.config.message_for(reason.as_str()).to_string());
        info!(%reason, iteration, "loop reset");

        Ok(LoopResetResult {
            world,
            reason: reason.clone(),
            message,
            iteration,
        })
    }

    /// Advance the world clock by one turn and report a due reset.
    ///
    /// When a reset is due nothing is written; the fresh world starts its own
    /// clock, and a reset that fails to build leaves the live clock as it was.
    pub fn advance_turn(&self, registry: &mut Registry) -> std::result::Result<Option<ResetReason>, KernelError> {
        let state = registry.world_state_mut()?;
        let clock_counter = &self.config.clock_counter;
        let next = state.counter(clock_counter) + 1;

        if let Some(limit) = self.config.turn_limit {
            if next >= 0 && next as u64 >= limit {
                return Ok(Some(ResetReason::time_limit()));
            }
        }
        for limit in &self.config.counter_limits {
            let value = if &limit.counter == clock_counter {
                next
            } else {
                state.counter(&limit.counter)
            };
            if value >= limit.max {
                return Ok(Some(ResetReason::new(limit.reason.clone())));
            }
        }

        state.bump(clock_counter, 1);
        Ok(None)
    }

    /// Build and validate a world; the player starts at the start place.
    fn construct(&self) -> Result<World> {
        let mut world = self.builder.build()?;

        if !world.registry.require(world.start)?.is_place() {
            return Err(LoopError::Kernel(KernelError::NotAPlace(world.start)));
        }
        if !world.registry.require(world.player)?.is_actor() {
            return Err(WorldBuildError::new(format!("player {} is not an actor", world.player)).into());
        }
        if world.registry.world_state().is_err() {
            world.registry.insert(Thing::world_state());
        }
        world.registry.move_ownership(world.player, world.start)?;
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CounterLimit;
    use std::cell::Cell as Counter;
    use std::rc::Rc;

    fn build_world() -> std::result::Result<World, WorldBuildError> {
        let mut registry = Registry::new();
        let gate = registry.insert(Thing::place("gate", "Gate"));
        registry.insert(Thing::place("keep", "Keep"));
        let player = registry.insert(Thing::actor("player", "you").with_owner(gate));
        Ok(World {
            registry,
            start: gate,
            player,
        })
    }

    #[test]
    fn test_initial_world_has_world_state() {
        let runtime = LoopRuntime::new(build_world, LoopConfig::default());
        let world = runtime.initial_world().unwrap();
        assert_eq!(world.registry.world_state().unwrap().counter("loop"), 1);
    }

    #[test]
    fn test_reset_builds_fresh_world() {
        let config = LoopConfig {
            persistent_flags: vec!["knows_bell".into()],
            ..Default::default()
        };
        let runtime = LoopRuntime::new(build_world, config);
        let mut old = runtime.initial_world().unwrap();
        old.registry
            .move_ownership(old.player, ThingId::from_key("keep"))
            .unwrap();
        let state = old.registry.world_state_mut().unwrap();
        state.flags.insert("knows_bell".into(), FlagValue::Bool(true));
        state.flags.insert("door_open".into(), FlagValue::Bool(true));
        state.bump("clock", 9);

        let result = runtime.reset(&old.registry, &ResetReason::death(), None).unwrap();

        let fresh = &result.world.registry;
        assert_eq!(fresh.owning_place(result.world.player).unwrap(), result.world.start);
        assert_eq!(result.iteration, 2);
        let state = fresh.world_state().unwrap();
        assert!(state.is_set("knows_bell"));
        assert!(!state.is_set("door_open"));
        assert_eq!(state.counter("clock"), 0);
        assert_eq!(result.message, LoopConfig::default().default_reset_message);

        // old world untouched
        assert_eq!(old.registry.owning_place(old.player).unwrap(), ThingId::from_key("keep"));
    }

    #[test]
    fn test_override_message_wins() {
        let runtime = LoopRuntime::new(build_world, LoopConfig::default());
        let world = runtime.initial_world().unwrap();
        let result = runtime
            .reset(&world.registry, &ResetReason::new("bell"), Some("Dong."))
            .unwrap();
        assert_eq!(result.message, "Dong.");
    }

    #[test]
    fn test_construction_failure_propagates() {
        let attempts = Rc::new(Counter::new(0));
        let seen = Rc::clone(&attempts);
        let flaky = move || {
            seen.set(seen.get() + 1);
            if seen.get() > 1 {
                Err(WorldBuildError::new("source missing"))
            } else {
                build_world()
            }
        };
        let runtime = LoopRuntime::new(flaky, LoopConfig::default());
        let world = runtime.initial_world().unwrap();

        let err = runtime.reset(&world.registry, &ResetReason::death(), None).unwrap_err();
        assert!(matches!(err, LoopError::Build(_)));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_player_must_be_actor() {
        let runtime = LoopRuntime::new(
            || {
                let mut world = build_world()?;
                world.player = world.start;
                Ok(world)
            },
            LoopConfig::default(),
        );
        assert!(matches!(runtime.initial_world(), Err(LoopError::Build(_))));
    }

    #[test]
    fn test_turn_limit() {
        let config = LoopConfig {
            turn_limit: Some(2),
            ..Default::default()
        };
        let runtime = LoopRuntime::new(build_world, config);
        let mut world = runtime.initial_world().unwrap();

        assert_eq!(runtime.advance_turn(&mut world.registry).unwrap(), None);
        assert_eq!(world.registry.clock("clock"), 1);
        assert_eq!(
            runtime.advance_turn(&mut world.registry).unwrap(),
            Some(ResetReason::time_limit())
        );
    }

    #[test]
    fn test_due_reset_leaves_clock_untouched() {
        let config = LoopConfig {
            turn_limit: Some(1),
            counter_limits: vec![CounterLimit {
                counter: "clock".into(),
                max: 5,
                reason: "dusk".into(),
            }],
            ..Default::default()
        };
        let runtime = LoopRuntime::new(build_world, config);
        let mut world = runtime.initial_world().unwrap();

        assert_eq!(
            runtime.advance_turn(&mut world.registry).unwrap(),
            Some(ResetReason::time_limit())
        );
        assert_eq!(world.registry.clock("clock"), 0);
        assert_eq!(world.registry.world_state().unwrap().counter("clock"), 0);
    }

    #[test]
    fn test_counter_limit() {
        let config = LoopConfig {
            counter_limits: vec![CounterLimit {
                counter: "alarm".into(),
                max: 2,
                reason: "caught".into(),
            }],
            ..Default::default()
        };
        let runtime = LoopRuntime::new(build_world, config);
        let mut world = runtime.initial_world().unwrap();

        assert_eq!(runtime.advance_turn(&mut world.registry).unwrap(), None);
        world.registry.world_state_mut().unwrap().bump("alarm", 2);
        assert_eq!(
            runtime.advance_turn(&mut world.registry).unwrap(),
            Some(ResetReason::new("caught"))
        );
    }
}
