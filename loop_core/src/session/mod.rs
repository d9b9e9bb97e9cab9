//! Turn resolution on top of the kernel.
//!
//! A [`Session`] owns the live world and resolves one player command at a
//! time: carry out the action, fire its event, settle combat, fire
//! `OnTurn`, advance the loop clock, then let autonomous actors act. A loop
//! reset swaps the whole world; nothing of the old registry survives except
//! what [`LoopRuntime::reset`] carries over.

mod brain;
mod narrator;

pub use brain::*;
pub use narrator::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use world_rules::{
    cells, combat, CombatEncounter, CombatEnd, DiceResolver, ExpressionResolver, KernelError,
    Registry, Resolution, RulesConfig, Thing, ThingAttributes, ThingId,
};

use crate::config::KernelConfig;
use crate::error::Result;
use crate::events::{EventKind, WorldEvent};
use crate::loop_runtime::{LoopRuntime, ResetReason, World, WorldBuilder};
use crate::triggers::{TriggerContext, TriggerEngine, TriggerOutcome};

/// A loop reset that has been carried out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetContext {
    pub reason: ResetReason,
    pub message: String,
    pub iteration: i64,
    /// Start place of the fresh world.
    pub start: ThingId,
}

/// What applying a trigger outcome did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedOutcome {
    /// Everything narrated, in order.
    pub messages: Vec<String>,
    pub reset: Option<ResetContext>,
    pub end_game: bool,
}

/// What one command did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// False for refused commands and free actions.
    pub took_turn: bool,
    pub combat_end: Option<CombatEnd>,
    pub reset: Option<ResetContext>,
    pub game_over: bool,
}

impl TurnReport {
    fn taken() -> Self {
        Self {
            took_turn: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// The world was replaced or the story ended; the turn stops here.
    Stop,
}

pub struct Session {
    runtime: LoopRuntime,
    triggers: TriggerEngine,
    rules: RulesConfig,
    resolver: Box<dyn ExpressionResolver>,
    brain: Box<dyn ActorBrain>,
    world: World,
    /// Where the player came from, for flight.
    previous: Option<ThingId>,
    encounter: Option<CombatEncounter>,
    ended: bool,
    /// Bumped whenever a reset replaces the world.
    generation: u64,
}

impl Session {
    /// Build the first world and start a session in it.
    pub fn new(builder: impl WorldBuilder + 'static, triggers: TriggerEngine, config: KernelConfig) -> Result<Self> {
        let KernelConfig { seed, rules, looping } = config;
        let runtime = LoopRuntime::new(builder, looping);
        let world = runtime.initial_world()?;

        info!(start = %world.start, player = %world.player, triggers = triggers.len(), "session started");
        Ok(Self {
            runtime,
            triggers,
            rules,
            resolver: Box::new(DiceResolver::seeded(seed)),
            brain: Box::new(IdleBrain),
            world,
            previous: None,
            encounter: None,
            ended: false,
            generation: 0,
        })
    }

    pub fn with_resolver(mut self, resolver: impl ExpressionResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_brain(mut self, brain: impl ActorBrain + 'static) -> Self {
        self.brain = Box::new(brain);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.world.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.world.registry
    }

    pub fn player(&self) -> ThingId {
        self.world.player
    }

    /// Start place of the current loop.
    pub fn start(&self) -> ThingId {
        self.world.start
    }

    /// The place the player is in.
    pub fn location(&self) -> Result<ThingId> {
        Ok(self.world.registry.owning_place(self.world.player)?)
    }

    pub fn encounter(&self) -> Option<&CombatEncounter> {
        self.encounter.as_ref()
    }

    pub fn triggers(&self) -> &TriggerEngine {
        &self.triggers
    }

    pub fn is_over(&self) -> bool {
        self.ended
    }

    pub fn loop_iteration(&self) -> i64 {
        self.world
            .registry
            .world_state()
            .map(|state| state.counter(&self.runtime.config().loop_counter))
            .unwrap_or(1)
    }

    pub fn clock(&self) -> u64 {
        self.world.registry.clock(&self.runtime.config().clock_counter)
    }

    /// Things the player is holding.
    pub fn carried(&self) -> Vec<&Thing> {
        self.world.registry.contents_of(self.world.player)
    }

    /// Fire an event about things in the live world.
    pub fn fire_trigger(
        &mut self,
        kind: EventKind,
        target: Option<ThingId>,
        object: Option<ThingId>,
    ) -> Result<TriggerOutcome> {
        let registry = &self.world.registry;
        let mut event = WorldEvent::new(kind);
        if let Some(id) = target {
            event = event.with_target(registry.require(id)?);
        }
        if let Some(id) = object {
            event = event.with_object(registry.require(id)?);
        }

        let plot = registry.owning_place(self.world.player)?;
        let ctx = TriggerContext::new(registry, plot, self.world.player);
        Ok(self.triggers.fire(&event, ctx, self.resolver.as_mut())?)
    }

    /// Narrate an outcome and carry it out.
    ///
    /// With a reset, state effects land on a staged copy of the live
    /// registry (so a persistent flag set alongside the reset survives) and
    /// the world is swapped only once the fresh one is built. If building
    /// fails the live world is left as it was.
    pub fn apply_outcome(&mut self, outcome: TriggerOutcome, narrator: &mut dyn Narrator) -> Result<AppliedOutcome> {
        let TriggerOutcome {
            messages,
            end_game,
            reset,
            effects,
            ..
        } = outcome;

        let mut applied = AppliedOutcome {
            messages: Vec::new(),
            reset: None,
            end_game,
        };

        match reset {
            Some(directive) => {
                let mut staged = self.world.registry.clone();
                for effect in &effects {
                    effect.apply(&mut staged)?;
                }
                let result = self
                    .runtime
                    .reset(&staged, &directive.reason, directive.message.as_deref())?;

                for message in &messages {
                    narrator.narrate(message);
                }
                narrator.narrate(&result.message);
                applied.messages = messages;
                applied.messages.push(result.message.clone());
                applied.reset = Some(ResetContext {
                    reason: result.reason,
                    message: result.message,
                    iteration: result.iteration,
                    start: result.world.start,
                });

                self.world = result.world;
                self.previous = None;
                self.encounter = None;
                self.generation += 1;
            }
            None => {
                for effect in &effects {
                    effect.apply(&mut self.world.registry)?;
                }
                for message in &messages {
                    narrator.narrate(message);
                }
                applied.messages = messages;
            }
        }

        if end_game {
            info!("story ended");
            self.ended = true;
        }
        Ok(applied)
    }

    /// Describe the player's surroundings. Takes no time.
    pub fn look(&self, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        let registry = &self.world.registry;
        let player = self.world.player;
        let here = registry.owning_place(player)?;
        let place = registry.require(here)?;

        narrator.narrate(&place.label);
        let text = place.description.text_at(self.clock());
        if !text.is_empty() {
            narrator.narrate(text);
        }

        let seen: Vec<&str> = registry
            .visible_at(here)
            .into_iter()
            .filter(|thing| thing.id != player && thing.as_passage().is_none())
            .map(|thing| thing.label.as_str())
            .collect();
        if !seen.is_empty() {
            narrator.narrate(&format!("You see: {}.", seen.join(", ")));
        }

        let exits = exits_from(registry, here);
        if !exits.is_empty() {
            narrator.narrate(&format!("Exits: {}.", exits.join(", ")));
        }
        Ok(TurnReport::default())
    }

    /// List what the player holds. Takes no time.
    pub fn inventory(&self, narrator: &mut dyn Narrator) -> TurnReport {
        let held: Vec<&str> = self.carried().iter().map(|thing| thing.label.as_str()).collect();
        if held.is_empty() {
            narrator.narrate("You are empty-handed.");
        } else {
            narrator.narrate(&format!("You are carrying: {}.", held.join(", ")));
        }
        TurnReport::default()
    }

    pub fn go(&mut self, direction: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, false) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        let registry = &self.world.registry;
        let Some((passage, dest)) = registry.passage_toward(here, direction) else {
            narrator.narrate("You can't go that way.");
            return Ok(TurnReport::default());
        };
        if let Some(condition) = passage.as_passage().and_then(|p| p.open_when.as_deref()) {
            let attrs = ThingAttributes::of(registry, player);
            if !self.resolver.check(condition, &attrs).map_err(KernelError::from)? {
                narrator.narrate(&format!("The way {direction} is shut."));
                return Ok(TurnReport::default());
            }
        }

        debug!(%player, from = %here, to = %dest, direction, "player moves");
        self.world.registry.move_ownership(player, dest)?;
        self.previous = Some(here);
        self.look(narrator)?;
        self.after_action(EventKind::OnEnter, Some(dest), None, narrator)
    }

    pub fn take(&mut self, label: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, false) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        if self.world.registry.find_in(player, label).is_some() {
            narrator.narrate("You already have that.");
            return Ok(TurnReport::default());
        }
        let Some(item) = self.find_at(here, label) else {
            narrator.narrate(&format!("You see no {label} here."));
            return Ok(TurnReport::default());
        };
        let thing = self.world.registry.require(item)?;
        if !thing.is_portable() {
            narrator.narrate(&format!("You cannot take the {}.", thing.label));
            return Ok(TurnReport::default());
        }

        narrator.narrate(&format!("You take the {}.", thing.label));
        self.world.registry.move_ownership(item, player)?;
        self.after_action(EventKind::OnTake, Some(item), None, narrator)
    }

    pub fn drop(&mut self, label: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, false) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        let Some(thing) = self.world.registry.find_in(player, label) else {
            narrator.narrate("You aren't carrying that.");
            return Ok(TurnReport::default());
        };
        let item = thing.id;

        narrator.narrate(&format!("You drop the {}.", thing.label));
        self.world.registry.move_ownership(item, here)?;
        self.after_action(EventKind::OnDrop, Some(item), None, narrator)
    }

    /// Stow a carried item inside a container.
    pub fn put(&mut self, item_label: &str, container_label: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, false) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        let Some(item) = self.world.registry.find_in(player, item_label).map(|t| t.id) else {
            narrator.narrate("You aren't carrying that.");
            return Ok(TurnReport::default());
        };
        let Some(container) = self.find_near(here, container_label) else {
            narrator.narrate(&format!("You see no {container_label} here."));
            return Ok(TurnReport::default());
        };

        let registry = &self.world.registry;
        let item_name = registry.require(item)?.label.clone();
        let container_thing = registry.require(container)?;
        if !container_thing.as_item().is_some_and(|data| data.is_container()) {
            narrator.narrate(&format!("The {} cannot hold anything.", container_thing.label));
            return Ok(TurnReport::default());
        }
        if !registry.can_stow(item, container)? {
            narrator.narrate(&format!("The {item_name} does not fit in the {}.", container_thing.label));
            return Ok(TurnReport::default());
        }

        narrator.narrate(&format!("You put the {item_name} in the {}.", container_thing.label));
        self.world.registry.move_ownership(item, container)?;
        self.after_action(EventKind::OnDrop, Some(item), Some(container), narrator)
    }

    /// Use a carried item on something. Items with a use cell hand over
    /// part of it; the target gets an empty cell of the same shape first.
    pub fn use_on(&mut self, item_label: &str, target_label: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, false) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        let Some(item) = self.world.registry.find_in(player, item_label).map(|t| t.id) else {
            narrator.narrate("You aren't carrying that.");
            return Ok(TurnReport::default());
        };
        let Some(target) = self.find_near(here, target_label) else {
            narrator.narrate(&format!("You see no {target_label} here."));
            return Ok(TurnReport::default());
        };

        let supply = self
            .world
            .registry
            .require(item)?
            .as_item()
            .and_then(|data| data.use_cell.clone().map(|cell| (cell, data.use_amount)));
        let item_name = self.world.registry.require(item)?.label.clone();
        let target_name = self.world.registry.require(target)?.label.clone();

        match supply {
            Some((cell, amount)) => {
                cells::ensure_like(&mut self.world.registry, item, target, &cell)?;
                let moved = cells::transfer(&mut self.world.registry, item, target, &cell, amount)?
                    .map(|receipts| receipts.transfer.applied)
                    .unwrap_or(0.0);
                if moved > 0.0 {
                    narrator.narrate(&format!("You use the {item_name} on the {target_name}."));
                } else {
                    narrator.narrate("Nothing happens.");
                }
            }
            None => narrator.narrate(&format!("You try the {item_name} on the {target_name}.")),
        }
        self.after_action(EventKind::OnUse, Some(target), Some(item), narrator)
    }

    /// Attack an actor here, opening an encounter if none is running.
    pub fn attack(&mut self, label: &str, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, true) {
            return Ok(TurnReport::default());
        }
        let player = self.world.player;
        let here = self.location()?;

        let registry = &self.world.registry;
        let Some(target) = registry
            .actors_at(here)
            .into_iter()
            .find(|thing| thing.id != player && thing.answers_to(label))
        else {
            narrator.narrate(&format!("There is no {label} here to fight."));
            return Ok(TurnReport::default());
        };
        if target.is_spent(&self.rules.health_cell) {
            narrator.narrate(&format!("The {} is already down.", target.label));
            return Ok(TurnReport::default());
        }
        let target = target.id;

        if self.encounter.is_none() {
            let encounter = combat::start_encounter(registry, here, player, &[player, target], player, &self.rules)?;
            self.encounter = Some(encounter);
        }
        self.combat_turn(CombatDecision::Attack(target), narrator)
    }

    pub fn flee(&mut self, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, true) {
            return Ok(TurnReport::default());
        }
        if self.encounter.is_none() {
            narrator.narrate("There is nothing to flee from.");
            return Ok(TurnReport::default());
        }
        self.combat_turn(CombatDecision::Flee, narrator)
    }

    /// Let a turn pass. In combat this is the player's pass.
    pub fn wait(&mut self, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        if self.refuse(narrator, true) {
            return Ok(TurnReport::default());
        }
        if self.encounter.is_some() {
            return self.combat_turn(CombatDecision::Pass, narrator);
        }
        narrator.narrate("Time passes.");
        self.finish_turn(narrator, TurnReport::taken())
    }

    /// Whether the command must be refused. Only combat commands run
    /// while an encounter is open.
    fn refuse(&self, narrator: &mut dyn Narrator, combat_command: bool) -> bool {
        if self.ended {
            narrator.narrate("The story has ended.");
            return true;
        }
        if self.encounter.is_some() && !combat_command {
            narrator.narrate("Not while you are fighting.");
            return true;
        }
        false
    }

    /// A visible thing at `place`, or one inside a visible container there.
    fn find_at(&self, place: ThingId, label: &str) -> Option<ThingId> {
        let registry = &self.world.registry;
        let player = self.world.player;
        let visible = registry.visible_at(place);

        if let Some(thing) = visible
            .iter()
            .find(|thing| thing.id != player && thing.answers_to(label))
        {
            return Some(thing.id);
        }
        visible
            .iter()
            .filter(|thing| thing.as_item().is_some_and(|data| data.is_container()))
            .flat_map(|container| registry.contents_of(container.id))
            .find(|thing| thing.visible && thing.answers_to(label))
            .map(|thing| thing.id)
    }

    /// Something the player holds, or something at `place`.
    fn find_near(&self, place: ThingId, label: &str) -> Option<ThingId> {
        self.world
            .registry
            .find_in(self.world.player, label)
            .map(|thing| thing.id)
            .or_else(|| self.find_at(place, label))
    }

    /// Fire the action's event, then finish the turn.
    fn after_action(
        &mut self,
        kind: EventKind,
        target: Option<ThingId>,
        object: Option<ThingId>,
        narrator: &mut dyn Narrator,
    ) -> Result<TurnReport> {
        let mut report = TurnReport::taken();
        let outcome = self.fire_trigger(kind, target, object)?;
        if self.apply(outcome, narrator, &mut report)? == Flow::Stop {
            return Ok(report);
        }
        self.finish_turn(narrator, report)
    }

    fn apply(&mut self, outcome: TriggerOutcome, narrator: &mut dyn Narrator, report: &mut TurnReport) -> Result<Flow> {
        if outcome.is_empty() {
            return Ok(Flow::Continue);
        }
        let applied = self.apply_outcome(outcome, narrator)?;
        report.game_over |= applied.end_game;

        if applied.reset.is_some() {
            report.reset = applied.reset;
            return Ok(Flow::Stop);
        }
        Ok(if applied.end_game { Flow::Stop } else { Flow::Continue })
    }

    /// `OnTurn`, the loop clock, then autonomous actors.
    fn finish_turn(&mut self, narrator: &mut dyn Narrator, mut report: TurnReport) -> Result<TurnReport> {
        let outcome = self.fire_trigger(EventKind::OnTurn, None, None)?;
        if self.apply(outcome, narrator, &mut report)? == Flow::Stop {
            return Ok(report);
        }

        if let Some(reason) = self.runtime.advance_turn(&mut self.world.registry)? {
            self.apply(TriggerOutcome::reset(reason, None), narrator, &mut report)?;
            return Ok(report);
        }

        self.run_autonomous(narrator, &mut report)?;
        Ok(report)
    }

    fn run_autonomous(&mut self, narrator: &mut dyn Narrator, report: &mut TurnReport) -> Result<()> {
        let player = self.world.player;
        let health = &self.rules.health_cell;
        let actors: Vec<ThingId> = self
            .world
            .registry
            .everything()
            .filter(|thing| thing.id != player && !thing.is_spent(health))
            .filter(|thing| thing.as_actor().is_some_and(|actor| actor.autonomous))
            .map(|thing| thing.id)
            .collect();

        for actor in actors {
            if self.encounter.as_ref().is_some_and(|e| e.is_participant(actor)) {
                continue;
            }
            let Some(decision) = self.brain.decide(&self.world.registry, actor) else {
                continue;
            };
            if self.act(actor, decision, narrator, report)? == Flow::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Carry out an autonomous actor's decision. Decisions that cannot be
    /// honoured count as a pass.
    fn act(
        &mut self,
        actor: ThingId,
        decision: ActorDecision,
        narrator: &mut dyn Narrator,
        report: &mut TurnReport,
    ) -> Result<Flow> {
        let player = self.world.player;
        let here = self.location()?;
        let from = self.world.registry.owning_place(actor)?;
        let name = capitalize(&self.describe(actor));

        match decision {
            ActorDecision::Move { direction } => {
                let registry = &self.world.registry;
                let Some((passage, dest)) = registry.passage_toward(from, &direction) else {
                    warn!(%actor, %direction, "no passage that way, passing");
                    return Ok(Flow::Continue);
                };
                if let Some(condition) = passage.as_passage().and_then(|p| p.open_when.as_deref()) {
                    let attrs = ThingAttributes::of(registry, actor);
                    if !self.resolver.check(condition, &attrs).map_err(KernelError::from)? {
                        debug!(%actor, %direction, "passage shut, passing");
                        return Ok(Flow::Continue);
                    }
                }

                self.world.registry.move_ownership(actor, dest)?;
                if from == here {
                    narrator.narrate(&format!("{name} leaves {direction}."));
                } else if dest == here {
                    narrator.narrate(&format!("{name} arrives."));
                }
                Ok(Flow::Continue)
            }
            ActorDecision::Say(text) => {
                if from == here {
                    narrator.narrate(&format!("{name} says, \"{text}\""));
                }
                Ok(Flow::Continue)
            }
            ActorDecision::Attack(target) => {
                if target != player || from != here || self.encounter.is_some() {
                    warn!(%actor, %target, "attack cannot be honoured, passing");
                    return Ok(Flow::Continue);
                }

                let mut encounter =
                    combat::start_encounter(&self.world.registry, here, player, &[actor, player], actor, &self.rules)?;
                narrator.narrate(&format!("{name} attacks!"));

                let generation = self.generation;
                let result = self.open_fight(&mut encounter, actor, narrator, report);
                self.keep_encounter(encounter, generation, result.is_err());
                result
            }
        }
    }

    /// An autonomous actor's opening blow, then the rounds that follow.
    fn open_fight(
        &mut self,
        encounter: &mut CombatEncounter,
        actor: ThingId,
        narrator: &mut dyn Narrator,
        report: &mut TurnReport,
    ) -> Result<Flow> {
        let player = self.world.player;
        match self.combat_action(encounter, actor, CombatDecision::Attack(player), narrator, report)? {
            Resolution::Done(Flow::Stop) => return Ok(Flow::Stop),
            Resolution::Done(Flow::Continue) => {}
            Resolution::Rejected(rejection) => {
                warn!(%actor, ?rejection, "opening attack refused, passing");
            }
        }
        self.settle_combat(encounter, narrator, report)
    }

    /// The player's combat turn, then everyone else's until it is the
    /// player's turn again or the encounter ends.
    ///
    /// On an error the encounter is kept as it stood when the error surfaced.
    fn combat_turn(&mut self, decision: CombatDecision, narrator: &mut dyn Narrator) -> Result<TurnReport> {
        let Some(mut encounter) = self.encounter.take() else {
            return Ok(TurnReport::default());
        };
        let generation = self.generation;
        let mut report = TurnReport::taken();

        let resolved = self.combat_round(&mut encounter, decision, narrator, &mut report);
        self.keep_encounter(encounter, generation, resolved.is_err());
        match resolved? {
            Resolution::Rejected(rejection) => {
                narrator.narrate(rejection.message());
                Ok(TurnReport::default())
            }
            Resolution::Done(Flow::Stop) => Ok(report),
            Resolution::Done(Flow::Continue) => self.finish_turn(narrator, report),
        }
    }

    fn combat_round(
        &mut self,
        encounter: &mut CombatEncounter,
        decision: CombatDecision,
        narrator: &mut dyn Narrator,
        report: &mut TurnReport,
    ) -> Result<Resolution<Flow>> {
        let player = self.world.player;
        match self.combat_action(encounter, player, decision, narrator, report)? {
            Resolution::Done(Flow::Continue) => {}
            other => return Ok(other),
        }
        Ok(Resolution::Done(self.settle_combat(encounter, narrator, report)?))
    }

    /// Put an encounter back unless the world was replaced under it. A
    /// finished encounter is kept only when the turn failed.
    fn keep_encounter(&mut self, encounter: CombatEncounter, generation: u64, failed: bool) {
        if self.generation != generation {
            return;
        }
        if failed || (!encounter.is_over() && !self.ended) {
            self.encounter = Some(encounter);
        }
    }

    /// One participant's attack, flee or pass.
    fn combat_action(
        &mut self,
        encounter: &mut CombatEncounter,
        actor: ThingId,
        decision: CombatDecision,
        narrator: &mut dyn Narrator,
        report: &mut TurnReport,
    ) -> Result<Resolution<Flow>> {
        match decision {
            CombatDecision::Attack(target) => {
                let resolution = combat::attack(
                    &mut self.world.registry,
                    encounter,
                    actor,
                    target,
                    self.resolver.as_mut(),
                    &self.rules,
                )?;
                let outcome = match resolution {
                    Resolution::Done(outcome) => outcome,
                    Resolution::Rejected(rejection) => return Ok(Resolution::Rejected(rejection)),
                };

                let attacker = capitalize(&self.describe(actor));
                let victim = self.describe(target);
                let by_player = actor == self.world.player;
                if outcome.hit {
                    let verb = if by_player { "hit" } else { "hits" };
                    narrator.narrate(&format!("{attacker} {verb} {victim} for {}.", outcome.damage_applied));
                } else {
                    let verb = if by_player { "miss" } else { "misses" };
                    narrator.narrate(&format!("{attacker} {verb} {victim}."));
                }
                if outcome.target_defeated && target != self.world.player {
                    narrator.narrate(&format!("{} falls.", capitalize(&victim)));
                }

                let mut fired = self.fire_trigger(EventKind::OnAttack, Some(target), Some(actor))?;
                if outcome.target_defeated {
                    fired.merge(self.fire_trigger(EventKind::OnDefeat, Some(target), Some(actor))?);
                }
                Ok(Resolution::Done(self.apply(fired, narrator, report)?))
            }
            CombatDecision::Flee => {
                let resolution = combat::flee(
                    &self.world.registry,
                    encounter,
                    actor,
                    self.resolver.as_mut(),
                    &self.rules,
                )?;
                let outcome = match resolution {
                    Resolution::Done(outcome) => outcome,
                    Resolution::Rejected(rejection) => return Ok(Resolution::Rejected(rejection)),
                };

                let line = match (actor == self.world.player, outcome.escaped) {
                    (true, true) => "You break away from the fight.".to_string(),
                    (true, false) => "You try to run, but cannot get away.".to_string(),
                    (false, true) => format!("{} flees.", capitalize(&self.describe(actor))),
                    (false, false) => format!("{} tries to flee, but fails.", capitalize(&self.describe(actor))),
                };
                narrator.narrate(&line);
                Ok(Resolution::Done(Flow::Continue))
            }
            CombatDecision::Pass => Ok(match combat::pass(encounter, actor) {
                Resolution::Done(()) => Resolution::Done(Flow::Continue),
                Resolution::Rejected(rejection) => Resolution::Rejected(rejection),
            }),
        }
    }

    /// Advance and check the encounter, running non-player turns, until the
    /// player is up again or the encounter ends.
    fn settle_combat(
        &mut self,
        encounter: &mut CombatEncounter,
        narrator: &mut dyn Narrator,
        report: &mut TurnReport,
    ) -> Result<Flow> {
        let player = self.world.player;
        loop {
            combat::advance_turn(&self.world.registry, encounter);
            if let Some(end) = combat::check_end(&self.world.registry, encounter, player) {
                report.combat_end = Some(end);
                return self.conclude_combat(end, narrator, report);
            }

            let Some(current) = encounter.current_actor() else {
                return Ok(Flow::Continue);
            };
            if current == player {
                return Ok(Flow::Continue);
            }

            let decision = self
                .brain
                .decide_combat(&self.world.registry, encounter, current)
                .unwrap_or(CombatDecision::Pass);
            match self.combat_action(encounter, current, decision, narrator, report)? {
                Resolution::Done(Flow::Stop) => return Ok(Flow::Stop),
                Resolution::Done(Flow::Continue) => {}
                Resolution::Rejected(rejection) => {
                    warn!(actor = %current, ?decision, ?rejection, "combat decision refused, passing");
                    combat::pass(encounter, current);
                }
            }
        }
    }

    fn conclude_combat(&mut self, end: CombatEnd, narrator: &mut dyn Narrator, report: &mut TurnReport) -> Result<Flow> {
        match end {
            CombatEnd::Victory => narrator.narrate("The fight is over. You stand victorious."),
            CombatEnd::HostilesFled => narrator.narrate("Your foes scatter and the fight is over."),
            CombatEnd::PlayerFled => {
                let player = self.world.player;
                let here = self.location()?;
                match self.previous {
                    Some(back) if back != here => {
                        self.world.registry.move_ownership(player, back)?;
                        self.previous = Some(here);
                        narrator.narrate("You escape the way you came.");
                    }
                    _ => narrator.narrate("You slip out of reach."),
                }
            }
            CombatEnd::PlayerDefeated => {
                narrator.narrate("You have been defeated.");
                return self.apply(TriggerOutcome::reset(ResetReason::death(), None), narrator, report);
            }
        }
        Ok(Flow::Continue)
    }

    /// "you" for the player, "the <label>" for anything else.
    fn describe(&self, id: ThingId) -> String {
        if id == self.world.player {
            return "you".to_string();
        }
        self.world
            .registry
            .get(id)
            .map(|thing| format!("the {}", thing.label))
            .unwrap_or_else(|| "something".to_string())
    }
}

/// Exit directions as seen from `place`.
fn exits_from(registry: &Registry, place: ThingId) -> Vec<String> {
    registry
        .passages_from(place)
        .into_iter()
        .filter(|thing| thing.visible)
        .filter_map(|thing| thing.as_passage())
        .filter_map(|passage| {
            if passage.from == place {
                Some(passage.direction.clone())
            } else {
                passage.back.clone()
            }
        })
        .collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
