//! # World Rules
//!
//! The simulation kernel's rules crate: the single source of truth for world
//! state. It owns the entity registry and its ownership forest, the cell
//! algebra with its receipt log, the shared expression resolver, and the
//! turn-based combat engine. It contains no narrative logic.

pub mod cells;
pub mod combat;
pub mod config;
pub mod entities;
pub mod error;
pub mod mechanics;
pub mod registry;

pub use cells::{Cell, ConsumeReceipt, LoggedReceipt, Receipt, TransferReceipt, TransferReceipts};
pub use combat::{
    AttackOutcome, CombatEncounter, CombatEnd, EncounterState, FleeOutcome, Rejection, Resolution,
};
pub use config::RulesConfig;
pub use entities::*;
pub use error::KernelError;
pub use mechanics::{
    AttributeSource, DiceResolver, ExpressionResolver, ResolveError, RollSource, ScriptedRolls,
    SeededRolls, ThingAttributes, Value,
};
pub use registry::Registry;
