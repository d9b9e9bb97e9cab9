//! # Loop Core
//!
//! The narrative half of the kernel. This crate sits on top of
//! `world_rules`, turns world events into narrative outcomes, and rolls the
//! world back to a fresh snapshot when a loop ends.
//!
//! ## Core Components
//!
//! - **events**: World event types reported by the command layer
//! - **triggers**: Declarative rules mapping events to messages, resets and state changes
//! - **loop_runtime**: Fresh-world construction and time-based reset conditions
//! - **session**: Turn resolution for player commands and autonomous actors
//! - **config**: Kernel configuration loaded from TOML
//!
//! ## Design Philosophy
//!
//! - **State-Driven**: Every decision reads the registry; nothing is cached beside it
//! - **Event-Driven**: Triggers react to events and return data; the session applies it
//! - **All-or-Nothing Resets**: A reset replaces the world wholesale or not at all

pub mod config;
pub mod error;
pub mod events;
pub mod loop_runtime;
pub mod session;
pub mod triggers;

pub use config::*;
pub use error::*;
pub use events::*;
pub use loop_runtime::*;
pub use session::*;
pub use triggers::*;
