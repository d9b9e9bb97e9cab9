//! Kernel configuration, loadable from TOML.
//!
//! ```toml
//! seed = 42
//!
//! [rules]
//! health_cell = "health"
//!
//! [loop]
//! turn_limit = 120
//! persistent_flags = ["knows_the_bell"]
//!
//! [[loop.counter_limits]]
//! counter = "alarm"
//! max = 3
//! reason = "caught"
//!
//! [loop.reset_messages]
//! time-limit = "The bells ring out, and everything begins again."
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use world_rules::RulesConfig;

use crate::error::Result;

fn default_clock_counter() -> String {
    "clock".to_string()
}

fn default_loop_counter() -> String {
    "loop".to_string()
}

fn default_reset_message() -> String {
    "The world folds in on itself, and you wake where it all began.".to_string()
}

/// A counter that resets the loop once it reaches `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterLimit {
    pub counter: String,
    pub max: i64,
    pub reason: String,
}

/// Loop runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// World-state counter advanced once per player turn.
    #[serde(default = "default_clock_counter")]
    pub clock_counter: String,

    /// World-state counter holding the loop iteration.
    #[serde(default = "default_loop_counter")]
    pub loop_counter: String,

    /// Reset with reason `time-limit` once the clock reaches this value.
    #[serde(default)]
    pub turn_limit: Option<u64>,

    #[serde(default)]
    pub counter_limits: Vec<CounterLimit>,

    /// Reset reason -> message narrated on reset.
    #[serde(default)]
    pub reset_messages: BTreeMap<String, String>,

    #[serde(default = "default_reset_message")]
    pub default_reset_message: String,

    /// World-state flags carried into the fresh world.
    #[serde(default)]
    pub persistent_flags: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            clock_counter: default_clock_counter(),
            loop_counter: default_loop_counter(),
            turn_limit: None,
            counter_limits: Vec::new(),
            reset_messages: BTreeMap::new(),
            default_reset_message: default_reset_message(),
            persistent_flags: Vec::new(),
        }
    }
}

impl LoopConfig {
    /// Message for a reset with the given reason.
    pub fn message_for(&self, reason: &str) -> &str {
        self.reset_messages
            .get(reason)
            .map(String::as_str)
            .unwrap_or(&self.default_reset_message)
    }
}

/// Complete configuration for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Seed for the default dice resolver.
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default, rename = "loop")]
    pub looping: LoopConfig,
}

impl KernelConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }
}
