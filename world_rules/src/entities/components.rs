//! Variant payloads for things.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ThingId;

/// A description that can evolve with the world clock.
///
/// `variants` maps a clock tick to the text that applies from that tick on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub base: String,
    #[serde(default)]
    pub variants: BTreeMap<u64, String>,
}

impl Description {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Add a variant that takes over from `tick` onwards.
    pub fn with_variant(mut self, tick: u64, text: impl Into<String>) -> Self {
        self.variants.insert(tick, text.into());
        self
    }

    /// The text that applies at the given clock tick.
    pub fn text_at(&self, tick: u64) -> &str {
        self.variants
            .range(..=tick)
            .next_back()
            .map(|(_, text)| text.as_str())
            .unwrap_or(&self.base)
    }
}

/// Width and height on a 2D packing grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `other` fits inside this footprint on both axes.
    pub fn contains(&self, other: &Footprint) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

/// Data specific to places.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceData {
    pub region: String,
    pub x: i32,
    pub y: i32,
}

/// Equipment slots for actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Head,
    Body,
}

/// Data specific to actors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorData {
    /// Skill name -> rating.
    #[serde(default)]
    pub skills: BTreeMap<String, i64>,
    #[serde(default)]
    pub equipped: BTreeMap<EquipmentSlot, ThingId>,
    /// Whether an autonomous brain decides this actor's turns.
    #[serde(default)]
    pub autonomous: bool,
}

impl ActorData {
    pub fn skill(&self, name: &str) -> Option<i64> {
        self.skills.get(name).copied()
    }
}

/// Offensive numbers for an item used as a weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    pub hit_bonus: i64,
    /// Damage expression, e.g. `1d6 + 2`.
    pub damage: String,
}

/// Data specific to items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemData {
    pub footprint: Footprint,
    /// Interior packing grid when the item is a container.
    #[serde(default)]
    pub interior: Option<Footprint>,
    /// Fixtures cannot be picked up or moved by actors.
    #[serde(default)]
    pub fixture: bool,
    #[serde(default)]
    pub weapon: Option<WeaponStats>,
    #[serde(default)]
    pub armor: i64,
    /// Cell this item hands over when used on something.
    #[serde(default)]
    pub use_cell: Option<String>,
    #[serde(default)]
    pub use_amount: f64,
}

impl ItemData {
    pub fn is_container(&self) -> bool {
        self.interior.is_some()
    }
}

/// Data specific to passages.
///
/// A passage joins exactly two places. The direction names the way from
/// `from` to `to`; `back` names the reverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageData {
    pub from: ThingId,
    pub to: ThingId,
    pub direction: String,
    #[serde(default)]
    pub back: Option<String>,
    /// Openness condition; `None` means always open.
    #[serde(default)]
    pub open_when: Option<String>,
}

impl PassageData {
    /// The place on the far side when leaving `place` in `direction`.
    pub fn leads(&self, place: ThingId, direction: &str) -> Option<ThingId> {
        if place == self.from && self.direction.eq_ignore_ascii_case(direction) {
            return Some(self.to);
        }
        match &self.back {
            Some(back) if place == self.to && back.eq_ignore_ascii_case(direction) => {
                Some(self.from)
            }
            _ => None,
        }
    }

    pub fn touches(&self, place: ThingId) -> bool {
        self.from == place || self.to == place
    }
}

/// Flag value types for global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FlagValue {
    /// Numeric view used by the expression resolver.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FlagValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FlagValue::Int(i) => Some(*i as f64),
            FlagValue::Float(f) => Some(*f),
            FlagValue::String(_) => None,
        }
    }
}

/// Singleton record of global counters and flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStateData {
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
}

impl WorldStateData {
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Add `delta` to a counter and return the new value.
    pub fn bump(&mut self, name: &str, delta: i64) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += delta;
        *value
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    pub fn is_set(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(FlagValue::Bool(true)))
    }
}
