//! Entity definitions for the simulated world.
//!
//! Every entity is a [`Thing`]: a shared envelope (id, label, description,
//! owner, cells) around a closed set of variants (place, actor, item,
//! passage, world state). Callers branch on [`ThingKind`], never on depth.

mod components;
mod thing;

pub use components::*;
pub use thing::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for key-derived thing ids.
const THING_NAMESPACE: Uuid = Uuid::from_u128(0x6c6f_6f70_7772_6967_6874_5f74_6869_6e67);

/// Unique identifier for all things in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThingId(pub Uuid);

impl ThingId {
    /// Create a new random thing ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable ID from an authoring key.
    ///
    /// The same key always yields the same id, so rebuilding a world from
    /// the same source produces identical identifiers.
    pub fn from_key(key: &str) -> Self {
        Self(Uuid::new_v5(&THING_NAMESPACE, key.as_bytes()))
    }

    /// Create a thing ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a nil/empty thing ID (useful for defaults).
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for ThingId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The variant tag of a thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThingKind {
    Place,
    Actor,
    Item,
    Passage,
    WorldState,
}

impl std::fmt::Display for ThingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ThingKind::Place => "place",
            ThingKind::Actor => "actor",
            ThingKind::Item => "item",
            ThingKind::Passage => "passage",
            ThingKind::WorldState => "world state",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derived_ids_are_stable() {
        assert_eq!(ThingId::from_key("place:cellar"), ThingId::from_key("place:cellar"));
        assert_ne!(ThingId::from_key("place:cellar"), ThingId::from_key("place:attic"));
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(ThingId::new(), ThingId::new());
        assert_eq!(ThingId::nil(), ThingId::from_uuid(Uuid::nil()));
    }
}
