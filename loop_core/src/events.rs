//! World events - what the command layer reports to the trigger engine.

use serde::{Deserialize, Serialize};
use world_rules::{Thing, ThingId};

/// Types of world events triggers can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Fired once after every player action.
    OnTurn,
    OnEnter,
    OnTake,
    OnDrop,
    OnUse,
    OnAttack,
    OnDefeat,
}

/// A world event. `target` is what the event is about (the place entered,
/// the item taken, the thing an item is used on); `object` is the
/// instrument, when there is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    pub kind: EventKind,
    pub target_label: Option<String>,
    pub object_label: Option<String>,
    pub target_id: Option<ThingId>,
    pub object_id: Option<ThingId>,
}

impl WorldEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            target_label: None,
            object_label: None,
            target_id: None,
            object_id: None,
        }
    }

    pub fn turn() -> Self {
        Self::new(EventKind::OnTurn)
    }

    /// Event about `target`.
    pub fn about(kind: EventKind, target: &Thing) -> Self {
        Self::new(kind).with_target(target)
    }

    pub fn with_target(mut self, target: &Thing) -> Self {
        self.target_label = Some(target.label.clone());
        self.target_id = Some(target.id);
        self
    }

    pub fn with_object(mut self, object: &Thing) -> Self {
        self.object_label = Some(object.label.clone());
        self.object_id = Some(object.id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builders() {
        let key = Thing::item("item:key", "rusty key");
        let door = Thing::item("item:door", "door").fixture();

        let event = WorldEvent::about(EventKind::OnUse, &door).with_object(&key);
        assert_eq!(event.target_label.as_deref(), Some("door"));
        assert_eq!(event.object_id, Some(key.id));
        assert_eq!(WorldEvent::turn().kind, EventKind::OnTurn);
        assert!(WorldEvent::turn().target_id.is_none());
    }
}
