//! Entity registry - the arena holding every thing plus the receipt log.
//!
//! All other components read and write things through the registry. Lookups
//! on unknown ids return `None`; operations that *require* an id fail with
//! [`KernelError::UnknownThing`].

mod ownership;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::cells::{ConsumeReceipt, LoggedReceipt, Receipt, TransferReceipt};
use crate::entities::{Thing, ThingId, WorldStateData, WORLD_STATE_KEY};
use crate::error::{KernelError, Result};

/// The authoritative store of world state for one loop.
///
/// Things are kept in insertion order so that iteration (and therefore
/// participant lists and trigger evaluation) is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    things: HashMap<ThingId, Thing>,
    order: Vec<ThingId>,
    receipts: Vec<LoggedReceipt>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thing. Re-inserting an existing id replaces it in place.
    pub fn insert(&mut self, thing: Thing) -> ThingId {
        let id = thing.id;
        if self.things.insert(id, thing).is_none() {
            self.order.push(id);
        }
        id
    }

    /// Look up a thing, if present.
    pub fn get(&self, id: ThingId) -> Option<&Thing> {
        self.things.get(&id)
    }

    /// Mutable lookup, if present.
    pub fn get_mut(&mut self, id: ThingId) -> Option<&mut Thing> {
        self.things.get_mut(&id)
    }

    /// Look up a thing an operation cannot proceed without.
    pub fn require(&self, id: ThingId) -> Result<&Thing> {
        self.things.get(&id).ok_or(KernelError::UnknownThing(id))
    }

    /// Mutable [`Registry::require`]; an unknown id is an error.
    pub fn require_mut(&mut self, id: ThingId) -> Result<&mut Thing> {
        self.things.get_mut(&id).ok_or(KernelError::UnknownThing(id))
    }

    /// Whether a thing with this id exists.
    pub fn contains(&self, id: ThingId) -> bool {
        self.things.contains_key(&id)
    }

    /// Number of things.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True before anything is inserted.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every thing, in insertion order.
    ///
    /// The shared borrow guarantees the view cannot change while it is held.
    pub fn everything(&self) -> impl Iterator<Item = &Thing> {
        self.order.iter().filter_map(|id| self.things.get(id))
    }

    /// First thing with the given label, in insertion order.
    pub fn find_by_label(&self, label: &str) -> Option<&Thing> {
        self.everything().find(|thing| thing.answers_to(label))
    }

    /// Reassign the owner of a thing and return the previous owner.
    ///
    /// Acyclicity is not checked here; chain resolution detects cycles.
    pub fn move_ownership(&mut self, thing: ThingId, new_owner: ThingId) -> Result<Option<ThingId>> {
        if !self.contains(new_owner) {
            return Err(KernelError::UnknownThing(new_owner));
        }
        let entry = self.require_mut(thing)?;
        let previous = entry.owner.replace(new_owner);
        debug!(%thing, ?previous, %new_owner, "ownership moved");
        Ok(previous)
    }

    pub fn world_state_id(&self) -> ThingId {
        ThingId::from_key(WORLD_STATE_KEY)
    }

    pub fn world_state(&self) -> Result<&WorldStateData> {
        self.get(self.world_state_id())
            .and_then(Thing::as_world_state)
            .ok_or(KernelError::MissingWorldState)
    }

    pub fn world_state_mut(&mut self) -> Result<&mut WorldStateData> {
        let id = self.world_state_id();
        self.get_mut(id)
            .and_then(Thing::as_world_state_mut)
            .ok_or(KernelError::MissingWorldState)
    }

    /// Current world clock, read from the named counter (0 without a world state).
    pub fn clock(&self, counter: &str) -> u64 {
        self.world_state()
            .map(|state| state.counter(counter).max(0) as u64)
            .unwrap_or(0)
    }

    /// Append a cell mutation to the receipt log.
    pub fn record_cell_mutation(&mut self, receipt: ConsumeReceipt) -> u64 {
        self.record_receipt(Receipt::Consume(receipt))
    }

    /// Append a cell transfer to the receipt log.
    pub fn record_cell_transfer(&mut self, receipt: TransferReceipt) -> u64 {
        self.record_receipt(Receipt::Transfer(receipt))
    }

    /// Append any receipt and return its sequence number.
    pub fn record_receipt(&mut self, receipt: Receipt) -> u64 {
        let seq = self.receipts.len() as u64;
        self.receipts.push(LoggedReceipt { seq, receipt });
        seq
    }

    /// All receipts in application order.
    pub fn receipts(&self) -> &[LoggedReceipt] {
        &self.receipts
    }

    /// Receipts recorded at or after `seq`.
    pub fn receipts_since(&self, seq: u64) -> &[LoggedReceipt] {
        let start = (seq as usize).min(self.receipts.len());
        &self.receipts[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::Cell;

    fn sample() -> Registry {
        let mut registry = Registry::new();
        let hall = registry.insert(Thing::place("place:hall", "Hall"));
        registry.insert(Thing::world_state());
        registry.insert(Thing::actor("actor:hero", "Hero").with_owner(hall));
        registry.insert(Thing::item("item:lamp", "lamp").with_owner(hall));
        registry
    }

    #[test]
    fn test_lookup_unknown_is_absent() {
        let registry = sample();
        assert!(registry.get(ThingId::new()).is_none());
        assert!(matches!(
            registry.require(ThingId::nil()),
            Err(KernelError::UnknownThing(_))
        ));

        let mut registry = registry;
        assert!(!registry.contains(ThingId::nil()));
        assert!(registry.get_mut(ThingId::nil()).is_none());
        assert!(matches!(
            registry.require_mut(ThingId::nil()),
            Err(KernelError::UnknownThing(_))
        ));
        assert!(!registry.is_empty());
        assert!(Registry::new().is_empty());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut registry = sample();
        let before = registry.len();
        registry.insert(Thing::item("item:lamp", "lamp").with_cell("oil", Cell::full(3.0)));

        assert_eq!(registry.len(), before);
        let lamp = registry.find_by_label("lamp").unwrap();
        assert!(lamp.cell("oil").is_some());
    }

    #[test]
    fn test_everything_keeps_insertion_order() {
        let registry = sample();
        let labels: Vec<_> = registry.everything().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["Hall", "world", "Hero", "lamp"]);
    }

    #[test]
    fn test_move_ownership_returns_previous() {
        let mut registry = sample();
        let hall = ThingId::from_key("place:hall");
        let hero = ThingId::from_key("actor:hero");
        let lamp = ThingId::from_key("item:lamp");

        let previous = registry.move_ownership(lamp, hero).unwrap();
        assert_eq!(previous, Some(hall));
        assert_eq!(registry.get(lamp).unwrap().owner, Some(hero));

        assert!(registry.move_ownership(lamp, ThingId::new()).is_err());
    }

    #[test]
    fn test_receipts_are_sequenced() {
        let mut registry = sample();
        let first = registry.record_receipt(Receipt::note("look", "hall"));
        let second = registry.record_receipt(Receipt::note("look", "yard"));

        assert_eq!((first, second), (0, 1));
        assert_eq!(registry.receipts().len(), 2);
        assert_eq!(registry.receipts_since(1).len(), 1);
        assert!(registry.receipts_since(10).is_empty());
    }

    #[test]
    fn test_world_state_access() {
        let mut registry = sample();
        registry.world_state_mut().unwrap().bump("clock", 4);
        assert_eq!(registry.clock("clock"), 4);

        let empty = Registry::new();
        assert!(matches!(empty.world_state(), Err(KernelError::MissingWorldState)));
        assert_eq!(empty.clock("clock"), 0);
    }
}
