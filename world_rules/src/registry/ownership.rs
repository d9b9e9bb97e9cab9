//! Ownership forest queries.
//!
//! Owners are validated lazily: writes are cheap, and every walk up the
//! chain checks that it reaches a place without revisiting an id.

use std::collections::HashSet;

use super::Registry;
use crate::entities::{Thing, ThingId, ThingKind};
use crate::error::{KernelError, Result};

impl Registry {
    /// The ownership chain from `id` up to and including its place.
    ///
    /// Terminates in at most `len()` steps or fails with an integrity error.
    pub fn chain_of(&self, id: ThingId) -> Result<Vec<ThingId>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.require(id)?;

        loop {
            if !seen.insert(current.id) {
                return Err(KernelError::OwnershipCycle {
                    start: id,
                    repeated: current.id,
                });
            }
            chain.push(current.id);

            if current.is_place() {
                return Ok(chain);
            }
            let owner = current.owner.ok_or(KernelError::UnrootedChain {
                start: id,
                last: current.id,
            })?;
            current = self.require(owner)?;
        }
    }

    /// The place that ultimately contains `id` (a place contains itself).
    pub fn owning_place(&self, id: ThingId) -> Result<ThingId> {
        self.chain_of(id)?
            .last()
            .copied()
            .ok_or(KernelError::UnknownThing(id))
    }

    /// Whether `holder` appears on the ownership chain of `id`.
    pub fn is_within(&self, id: ThingId, holder: ThingId) -> Result<bool> {
        Ok(self.chain_of(id)?.iter().skip(1).any(|link| *link == holder))
    }

    /// Things directly owned by `owner`, in insertion order.
    pub fn contents_of(&self, owner: ThingId) -> Vec<&Thing> {
        self.everything()
            .filter(|thing| thing.owner == Some(owner))
            .collect()
    }

    /// Visible things directly inside a place.
    pub fn visible_at(&self, place: ThingId) -> Vec<&Thing> {
        self.everything()
            .filter(|thing| thing.owner == Some(place) && thing.visible)
            .collect()
    }

    /// Visible actors directly inside a place.
    pub fn actors_at(&self, place: ThingId) -> Vec<&Thing> {
        self.visible_at(place)
            .into_iter()
            .filter(|thing| thing.kind() == ThingKind::Actor)
            .collect()
    }

    /// A directly owned thing answering to `label`.
    pub fn find_in(&self, owner: ThingId, label: &str) -> Option<&Thing> {
        self.everything()
            .find(|thing| thing.owner == Some(owner) && thing.answers_to(label))
    }

    /// Passages touching a place, in insertion order.
    pub fn passages_from(&self, place: ThingId) -> Vec<&Thing> {
        self.everything()
            .filter(|thing| thing.as_passage().is_some_and(|p| p.touches(place)))
            .collect()
    }

    /// The passage leaving `place` in `direction`, with the place it leads to.
    pub fn passage_toward(&self, place: ThingId, direction: &str) -> Option<(&Thing, ThingId)> {
        self.passages_from(place).into_iter().find_map(|thing| {
            thing
                .as_passage()
                .and_then(|passage| passage.leads(place, direction))
                .map(|dest| (thing, dest))
        })
    }

    /// Whether `item` fits into `container` next to what it already holds.
    ///
    /// Each item must fit the interior on both axes, and the summed
    /// footprint area must not exceed the interior area.
    pub fn can_stow(&self, item: ThingId, container: ThingId) -> Result<bool> {
        let item_thing = self.require(item)?;
        let container_thing = self.require(container)?;

        let (Some(item_data), Some(interior)) = (
            item_thing.as_item(),
            container_thing.as_item().and_then(|c| c.interior),
        ) else {
            return Ok(false);
        };
        if item == container || self.is_within(container, item)? {
            return Ok(false);
        }
        if !interior.contains(&item_data.footprint) {
            return Ok(false);
        }

        let used: u64 = self
            .contents_of(container)
            .iter()
            .filter(|thing| thing.id != item)
            .filter_map(|thing| thing.as_item())
            .map(|data| data.footprint.area())
            .sum();
        Ok(used + item_data.footprint.area() <= interior.area())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Footprint, PassageData};

    fn keyed(key: &str) -> ThingId {
        ThingId::from_key(key)
    }

    fn world() -> Registry {
        let mut registry = Registry::new();
        let hall = registry.insert(Thing::place("hall", "Hall"));
        let yard = registry.insert(Thing::place("yard", "Yard"));
        let hero = registry.insert(Thing::actor("hero", "Hero").with_owner(hall));
        let bag = registry.insert(
            Thing::item("bag", "bag")
                .with_owner(hero)
                .with_interior(Footprint::new(2, 2)),
        );
        registry.insert(Thing::item("coin", "coin").with_owner(bag));
        registry.insert(Thing::actor("ghost", "Ghost").with_owner(hall).hidden());
        registry.insert(Thing::passage(
            "door",
            "door",
            PassageData {
                from: hall,
                to: yard,
                direction: "north".into(),
                back: Some("south".into()),
                open_when: None,
            },
        ));
        registry
    }

    #[test]
    fn test_chain_reaches_place() {
        let registry = world();
        let chain = registry.chain_of(keyed("coin")).unwrap();
        assert_eq!(
            chain,
            vec![keyed("coin"), keyed("bag"), keyed("hero"), keyed("hall")]
        );
        assert_eq!(registry.owning_place(keyed("coin")).unwrap(), keyed("hall"));
        assert_eq!(registry.owning_place(keyed("yard")).unwrap(), keyed("yard"));
    }

    #[test]
    fn test_cycle_is_integrity_violation() {
        let mut registry = world();
        registry.move_ownership(keyed("bag"), keyed("coin")).unwrap();

        let err = registry.owning_place(keyed("coin")).unwrap_err();
        assert!(matches!(err, KernelError::OwnershipCycle { .. }));
    }

    #[test]
    fn test_unrooted_chain_is_integrity_violation() {
        let mut registry = world();
        registry.insert(Thing::item("stray", "stray"));

        let err = registry.owning_place(keyed("stray")).unwrap_err();
        assert!(matches!(err, KernelError::UnrootedChain { .. }));
    }

    #[test]
    fn test_dangling_owner_is_integrity_violation() {
        let mut registry = world();
        registry.get_mut(keyed("coin")).unwrap().owner = Some(ThingId::new());

        let err = registry.owning_place(keyed("coin")).unwrap_err();
        assert!(matches!(err, KernelError::UnknownThing(_)));
    }

    #[test]
    fn test_visibility_queries() {
        let registry = world();
        let hall = keyed("hall");

        let actors: Vec<_> = registry.actors_at(hall).iter().map(|t| t.id).collect();
        assert_eq!(actors, vec![keyed("hero")]);
        assert_eq!(registry.contents_of(hall).len(), 2);
        assert!(registry.find_in(keyed("hero"), "BAG").is_some());
        assert!(registry.is_within(keyed("coin"), keyed("hero")).unwrap());
    }

    #[test]
    fn test_passage_lookup() {
        let registry = world();
        let (door, dest) = registry.passage_toward(keyed("hall"), "north").unwrap();
        assert_eq!(door.label, "door");
        assert_eq!(dest, keyed("yard"));
        assert!(registry.passage_toward(keyed("yard"), "south").is_some());
        assert!(registry.passage_toward(keyed("hall"), "west").is_none());
    }

    #[test]
    fn test_can_stow_checks_space() {
        let mut registry = world();
        let bag = keyed("bag");
        let hall = keyed("hall");

        registry.insert(Thing::item("brick", "brick").with_owner(hall).with_footprint(Footprint::new(2, 1)));
        registry.insert(Thing::item("plank", "plank").with_owner(hall).with_footprint(Footprint::new(3, 1)));
        registry.insert(Thing::item("slab", "slab").with_owner(hall).with_footprint(Footprint::new(2, 2)));

        assert!(registry.can_stow(keyed("brick"), bag).unwrap());
        assert!(!registry.can_stow(keyed("plank"), bag).unwrap());
        // coin already takes one cell of four
        assert!(!registry.can_stow(keyed("slab"), bag).unwrap());
        assert!(!registry.can_stow(bag, bag).unwrap());
    }
}
