//! The `Thing` envelope and its variants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{
    ActorData, Description, EquipmentSlot, Footprint, ItemData, PassageData, PlaceData, ThingId,
    ThingKind, WeaponStats, WorldStateData,
};
use crate::cells::Cell;

/// Authoring key of the world-state singleton.
pub const WORLD_STATE_KEY: &str = "world-state";

/// Closed set of entity variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ThingVariant {
    Place(PlaceData),
    Actor(ActorData),
    Item(ItemData),
    Passage(PassageData),
    WorldState(WorldStateData),
}

/// Any entity in the simulated world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    pub id: ThingId,
    pub label: String,
    pub description: Description,
    pub visible: bool,
    /// The thing that holds or contains this one.
    pub owner: Option<ThingId>,

    /// Named bounded quantities (health, stamina, fuel, ...).
    #[serde(default)]
    pub cells: BTreeMap<String, Cell>,

    /// Authoring metadata the kernel does not interpret.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,

    pub variant: ThingVariant,
}

impl Thing {
    fn with_variant(key: &str, label: impl Into<String>, variant: ThingVariant) -> Self {
        Self {
            id: ThingId::from_key(key),
            label: label.into(),
            description: Description::default(),
            visible: true,
            owner: None,
            cells: BTreeMap::new(),
            extra: HashMap::new(),
            variant,
        }
    }

    /// Create a place at the origin of an unnamed region.
    pub fn place(key: &str, label: impl Into<String>) -> Self {
        Self::with_variant(key, label, ThingVariant::Place(PlaceData::default()))
    }

    pub fn actor(key: &str, label: impl Into<String>) -> Self {
        Self::with_variant(key, label, ThingVariant::Actor(ActorData::default()))
    }

    /// Create a one-by-one item.
    pub fn item(key: &str, label: impl Into<String>) -> Self {
        let data = ItemData {
            footprint: Footprint::new(1, 1),
            ..Default::default()
        };
        Self::with_variant(key, label, ThingVariant::Item(data))
    }

    pub fn passage(key: &str, label: impl Into<String>, data: PassageData) -> Self {
        Self::with_variant(key, label, ThingVariant::Passage(data))
    }

    /// Create the world-state singleton.
    pub fn world_state() -> Self {
        let mut thing = Self::with_variant(
            WORLD_STATE_KEY,
            "world",
            ThingVariant::WorldState(WorldStateData::default()),
        );
        thing.visible = false;
        thing
    }

    pub fn with_description(mut self, description: Description) -> Self {
        self.description = description;
        self
    }

    pub fn with_owner(mut self, owner: ThingId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_cell(mut self, name: impl Into<String>, cell: Cell) -> Self {
        self.cells.insert(name.into(), cell);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Place region and grid coordinates. No-op on other variants.
    pub fn at_grid(mut self, region: impl Into<String>, x: i32, y: i32) -> Self {
        if let ThingVariant::Place(place) = &mut self.variant {
            place.region = region.into();
            place.x = x;
            place.y = y;
        }
        self
    }

    pub fn with_skill(mut self, name: impl Into<String>, rating: i64) -> Self {
        if let Some(actor) = self.as_actor_mut() {
            actor.skills.insert(name.into(), rating);
        }
        self
    }

    pub fn equipping(mut self, slot: EquipmentSlot, item: ThingId) -> Self {
        if let Some(actor) = self.as_actor_mut() {
            actor.equipped.insert(slot, item);
        }
        self
    }

    pub fn autonomous(mut self) -> Self {
        if let Some(actor) = self.as_actor_mut() {
            actor.autonomous = true;
        }
        self
    }

    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.footprint = footprint;
        }
        self
    }

    pub fn with_interior(mut self, interior: Footprint) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.interior = Some(interior);
        }
        self
    }

    pub fn fixture(mut self) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.fixture = true;
        }
        self
    }

    pub fn with_weapon(mut self, hit_bonus: i64, damage: impl Into<String>) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.weapon = Some(WeaponStats {
                hit_bonus,
                damage: damage.into(),
            });
        }
        self
    }

    pub fn with_armor(mut self, armor: i64) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.armor = armor;
        }
        self
    }

    /// Make the item hand over `amount` of `cell` when used on something.
    pub fn usable(mut self, cell: impl Into<String>, amount: f64) -> Self {
        if let Some(item) = self.as_item_mut() {
            item.use_cell = Some(cell.into());
            item.use_amount = amount;
        }
        self
    }

    pub fn kind(&self) -> ThingKind {
        match self.variant {
            ThingVariant::Place(_) => ThingKind::Place,
            ThingVariant::Actor(_) => ThingKind::Actor,
            ThingVariant::Item(_) => ThingKind::Item,
            ThingVariant::Passage(_) => ThingKind::Passage,
            ThingVariant::WorldState(_) => ThingKind::WorldState,
        }
    }

    pub fn is_place(&self) -> bool {
        matches!(self.variant, ThingVariant::Place(_))
    }

    pub fn is_actor(&self) -> bool {
        matches!(self.variant, ThingVariant::Actor(_))
    }

    pub fn as_place(&self) -> Option<&PlaceData> {
        match &self.variant {
            ThingVariant::Place(place) => Some(place),
            _ => None,
        }
    }

    pub fn as_actor(&self) -> Option<&ActorData> {
        match &self.variant {
            ThingVariant::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    pub fn as_actor_mut(&mut self) -> Option<&mut ActorData> {
        match &mut self.variant {
            ThingVariant::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&ItemData> {
        match &self.variant {
            ThingVariant::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut ItemData> {
        match &mut self.variant {
            ThingVariant::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_passage(&self) -> Option<&PassageData> {
        match &self.variant {
            ThingVariant::Passage(passage) => Some(passage),
            _ => None,
        }
    }

    pub fn as_world_state(&self) -> Option<&WorldStateData> {
        match &self.variant {
            ThingVariant::WorldState(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_world_state_mut(&mut self) -> Option<&mut WorldStateData> {
        match &mut self.variant {
            ThingVariant::WorldState(state) => Some(state),
            _ => None,
        }
    }

    /// Whether the thing can be carried by an actor.
    pub fn is_portable(&self) -> bool {
        self.as_item().is_some_and(|item| !item.fixture)
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cells.get(name)
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        self.cells.get_mut(name)
    }

    /// Whether the named cell exists and is empty.
    pub fn is_spent(&self, cell: &str) -> bool {
        self.cells.get(cell).is_some_and(Cell::is_empty)
    }

    /// Case-insensitive label match.
    pub fn answers_to(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_actor() {
        let hero = Thing::actor("actor:hero", "Hero")
            .with_skill("attack", 3)
            .with_cell("health", Cell::full(10.0));

        assert_eq!(hero.kind(), ThingKind::Actor);
        assert_eq!(hero.as_actor().and_then(|a| a.skill("attack")), Some(3));
        assert!(hero.visible);
        assert!(hero.owner.is_none());
        assert!(!hero.is_spent("health"));
    }

    #[test]
    fn test_variant_builders_ignore_other_kinds() {
        let place = Thing::place("place:hall", "Hall").with_skill("attack", 9);
        assert!(place.as_actor().is_none());
        assert!(place.is_place());

        let anvil = Thing::item("item:anvil", "anvil").fixture();
        assert!(!anvil.is_portable());
        assert!(Thing::item("item:coin", "coin").is_portable());
    }

    #[test]
    fn test_world_state_singleton() {
        let state = Thing::world_state();
        assert_eq!(state.id, ThingId::from_key(WORLD_STATE_KEY));
        assert!(!state.visible);
        assert!(state.as_world_state().is_some());
    }

    #[test]
    fn test_answers_to_is_case_insensitive() {
        let lamp = Thing::item("item:lamp", "Brass Lamp");
        assert!(lamp.answers_to("brass lamp "));
        assert!(!lamp.answers_to("lamp"));
    }
}
