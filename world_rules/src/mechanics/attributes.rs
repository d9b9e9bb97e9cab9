//! Attribute lookups over registry things.

use super::AttributeSource;
use crate::entities::{Thing, ThingId};
use crate::registry::Registry;

/// Exposes a subject (and optionally a target) to the expression resolver.
///
/// Recognised paths, each also available behind a `target.` prefix:
///
/// - `skill.<name>` - actor skill rating
/// - `cell.<name>` / `cap.<name>` - cell amount / capacity
/// - `weapon.hit` - best hit bonus among equipped weapons
/// - `armor` - summed armour of equipped items
/// - `visible` - 1 when the thing is visible
///
/// and, from the world-state record, `counter.<name>` and `flag.<name>`.
/// Missing skills, cells, counters and flags read as 0.
pub struct ThingAttributes<'a> {
    registry: &'a Registry,
    subject: Option<&'a Thing>,
    target: Option<&'a Thing>,
}

impl<'a> ThingAttributes<'a> {
    /// Attributes with no subject: only world-state paths resolve.
    pub fn world(registry: &'a Registry) -> Self {
        Self {
            registry,
            subject: None,
            target: None,
        }
    }

    pub fn of(registry: &'a Registry, subject: ThingId) -> Self {
        Self {
            registry,
            subject: registry.get(subject),
            target: None,
        }
    }

    pub fn against(registry: &'a Registry, subject: ThingId, target: ThingId) -> Self {
        Self {
            registry,
            subject: registry.get(subject),
            target: registry.get(target),
        }
    }

    fn equipped(&self, thing: &Thing) -> Vec<&'a Thing> {
        thing
            .as_actor()
            .map(|actor| {
                actor
                    .equipped
                    .values()
                    .filter_map(|id| self.registry.get(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn thing_value(&self, thing: &Thing, path: &str) -> Option<f64> {
        if let Some(name) = path.strip_prefix("skill.") {
            let rating = thing.as_actor().and_then(|actor| actor.skill(name)).unwrap_or(0);
            return Some(rating as f64);
        }
        if let Some(name) = path.strip_prefix("cell.") {
            return Some(thing.cell(name).map(|c| c.amount()).unwrap_or(0.0));
        }
        if let Some(name) = path.strip_prefix("cap.") {
            return Some(thing.cell(name).map(|c| c.capacity()).unwrap_or(0.0));
        }
        match path {
            "weapon.hit" => {
                let bonus = self
                    .equipped(thing)
                    .into_iter()
                    .filter_map(|item| item.as_item().and_then(|data| data.weapon.as_ref()))
                    .map(|weapon| weapon.hit_bonus)
                    .max()
                    .unwrap_or(0);
                Some(bonus as f64)
            }
            "armor" => {
                let total: i64 = self
                    .equipped(thing)
                    .into_iter()
                    .filter_map(|item| item.as_item())
                    .map(|data| data.armor)
                    .sum();
                Some(total as f64)
            }
            "visible" => Some(if thing.visible { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn world_value(&self, path: &str) -> Option<f64> {
        let state = self.registry.world_state().ok();
        if let Some(name) = path.strip_prefix("counter.") {
            return Some(state.map(|s| s.counter(name)).unwrap_or(0) as f64);
        }
        if let Some(name) = path.strip_prefix("flag.") {
            let value = state
                .and_then(|s| s.flag(name))
                .and_then(|flag| flag.as_number())
                .unwrap_or(0.0);
            return Some(value);
        }
        None
    }
}

impl AttributeSource for ThingAttributes<'_> {
    fn lookup(&self, path: &str) -> Option<f64> {
        if let Some(value) = self.world_value(path) {
            return Some(value);
        }
        if let Some(rest) = path.strip_prefix("target.") {
            return self.target.and_then(|target| self.thing_value(target, rest));
        }
        self.subject.and_then(|subject| self.thing_value(subject, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::Cell;
    use crate::entities::{EquipmentSlot, FlagValue};

    fn world() -> Registry {
        let mut registry = Registry::new();
        let arena = registry.insert(Thing::place("arena", "Arena"));
        registry.insert(Thing::world_state());
        let sword = registry.insert(Thing::item("sword", "sword").with_weapon(2, "1d8"));
        let shield = registry.insert(Thing::item("shield", "shield").with_armor(3));
        let helm = registry.insert(Thing::item("helm", "helm").with_armor(1));
        registry.insert(
            Thing::actor("knight", "Knight")
                .with_owner(arena)
                .with_skill("attack", 4)
                .with_cell("health", Cell::new(20.0, 15.0))
                .equipping(EquipmentSlot::MainHand, sword)
                .equipping(EquipmentSlot::OffHand, shield)
                .equipping(EquipmentSlot::Head, helm),
        );
        registry.insert(Thing::actor("rat", "Rat").with_owner(arena));
        registry
    }

    #[test]
    fn test_subject_paths() {
        let registry = world();
        let attrs = ThingAttributes::of(&registry, ThingId::from_key("knight"));

        assert_eq!(attrs.lookup("skill.attack"), Some(4.0));
        assert_eq!(attrs.lookup("skill.sing"), Some(0.0));
        assert_eq!(attrs.lookup("cell.health"), Some(15.0));
        assert_eq!(attrs.lookup("cap.health"), Some(20.0));
        assert_eq!(attrs.lookup("weapon.hit"), Some(2.0));
        assert_eq!(attrs.lookup("armor"), Some(4.0));
        assert_eq!(attrs.lookup("nonsense"), None);
    }

    #[test]
    fn test_target_paths() {
        let registry = world();
        let attrs = ThingAttributes::against(
            &registry,
            ThingId::from_key("rat"),
            ThingId::from_key("knight"),
        );

        assert_eq!(attrs.lookup("armor"), Some(0.0));
        assert_eq!(attrs.lookup("target.armor"), Some(4.0));
        assert_eq!(ThingAttributes::world(&registry).lookup("target.armor"), None);
    }

    #[test]
    fn test_world_paths() {
        let mut registry = world();
        let state = registry.world_state_mut().unwrap();
        state.bump("clock", 7);
        state.flags.insert("bell".into(), FlagValue::Bool(true));

        let attrs = ThingAttributes::world(&registry);
        assert_eq!(attrs.lookup("counter.clock"), Some(7.0));
        assert_eq!(attrs.lookup("flag.bell"), Some(1.0));
        assert_eq!(attrs.lookup("flag.unset"), Some(0.0));
        assert_eq!(attrs.lookup("skill.attack"), None);
    }
}
