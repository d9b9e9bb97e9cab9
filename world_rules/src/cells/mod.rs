//! Cell algebra - bounded quantities attached to things by name.
//!
//! `consume` and `transfer` are the only mutating primitives. Both clamp to
//! `0 ..= capacity`, report what was actually applied, and append receipts
//! to the registry log.

mod receipt;

pub use receipt::*;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::ThingId;
use crate::error::Result;
use crate::registry::Registry;

#[derive(Deserialize)]
struct RawCell {
    capacity: f64,
    amount: f64,
}

/// A bounded quantity: `0 <= amount <= capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCell")]
pub struct Cell {
    capacity: f64,
    amount: f64,
}

impl From<RawCell> for Cell {
    fn from(raw: RawCell) -> Self {
        Cell::new(raw.capacity, raw.amount)
    }
}

/// NaN and infinities count as zero.
fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl Cell {
    /// Create a cell, clamping both values into range. Non-finite values count as zero.
    pub fn new(capacity: f64, amount: f64) -> Self {
        let capacity = finite(capacity).max(0.0);
        Self {
            capacity,
            amount: finite(amount).clamp(0.0, capacity),
        }
    }

    /// A cell holding its full capacity.
    pub fn full(capacity: f64) -> Self {
        Self::new(capacity, capacity)
    }

    /// A cell holding nothing.
    pub fn empty(capacity: f64) -> Self {
        Self::new(capacity, 0.0)
    }

    /// Upper bound on the amount.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Current quantity.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Remaining room before the cell is full.
    pub fn free(&self) -> f64 {
        self.capacity - self.amount
    }

    /// True at zero.
    pub fn is_empty(&self) -> bool {
        self.amount <= 0.0
    }

    /// True at capacity.
    pub fn is_full(&self) -> bool {
        self.amount >= self.capacity
    }

    /// `amount / capacity`, or 0 for a zero-capacity cell.
    pub fn fraction(&self) -> f64 {
        if self.capacity > 0.0 {
            self.amount / self.capacity
        } else {
            0.0
        }
    }

    /// Subtract `delta` (negative replenishes), clamped. Returns the applied delta.
    /// A non-finite delta applies nothing.
    pub fn take(&mut self, delta: f64) -> f64 {
        let old = self.amount;
        self.amount = (old - finite(delta)).clamp(0.0, self.capacity);
        old - self.amount
    }
}

/// Consume `delta` from a named cell on `thing`.
///
/// A missing cell is a no-op: the receipt reports zero applied and is not
/// logged. An unknown thing is an integrity violation.
pub fn consume(registry: &mut Registry, thing: ThingId, cell: &str, delta: f64) -> Result<ConsumeReceipt> {
    let delta = finite(delta);
    let entry = registry.require_mut(thing)?;
    let Some(target) = entry.cell_mut(cell) else {
        return Ok(ConsumeReceipt {
            thing,
            cell: cell.to_string(),
            requested: delta,
            applied: 0.0,
            amount: 0.0,
        });
    };

    let applied = target.take(delta);
    let receipt = ConsumeReceipt {
        thing,
        cell: cell.to_string(),
        requested: delta,
        applied,
        amount: target.amount(),
    };
    debug!(%thing, cell, requested = delta, applied, amount = receipt.amount, "cell consumed");

    registry.record_cell_mutation(receipt.clone());
    Ok(receipt)
}

/// Move up to `amount` of a cell from `source` to `dest`.
///
/// Returns `None` when either side lacks the cell. The quantity moved is
/// `min(amount, source.amount, dest.free)`; whatever does not fit stays on
/// the source. Zero-quantity transfers still produce (and log) receipts.
pub fn transfer(
    registry: &mut Registry,
    source: ThingId,
    dest: ThingId,
    cell: &str,
    amount: f64,
) -> Result<Option<TransferReceipts>> {
    let amount = finite(amount);
    let Some(from_cell) = registry.require(source)?.cell(cell).copied() else {
        return Ok(None);
    };
    let Some(to_cell) = registry.require(dest)?.cell(cell).copied() else {
        return Ok(None);
    };

    let moved = if source == dest {
        0.0
    } else {
        amount.max(0.0).min(from_cell.amount()).min(to_cell.free())
    };

    let from = apply(registry, source, cell, moved)?;
    let to = apply(registry, dest, cell, -moved)?;
    let transfer = TransferReceipt {
        source,
        dest,
        cell: cell.to_string(),
        requested: amount,
        applied: moved,
    };
    debug!(%source, %dest, cell, requested = amount, moved, "cell transferred");

    registry.record_cell_mutation(from.clone());
    registry.record_cell_mutation(to.clone());
    registry.record_cell_transfer(transfer.clone());
    Ok(Some(TransferReceipts { from, to, transfer }))
}

fn apply(registry: &mut Registry, thing: ThingId, cell: &str, delta: f64) -> Result<ConsumeReceipt> {
    let entry = registry.require_mut(thing)?;
    let (applied, amount) = match entry.cell_mut(cell) {
        Some(target) => (target.take(delta), target.amount()),
        None => (0.0, 0.0),
    };
    Ok(ConsumeReceipt {
        thing,
        cell: cell.to_string(),
        requested: delta,
        applied,
        amount,
    })
}

/// Give `dest` an empty cell shaped like the one on `source`.
///
/// Returns `true` when a cell was created. Does nothing if `dest` already
/// has the cell or `source` lacks it.
pub fn ensure_like(registry: &mut Registry, source: ThingId, dest: ThingId, cell: &str) -> Result<bool> {
    let Some(template) = registry.require(source)?.cell(cell).copied() else {
        return Ok(false);
    };
    let target = registry.require_mut(dest)?;
    if target.cells.contains_key(cell) {
        return Ok(false);
    }
    target
        .cells
        .insert(cell.to_string(), Cell::empty(template.capacity()));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Thing;

    fn registry_with(cells: &[(&str, Cell)]) -> Registry {
        let mut registry = Registry::new();
        let place = registry.insert(Thing::place("place", "Place"));
        for (key, cell) in cells {
            registry.insert(Thing::item(key, *key).with_owner(place).with_cell("fuel", *cell));
        }
        registry
    }

    fn amount_of(registry: &Registry, key: &str) -> f64 {
        registry
            .get(ThingId::from_key(key))
            .and_then(|t| t.cell("fuel"))
            .map(Cell::amount)
            .unwrap_or(-1.0)
    }

    #[test]
    fn test_cell_new_clamps() {
        assert_eq!(Cell::new(10.0, 12.0).amount(), 10.0);
        assert_eq!(Cell::new(10.0, -3.0).amount(), 0.0);
        assert_eq!(Cell::new(-1.0, 5.0).capacity(), 0.0);
        assert_eq!(Cell::empty(0.0).fraction(), 0.0);
        assert_eq!(Cell::new(4.0, 1.0).fraction(), 0.25);
    }

    #[test]
    fn test_consume_boundary() {
        let mut registry = registry_with(&[("can", Cell::new(10.0, 3.0))]);
        let can = ThingId::from_key("can");

        let receipt = consume(&mut registry, can, "fuel", 5.0).unwrap();
        assert_eq!(receipt.requested, 5.0);
        assert_eq!(receipt.applied, 3.0);
        assert_eq!(receipt.amount, 0.0);
        assert_eq!(registry.receipts().len(), 1);
    }

    #[test]
    fn test_consume_negative_replenishes_to_capacity() {
        let mut registry = registry_with(&[("can", Cell::new(10.0, 7.0))]);
        let can = ThingId::from_key("can");

        let receipt = consume(&mut registry, can, "fuel", -5.0).unwrap();
        assert_eq!(receipt.applied, -3.0);
        assert_eq!(receipt.amount, 10.0);
    }

    #[test]
    fn test_consume_clamp_property() {
        for (capacity, amount, delta) in [(10.0, 3.0, 5.0), (10.0, 3.0, -20.0), (5.0, 5.0, 0.0), (8.0, 2.0, 1.5)] {
            let mut cell = Cell::new(capacity, amount);
            let applied = cell.take(delta);
            let expected = (amount - delta).clamp(0.0, capacity);
            assert_eq!(cell.amount(), expected);
            assert_eq!(applied, amount - expected);
        }
    }

    #[test]
    fn test_consume_non_finite_is_noop() {
        let mut registry = registry_with(&[("can", Cell::new(10.0, 3.0))]);
        let can = ThingId::from_key("can");

        for delta in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let receipt = consume(&mut registry, can, "fuel", delta).unwrap();
            assert_eq!(receipt.requested, 0.0);
            assert_eq!(receipt.applied, 0.0);
            assert_eq!(receipt.amount, 3.0);
        }

        let cell = Cell::new(10.0, f64::NAN);
        assert_eq!(cell.amount(), 0.0);
        assert_eq!(Cell::new(f64::INFINITY, 4.0).capacity(), 0.0);

        let mut cell = Cell::new(10.0, 3.0);
        assert_eq!(cell.take(f64::NAN), 0.0);
        assert_eq!(cell.amount(), 3.0);
    }

    #[test]
    fn test_consume_missing_cell_is_noop() {
        let mut registry = registry_with(&[("can", Cell::full(10.0))]);
        let can = ThingId::from_key("can");

        let receipt = consume(&mut registry, can, "water", 2.0).unwrap();
        assert_eq!(receipt.applied, 0.0);
        assert!(!receipt.changed());
        assert!(registry.receipts().is_empty());
    }

    #[test]
    fn test_consume_unknown_thing_fails() {
        let mut registry = Registry::new();
        assert!(consume(&mut registry, ThingId::new(), "fuel", 1.0).is_err());
    }

    #[test]
    fn test_transfer_with_shortfall() {
        let mut registry = registry_with(&[("tank", Cell::full(10.0)), ("jar", Cell::new(10.0, 8.0))]);
        let tank = ThingId::from_key("tank");
        let jar = ThingId::from_key("jar");

        let receipts = transfer(&mut registry, tank, jar, "fuel", 5.0).unwrap().unwrap();
        assert_eq!(receipts.transfer.applied, 2.0);
        assert_eq!(receipts.from.applied, 2.0);
        assert_eq!(receipts.to.applied, -2.0);
        assert_eq!(amount_of(&registry, "tank"), 8.0);
        assert_eq!(amount_of(&registry, "jar"), 10.0);
    }

    #[test]
    fn test_transfer_conserves_quantity() {
        let mut registry = registry_with(&[("tank", Cell::new(10.0, 6.0)), ("jar", Cell::new(10.0, 1.0))]);
        let tank = ThingId::from_key("tank");
        let jar = ThingId::from_key("jar");

        let receipts = transfer(&mut registry, tank, jar, "fuel", 4.0).unwrap().unwrap();
        let source_loss = 6.0 - amount_of(&registry, "tank");
        let dest_gain = amount_of(&registry, "jar") - 1.0;
        assert_eq!(source_loss, dest_gain);
        assert_eq!(receipts.transfer.applied, 4.0);
    }

    #[test]
    fn test_transfer_limited_by_source() {
        let mut registry = registry_with(&[("tank", Cell::new(10.0, 1.0)), ("jar", Cell::empty(10.0))]);
        let receipts = transfer(
            &mut registry,
            ThingId::from_key("tank"),
            ThingId::from_key("jar"),
            "fuel",
            5.0,
        )
        .unwrap()
        .unwrap();
        assert_eq!(receipts.transfer.applied, 1.0);
        assert_eq!(amount_of(&registry, "tank"), 0.0);
    }

    #[test]
    fn test_zero_transfer_still_logged() {
        let mut registry = registry_with(&[("tank", Cell::full(10.0)), ("jar", Cell::full(10.0))]);
        let receipts = transfer(
            &mut registry,
            ThingId::from_key("tank"),
            ThingId::from_key("jar"),
            "fuel",
            3.0,
        )
        .unwrap()
        .unwrap();

        assert_eq!(receipts.transfer.applied, 0.0);
        assert_eq!(registry.receipts().len(), 3);
        assert!(matches!(registry.receipts()[2].receipt, Receipt::Transfer(_)));
    }

    #[test]
    fn test_transfer_requires_both_cells() {
        let mut registry = registry_with(&[("tank", Cell::full(10.0))]);
        let place = ThingId::from_key("place");
        registry.insert(Thing::item("cup", "cup").with_owner(place));
        let tank = ThingId::from_key("tank");
        let cup = ThingId::from_key("cup");

        assert!(transfer(&mut registry, tank, cup, "fuel", 1.0).unwrap().is_none());

        assert!(ensure_like(&mut registry, tank, cup, "fuel").unwrap());
        assert!(!ensure_like(&mut registry, tank, cup, "fuel").unwrap());
        let receipts = transfer(&mut registry, tank, cup, "fuel", 4.0).unwrap().unwrap();
        assert_eq!(receipts.to.amount, 4.0);
        assert_eq!(registry.get(cup).unwrap().cell("fuel").unwrap().capacity(), 10.0);
    }

    #[test]
    fn test_receipt_log_serializes() {
        let mut registry = registry_with(&[("can", Cell::full(2.0))]);
        consume(&mut registry, ThingId::from_key("can"), "fuel", 1.0).unwrap();

        let json = serde_json::to_value(registry.receipts()).unwrap();
        assert_eq!(json[0]["seq"], 0);
        assert_eq!(json[0]["receipt"]["Consume"]["applied"], 1.0);
    }
}
