//! Audit receipts for cell mutations.

use serde::{Deserialize, Serialize};

use crate::entities::ThingId;

/// Outcome of a single consume on one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeReceipt {
    pub thing: ThingId,
    pub cell: String,
    pub requested: f64,
    /// `old amount - new amount`; differs from `requested` at a boundary.
    pub applied: f64,
    /// Amount left in the cell afterwards.
    pub amount: f64,
}

impl ConsumeReceipt {
    pub fn changed(&self) -> bool {
        self.applied != 0.0
    }
}

/// Outcome of moving quantity between two things.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub source: ThingId,
    pub dest: ThingId,
    pub cell: String,
    pub requested: f64,
    pub applied: f64,
}

/// The three receipts one transfer produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipts {
    pub from: ConsumeReceipt,
    pub to: ConsumeReceipt,
    pub transfer: TransferReceipt,
}

/// Any entry in the registry's audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Receipt {
    Consume(ConsumeReceipt),
    Transfer(TransferReceipt),
    /// Free-form record for mutations that are not cell algebra.
    Note { kind: String, detail: String },
}

impl Receipt {
    pub fn note(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Receipt::Note {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    /// The things this receipt touched.
    pub fn things(&self) -> Vec<ThingId> {
        match self {
            Receipt::Consume(r) => vec![r.thing],
            Receipt::Transfer(r) => vec![r.source, r.dest],
            Receipt::Note { .. } => Vec::new(),
        }
    }
}

/// A receipt with its position in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedReceipt {
    pub seq: u64,
    pub receipt: Receipt,
}
