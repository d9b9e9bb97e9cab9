//! Error taxonomy for the rules crate.
//!
//! Everything here is an integrity violation: a defect in world data or in
//! engine logic. Domain rejections (a missing cell, an attack out of turn)
//! are values, not errors.

use thiserror::Error;

use crate::entities::ThingId;
use crate::mechanics::ResolveError;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("unknown thing {0}")]
    UnknownThing(ThingId),

    #[error("ownership chain of {start} revisits {repeated}")]
    OwnershipCycle { start: ThingId, repeated: ThingId },

    #[error("ownership chain of {start} ends at {last} without reaching a place")]
    UnrootedChain { start: ThingId, last: ThingId },

    #[error("{0} is not a place")]
    NotAPlace(ThingId),

    #[error("registry has no world-state record")]
    MissingWorldState,

    #[error("expression failed: {0}")]
    Expression(#[from] ResolveError),
}

pub type Result<T> = std::result::Result<T, KernelError>;
