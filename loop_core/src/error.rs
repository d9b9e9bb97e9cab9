//! Error types for the loop crate.

use thiserror::Error;
use world_rules::KernelError;

/// A world could not be constructed from its authoring source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("world construction failed: {0}")]
pub struct WorldBuildError(pub String);

impl WorldBuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Build(#[from] WorldBuildError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LoopError>;
