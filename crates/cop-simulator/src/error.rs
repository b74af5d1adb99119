//! Simulator error types

use cop_domain::DomainError;
use cop_persistence::PersistenceError;
use thiserror::Error;

/// Configuration errors, raised before anything connects.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid operating region: {0}")]
    Region(#[from] DomainError),
}

/// Failures that prevent the tick loop from starting.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("No entity identifiers to track")]
    EmptyInput,

    #[error("Store returned {found} identifiers, {requested} required")]
    InsufficientIdentifiers { requested: usize, found: usize },

    #[error("Identifier source unavailable: {0}")]
    IdentifierSource(#[source] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A failed geometry flush. The tick's positions are dropped and the loop
/// carries on.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Geometry store rejected batch of {batch_len}: {source}")]
    Store {
        batch_len: usize,
        #[source]
        source: PersistenceError,
    },
}

pub type Result<T> = std::result::Result<T, SimulationError>;
