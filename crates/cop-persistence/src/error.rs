//! Persistence layer error types

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("PostgreSQL error: {0}")]
    Postgres(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    #[error("Geometry encoding error: {0}")]
    Encoding(String),
}

#[cfg(feature = "postgis")]
impl From<tokio_postgres::Error> for PersistenceError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::Postgres(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
