//! # COP Persistence Library
//!
//! Access layer for the external spatial store that owns the tracked rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Motion Simulator                        │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ startup                 │ every tick
//!                 ▼                         ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │    IdentifierSource      │   │     GeometryRepository       │
//! │  (ids by category)       │   │  (one batched WKB update)    │
//! └──────────────────────────┘   └──────────────────────────────┘
//!                 │                         │
//!                 ▼                         ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     PostgisStore        │   │       InMemoryStore          │
//! │  (tdf_objects, 4326)    │   │   (tests, dry runs)          │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `postgis`: Enable the PostGIS backend (default)

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod geometry;
pub mod repository;

pub use error::{PersistenceError, Result};
pub use geometry::{decode_point, encode_point};
pub use repository::{GeometryBatch, GeometryRepository, IdentifierSource, InMemoryStore};
#[cfg(feature = "postgis")]
pub use repository::{PostgisConfig, PostgisStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
