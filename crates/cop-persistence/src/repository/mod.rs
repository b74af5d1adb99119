//! # Repository Module
//!
//! Store abstractions and their implementations.

pub mod memory_impl;
#[cfg(feature = "postgis")]
pub mod postgis_impl;
pub mod traits;

pub use memory_impl::{InMemoryStore, StoredRow};
#[cfg(feature = "postgis")]
pub use postgis_impl::{PostgisConfig, PostgisStore};
pub use traits::{GeometryBatch, GeometryRepository, IdentifierSource};
