//! # COP Motion Simulator
//!
//! Moves a fleet of simulated entities along great-circle tracks toward
//! randomly chosen destinations and streams their positions to a PostGIS
//! table as one batched update per tick.
//!
//! ## Flow
//!
//! ```text
//! Scheduler ──► EntityRegistry::advance_all ──► SteeringPolicy (navigation)
//!     │
//!     └────────► GeometrySync::flush ──► GeometryRepository (one batch)
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod navigation;
pub mod registry;
pub mod scheduler;
pub mod steering;
pub mod sync;

pub use config::{LogFormat, SimulatorConfig};
pub use error::{ConfigError, SimulationError, SyncError};
pub use registry::{EntityRegistry, SpawnConfig, fetch_identifiers};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, SimulationReport};
pub use steering::{SteeringOutcome, SteeringPolicy};
pub use sync::GeometrySync;
