//! Fixed-cadence tick loop.
//!
//! Each tick steers every entity once and flushes the new positions in one
//! batch. The loop then sleeps for whatever is left of the tick interval, so
//! the cadence holds regardless of store latency. A tick that overruns the
//! interval is followed immediately by the next one; ticks are never skipped
//! and never overlap.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cop_persistence::GeometryRepository;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::registry::EntityRegistry;
use crate::steering::SteeringPolicy;
use crate::sync::GeometrySync;

/// Time to wait before the next tick.
///
/// Zero when the tick used up, or overran, the interval.
#[must_use]
pub const fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Loop timing and reporting settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// Stop on its own after this many ticks
    pub max_ticks: Option<u64>,
    /// Ticks between status log lines (0 disables them)
    pub status_interval: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            max_ticks: None,
            status_interval: 50,
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug)]
pub struct TickReport {
    pub tick: u64,
    pub retargeted: usize,
    pub flush: Result<u64, SyncError>,
    pub elapsed: Duration,
}

/// Totals for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub entities: usize,
    pub ticks: u64,
    pub rows_written: u64,
    pub flush_failures: u64,
    pub retargets: u64,
    pub overruns: u64,
}

/// Drives the registry and the geometry sync at a fixed cadence.
pub struct Scheduler<S: ?Sized> {
    registry: EntityRegistry,
    policy: SteeringPolicy,
    sync: GeometrySync<S>,
    config: SchedulerConfig,
    rng: StdRng,
    state: SchedulerState,
    report: SimulationReport,
}

impl<S> Scheduler<S>
where
    S: GeometryRepository + ?Sized,
{
    pub fn new(
        registry: EntityRegistry,
        policy: SteeringPolicy,
        sync: GeometrySync<S>,
        config: SchedulerConfig,
    ) -> Self {
        Self::with_rng(registry, policy, sync, config, StdRng::from_entropy())
    }

    /// Build a scheduler whose retargeting draws come from `rng`.
    pub fn with_rng(
        registry: EntityRegistry,
        policy: SteeringPolicy,
        sync: GeometrySync<S>,
        config: SchedulerConfig,
        rng: StdRng,
    ) -> Self {
        let report = SimulationReport {
            started_at: Utc::now(),
            stopped_at: None,
            entities: registry.len(),
            ticks: 0,
            rows_written: 0,
            flush_failures: 0,
            retargets: 0,
            overruns: 0,
        };

        Self {
            registry,
            policy,
            sync,
            config,
            rng,
            state: SchedulerState::Stopped,
            report,
        }
    }

    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub const fn report(&self) -> &SimulationReport {
        &self.report
    }

    /// Steer every entity once, then flush. A failed flush is recorded and
    /// logged; the in-memory state is kept for the next tick.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.report.ticks += 1;
        let tick = self.report.ticks;

        let summary = self.registry.advance_all(&self.policy, &mut self.rng);
        self.report.retargets += summary.retargeted as u64;

        let positions = self.registry.positions();
        let flush = self.sync.flush(&positions).await;

        match &flush {
            Ok(rows) => {
                self.report.rows_written += rows;
            }
            Err(e) => {
                self.report.flush_failures += 1;
                warn!(tick, error = %e, "Geometry flush failed, dropping this tick's positions");
            }
        }

        let elapsed = started.elapsed();
        debug!(
            tick,
            retargeted = summary.retargeted,
            elapsed = ?elapsed,
            "Tick complete"
        );

        TickReport {
            tick,
            retargeted: summary.retargeted,
            flush,
            elapsed,
        }
    }

    /// Run until `shutdown` resolves or `max_ticks` is reached.
    ///
    /// Shutdown is only observed between ticks, never during a flush.
    pub async fn run<F>(&mut self, shutdown: F) -> SimulationReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = SchedulerState::Running;
        info!(
            entities = self.registry.len(),
            tick_interval = ?self.config.tick_interval,
            max_ticks = ?self.config.max_ticks,
            "Simulation loop started"
        );

        loop {
            let report = self.tick().await;

            if report.elapsed > self.config.tick_interval {
                self.report.overruns += 1;
                debug!(
                    tick = report.tick,
                    elapsed = ?report.elapsed,
                    "Tick overran interval"
                );
            }

            if self.config.status_interval > 0 && report.tick % self.config.status_interval == 0 {
                info!(
                    tick = report.tick,
                    rows_written = self.report.rows_written,
                    flush_failures = self.report.flush_failures,
                    retargets = self.report.retargets,
                    overruns = self.report.overruns,
                    "Simulation status"
                );
            }

            if self.config.max_ticks.is_some_and(|max| report.tick >= max) {
                info!(ticks = report.tick, "Tick limit reached");
                break;
            }

            let wait = next_sleep(self.config.tick_interval, report.elapsed);
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(ticks = report.tick, "Stop signal received");
                    break;
                }
                () = sleep(wait) => {}
            }
        }

        self.state = SchedulerState::Stopped;
        self.report.stopped_at = Some(Utc::now());
        info!(
            ticks = self.report.ticks,
            rows_written = self.report.rows_written,
            flush_failures = self.report.flush_failures,
            "Simulation loop stopped"
        );

        self.report.clone()
    }
}
