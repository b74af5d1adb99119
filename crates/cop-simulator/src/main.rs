//! COP Motion Simulator CLI
//!
//! Reads tracked identifiers from the store, then moves every entity and
//! writes its position back on a fixed cadence until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cop_persistence::{GeometryRepository, IdentifierSource, InMemoryStore, PostgisStore};
use cop_simulator::{
    EntityRegistry, GeometrySync, LogFormat, Scheduler, SchedulerConfig, SimulatorConfig,
    fetch_identifiers,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::oneshot;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cop-simulator")]
#[command(about = "Stream simulated entity motion into a PostGIS table")]
struct Args {
    /// Number of entities to track (overrides SIM_ENTITY_COUNT)
    #[arg(short, long)]
    entities: Option<usize>,

    /// Tick interval in milliseconds (overrides SIM_TICK_INTERVAL_MS)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Use an in-memory store seeded with generated rows instead of PostGIS
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulatorConfig) -> Result<()> {
        if let Some(entities) = self.entities {
            config.entity_count = entities;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval = std::time::Duration::from_millis(tick_ms);
        }
        if self.ticks.is_some() {
            config.max_ticks = self.ticks;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.json_logs {
            config.log_format = LogFormat::Json;
        }
        config.validate().context("Invalid command line options")?;
        Ok(())
    }
}

fn init_tracing(config: &SimulatorConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cop_simulator={level},cop_persistence={level}",
            level = config.log_level
        ))
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = SimulatorConfig::from_env().context("Invalid configuration")?;
    args.apply(&mut config)?;

    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        entities = config.entity_count,
        category = %config.category,
        tick_interval = ?config.tick_interval,
        dry_run = args.dry_run,
        "Starting COP motion simulator"
    );

    let result = if args.dry_run {
        let store = InMemoryStore::new();
        store
            .seed(&config.category, config.entity_count)
            .context("Failed to seed in-memory store")?;
        run(Arc::new(store), &config).await
    } else {
        info!(
            host = %config.postgis.host,
            port = config.postgis.port,
            table = %config.postgis.table,
            "Using PostGIS store"
        );
        let store = PostgisStore::new(config.postgis.clone()).context("Invalid PostGIS settings")?;
        run(Arc::new(store), &config).await
    };

    if let Err(ref e) = result {
        error!(error = %e, "Simulator failed to start");
    }
    result
}

/// Load identifiers, build the registry and drive the loop until stopped.
async fn run<S>(store: Arc<S>, config: &SimulatorConfig) -> Result<()>
where
    S: IdentifierSource + GeometryRepository + 'static,
{
    let mut rng = config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

    let ids = fetch_identifiers(store.as_ref(), &config.category, config.entity_count)
        .await
        .context("Initial association failed, cannot start update loop")?;

    let registry = EntityRegistry::initialize(&ids, &config.spawn_config(), &mut rng)?;

    let mut scheduler = Scheduler::with_rng(
        registry,
        config.steering_policy(),
        GeometrySync::new(store),
        SchedulerConfig {
            tick_interval: config.tick_interval,
            max_ticks: config.max_ticks,
            status_interval: config.status_interval,
        },
        rng,
    );

    let stop = shutdown_signal();
    let report = scheduler
        .run(async move {
            let _ = stop.await;
        })
        .await;

    let summary = serde_json::to_string(&report).context("Failed to serialize run report")?;
    info!(report = %summary, "Simulation terminated");
    Ok(())
}

/// Install Ctrl+C / SIGTERM handlers right away and resolve the receiver
/// when either fires.
fn shutdown_signal() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("Received Ctrl+C, shutting down"),
            () = terminate => info!("Received SIGTERM, shutting down"),
        }

        let _ = tx.send(());
    });

    rx
}
