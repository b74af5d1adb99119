//! # Simulator Configuration
//!
//! Environment-based configuration for the motion simulator. Every knob has a
//! default; a variable that is set but cannot be parsed is an error rather
//! than silently falling back.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use cop_domain::BoundingBox;
use cop_persistence::PostgisConfig;

use crate::error::ConfigError;
use crate::registry::SpawnConfig;
use crate::steering::{DEFAULT_ARRIVAL_THRESHOLD_KM, DEFAULT_MAX_TURN_RATE_DEG, SteeringPolicy};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Full simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Number of identifiers to request and track
    pub entity_count: usize,

    /// Category filter applied when fetching identifiers
    pub category: String,

    /// Target wall-clock cadence of the tick loop
    pub tick_interval: Duration,

    /// Ticks between status log lines (0 disables them)
    pub status_interval: u64,

    /// Stop after this many ticks
    pub max_ticks: Option<u64>,

    /// Seed for a reproducible run
    pub seed: Option<u64>,

    pub region: BoundingBox,
    pub arrival_threshold_km: f64,
    pub max_turn_rate_deg: f64,
    pub speed_min_km: f64,
    pub speed_max_km: f64,

    /// PostGIS connection and write target
    pub postgis: PostgisConfig,

    /// Logging level used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            entity_count: 50,
            category: "vehicles".to_string(),
            tick_interval: Duration::from_millis(200),
            status_interval: 50,
            max_ticks: None,
            seed: None,
            region: BoundingBox::default(),
            arrival_threshold_km: DEFAULT_ARRIVAL_THRESHOLD_KM,
            max_turn_rate_deg: DEFAULT_MAX_TURN_RATE_DEG,
            speed_min_km: 40.0,
            speed_max_km: 100.0,
            postgis: PostgisConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// Read `key` through `lookup`, parsing it when present.
fn parse_var<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn invalid(key: &'static str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl SimulatorConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is malformed or the resulting
    /// configuration is inconsistent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// See [`SimulatorConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let region_defaults = defaults.region;
        let pg_defaults = defaults.postgis;

        let min_lat = parse_var(&lookup, "SIM_LAT_MIN", region_defaults.min_lat)?;
        let max_lat = parse_var(&lookup, "SIM_LAT_MAX", region_defaults.max_lat)?;
        let min_lon = parse_var(&lookup, "SIM_LON_MIN", region_defaults.min_lon)?;
        let max_lon = parse_var(&lookup, "SIM_LON_MAX", region_defaults.max_lon)?;
        let region = BoundingBox::new(min_lat, max_lat, min_lon, max_lon)?;

        let tick_ms: u64 = parse_var(
            &lookup,
            "SIM_TICK_INTERVAL_MS",
            u64::try_from(defaults.tick_interval.as_millis()).unwrap_or(200),
        )?;
        let connect_timeout_ms: u64 = parse_var(
            &lookup,
            "DB_CONNECT_TIMEOUT_MS",
            u64::try_from(pg_defaults.connect_timeout.as_millis()).unwrap_or(5_000),
        )?;
        let query_timeout_ms: u64 = parse_var(
            &lookup,
            "DB_QUERY_TIMEOUT_MS",
            u64::try_from(pg_defaults.query_timeout.as_millis()).unwrap_or(10_000),
        )?;

        let config = Self {
            entity_count: parse_var(&lookup, "SIM_ENTITY_COUNT", defaults.entity_count)?,
            category: lookup("SIM_CATEGORY").unwrap_or(defaults.category),
            tick_interval: Duration::from_millis(tick_ms),
            status_interval: parse_var(&lookup, "SIM_STATUS_INTERVAL", defaults.status_interval)?,
            max_ticks: lookup("SIM_MAX_TICKS")
                .map(|raw| {
                    raw.trim()
                        .parse()
                        .map_err(|_| invalid("SIM_MAX_TICKS", &raw, "expected a tick count"))
                })
                .transpose()?,
            seed: lookup("SIM_SEED")
                .map(|raw| {
                    raw.trim()
                        .parse()
                        .map_err(|_| invalid("SIM_SEED", &raw, "expected an unsigned integer"))
                })
                .transpose()?,
            region,
            arrival_threshold_km: parse_var(
                &lookup,
                "SIM_ARRIVAL_THRESHOLD_KM",
                defaults.arrival_threshold_km,
            )?,
            max_turn_rate_deg: parse_var(&lookup, "SIM_MAX_TURN_RATE_DEG", defaults.max_turn_rate_deg)?,
            speed_min_km: parse_var(&lookup, "SIM_SPEED_MIN_KM", defaults.speed_min_km)?,
            speed_max_km: parse_var(&lookup, "SIM_SPEED_MAX_KM", defaults.speed_max_km)?,

            postgis: PostgisConfig {
                host: lookup("DB_HOST").unwrap_or(pg_defaults.host),
                port: parse_var(&lookup, "DB_PORT", pg_defaults.port)?,
                dbname: lookup("DB_NAME").unwrap_or(pg_defaults.dbname),
                user: lookup("DB_USER").unwrap_or(pg_defaults.user),
                password: lookup("DB_PASSWORD").or(pg_defaults.password),
                table: lookup("DB_TABLE").unwrap_or(pg_defaults.table),
                id_column: pg_defaults.id_column,
                category_column: pg_defaults.category_column,
                geometry_column: lookup("DB_GEOMETRY_COLUMN").unwrap_or(pg_defaults.geometry_column),
                srid: parse_var(&lookup, "DB_SRID", pg_defaults.srid)?,
                connect_timeout: Duration::from_millis(connect_timeout_ms),
                query_timeout: Duration::from_millis(query_timeout_ms),
            },

            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_var(&lookup, "LOG_FORMAT", defaults.log_format)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_count == 0 {
            return Err(invalid("SIM_ENTITY_COUNT", self.entity_count, "must be at least 1"));
        }
        if self.category.trim().is_empty() {
            return Err(invalid("SIM_CATEGORY", &self.category, "must not be empty"));
        }
        if self.tick_interval.is_zero() {
            return Err(invalid("SIM_TICK_INTERVAL_MS", 0, "must be positive"));
        }
        if !(self.arrival_threshold_km.is_finite() && self.arrival_threshold_km > 0.0) {
            return Err(invalid(
                "SIM_ARRIVAL_THRESHOLD_KM",
                self.arrival_threshold_km,
                "must be a positive distance",
            ));
        }
        if !(self.max_turn_rate_deg > 0.0 && self.max_turn_rate_deg <= 180.0) {
            return Err(invalid(
                "SIM_MAX_TURN_RATE_DEG",
                self.max_turn_rate_deg,
                "must be in (0, 180]",
            ));
        }
        if !(self.speed_min_km.is_finite() && self.speed_min_km > 0.0) {
            return Err(invalid("SIM_SPEED_MIN_KM", self.speed_min_km, "must be positive"));
        }
        if !(self.speed_max_km.is_finite() && self.speed_max_km >= self.speed_min_km) {
            return Err(invalid(
                "SIM_SPEED_MAX_KM",
                self.speed_max_km,
                "must be at least SIM_SPEED_MIN_KM",
            ));
        }
        if self.max_ticks == Some(0) {
            return Err(invalid("SIM_MAX_TICKS", 0, "must be at least 1"));
        }
        if self.postgis.srid <= 0 {
            return Err(invalid("DB_SRID", self.postgis.srid, "must be positive"));
        }
        Ok(())
    }

    pub const fn steering_policy(&self) -> SteeringPolicy {
        SteeringPolicy::new(self.max_turn_rate_deg, self.arrival_threshold_km, self.region)
    }

    pub const fn spawn_config(&self) -> SpawnConfig {
        SpawnConfig {
            region: self.region,
            speed_min_km: self.speed_min_km,
            speed_max_km: self.speed_max_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = SimulatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.entity_count, 50);
        assert_eq!(config.category, "vehicles");
        assert_eq!(config.tick_interval, Duration::from_millis(200));
        assert_eq!(config.region, BoundingBox::default());
        assert_eq!(config.postgis.table, "tdf_objects");
        assert_eq!(config.postgis.srid, 4326);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = SimulatorConfig::from_lookup(lookup(&[
            ("SIM_ENTITY_COUNT", "5"),
            ("SIM_TICK_INTERVAL_MS", "1000"),
            ("SIM_LAT_MIN", "25"),
            ("SIM_LAT_MAX", "45"),
            ("SIM_LON_MIN", "-85"),
            ("SIM_LON_MAX", "-65"),
            ("SIM_SEED", "99"),
            ("DB_PORT", "5432"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.entity_count, 5);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert!((config.region.min_lon + 85.0).abs() < f64::EPSILON);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.postgis.port, 5432);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_malformed_value_names_key() {
        let err = SimulatorConfig::from_lookup(lookup(&[("SIM_ENTITY_COUNT", "lots")])).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "SIM_ENTITY_COUNT");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inconsistent_values_rejected() {
        let err = SimulatorConfig::from_lookup(lookup(&[
            ("SIM_SPEED_MIN_KM", "90"),
            ("SIM_SPEED_MAX_KM", "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SIM_SPEED_MAX_KM", .. }));

        let err = SimulatorConfig::from_lookup(lookup(&[("SIM_LAT_MIN", "60"), ("SIM_LAT_MAX", "10")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Region(_)));

        let err = SimulatorConfig::from_lookup(lookup(&[("SIM_TICK_INTERVAL_MS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SIM_TICK_INTERVAL_MS", .. }));

        let err = SimulatorConfig::from_lookup(lookup(&[("SIM_MAX_TURN_RATE_DEG", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SIM_MAX_TURN_RATE_DEG", .. }));
    }
}
