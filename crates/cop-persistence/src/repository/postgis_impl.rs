//! PostGIS repository implementation.

use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};

use super::traits::{GeometryBatch, GeometryRepository, IdentifierSource};
use crate::error::{PersistenceError, Result};
use cop_domain::EntityId;

// =============================================================================
// POSTGIS CONFIGURATION
// =============================================================================

/// PostGIS connection and write-target configuration.
#[derive(Debug, Clone)]
pub struct PostgisConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    /// Table holding the tracked rows
    pub table: String,
    /// Primary key column, matched against entity identifiers
    pub id_column: String,
    /// Column filtered by the caller-supplied category
    pub category_column: String,
    /// Geometry column receiving the points
    pub geometry_column: String,
    /// Spatial reference assigned to written points
    pub srid: i32,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for PostgisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 15432,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            table: "tdf_objects".to_string(),
            id_column: "id".to_string(),
            category_column: "src_type".to_string(),
            geometry_column: "geo".to_string(),
            srid: 4326,
            connect_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Accept only plain SQL identifiers, since table and column names are
/// interpolated into statements.
fn check_identifier(kind: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 63 {
        Ok(())
    } else {
        Err(PersistenceError::InvalidQuery(format!(
            "{kind} '{name}' is not a plain SQL identifier"
        )))
    }
}

// =============================================================================
// POSTGIS STORE
// =============================================================================

/// Store backed by a PostGIS table.
///
/// A connection is opened for each call and dropped before the call returns,
/// on success and failure alike. Nothing is held open between ticks.
pub struct PostgisStore {
    config: PostgisConfig,
    select_ids_sql: String,
    update_geometries_sql: String,
}

impl PostgisStore {
    /// Create a store and prepare its statements. Does not connect.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidQuery`] if a configured table or
    /// column name is not a plain identifier.
    pub fn new(config: PostgisConfig) -> Result<Self> {
        check_identifier("table", &config.table)?;
        check_identifier("id column", &config.id_column)?;
        check_identifier("category column", &config.category_column)?;
        check_identifier("geometry column", &config.geometry_column)?;

        let select_ids_sql = format!(
            "SELECT {id} FROM {table} WHERE {category} = $1 LIMIT $2",
            id = config.id_column,
            table = config.table,
            category = config.category_column,
        );

        let update_geometries_sql = format!(
            r#"
            UPDATE {table} AS t
            SET {geo} = ST_SetSRID(ST_GeomFromWKB(src.wkb), {srid})
            FROM (
                SELECT unnest($1::bytea[]) AS wkb, unnest($2::uuid[]) AS entity_id
            ) AS src
            WHERE t.{id} = src.entity_id
            "#,
            table = config.table,
            geo = config.geometry_column,
            srid = config.srid,
            id = config.id_column,
        );

        Ok(Self {
            config,
            select_ids_sql,
            update_geometries_sql,
        })
    }

    pub const fn config(&self) -> &PostgisConfig {
        &self.config
    }

    /// Open a connection and drive it on a background task.
    ///
    /// The task ends as soon as the returned client is dropped.
    async fn connect(&self) -> Result<Client> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.dbname)
            .user(&self.config.user)
            .connect_timeout(self.config.connect_timeout);
        if let Some(ref password) = self.config.password {
            pg.password(password);
        }

        let (client, connection) = tokio::time::timeout(self.config.connect_timeout, pg.connect(NoTls))
            .await
            .map_err(|_| PersistenceError::Timeout {
                timeout_ms: duration_ms(self.config.connect_timeout),
            })?
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostGIS connection closed with error");
            }
        });

        Ok(client)
    }

    async fn bounded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.query_timeout, fut)
            .await
            .map_err(|_| PersistenceError::Timeout {
                timeout_ms: duration_ms(self.config.query_timeout),
            })?
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl IdentifierSource for PostgisStore {
    async fn fetch_entity_ids(&self, category: &str, limit: usize) -> Result<Vec<EntityId>> {
        let limit = i64::try_from(limit)
            .map_err(|_| PersistenceError::InvalidQuery(format!("limit {limit} too large")))?;

        self.bounded(async {
            let client = self.connect().await?;
            let rows = client
                .query(self.select_ids_sql.as_str(), &[&category, &limit])
                .await?;

            let ids = rows
                .iter()
                .map(|row| row.try_get::<_, EntityId>(0))
                .collect::<std::result::Result<Vec<_>, _>>()?;

            tracing::debug!(category, found = ids.len(), "Fetched entity identifiers");
            Ok::<_, PersistenceError>(ids)
        })
        .await
    }
}

#[async_trait]
impl GeometryRepository for PostgisStore {
    async fn update_geometries(&self, batch: &GeometryBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        self.bounded(async {
            let mut client = self.connect().await?;
            let wkb: &[Vec<u8>] = batch.wkb();
            let ids: &[EntityId] = batch.ids();

            // Dropping an uncommitted transaction rolls it back.
            let tx = client.transaction().await?;
            let rows = tx
                .execute(self.update_geometries_sql.as_str(), &[&wkb, &ids])
                .await?;
            tx.commit().await?;

            Ok::<_, PersistenceError>(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_use_configured_target() {
        let store = PostgisStore::new(PostgisConfig::default()).unwrap();
        assert_eq!(
            store.select_ids_sql,
            "SELECT id FROM tdf_objects WHERE src_type = $1 LIMIT $2"
        );
        assert!(store.update_geometries_sql.contains("UPDATE tdf_objects AS t"));
        assert!(store.update_geometries_sql.contains("SET geo = ST_SetSRID(ST_GeomFromWKB(src.wkb), 4326)"));
        assert!(store.update_geometries_sql.contains("WHERE t.id = src.entity_id"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let config = PostgisConfig {
            table: "tdf_objects; DROP TABLE x".to_string(),
            ..PostgisConfig::default()
        };
        assert!(matches!(
            PostgisStore::new(config),
            Err(PersistenceError::InvalidQuery(_))
        ));

        assert!(check_identifier("column", "geo_2").is_ok());
        assert!(check_identifier("column", "2geo").is_err());
        assert!(check_identifier("column", "").is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_connection() {
        // Nothing listens on port 1; an attempted connect would fail.
        let store = PostgisStore::new(PostgisConfig {
            port: 1,
            ..PostgisConfig::default()
        })
        .unwrap();
        assert_eq!(store.update_geometries(&GeometryBatch::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_error() {
        let store = PostgisStore::new(PostgisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout: Duration::from_millis(500),
            ..PostgisConfig::default()
        })
        .unwrap();
        let err = store.fetch_entity_ids("vehicles", 5).await.unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::Unavailable(_) | PersistenceError::Timeout { .. }
        ));
    }
}
