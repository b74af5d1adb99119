//! In-memory store used by tests and dry runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::traits::{GeometryBatch, GeometryRepository, IdentifierSource};
use crate::error::{PersistenceError, Result};
use crate::geometry::decode_point;
use cop_domain::{EntityId, GeoPoint};

/// A row held by [`InMemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: EntityId,
    pub category: String,
    pub geometry: Option<GeoPoint>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredRow>,
    index: HashMap<EntityId, usize>,
    pending_failures: u32,
    unavailable: bool,
    update_calls: u64,
    last_batch: Option<GeometryBatch>,
}

/// Mutex-guarded table with the same matching rules as the PostGIS store.
///
/// Failures and latency can be injected to exercise the simulator's error
/// paths without a database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the table.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PersistenceError::Unavailable("in-memory store lock poisoned".into()))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Insert a row with no geometry. Existing ids are left untouched.
    pub fn insert(&self, id: EntityId, category: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.index.contains_key(&id) {
            return Ok(());
        }
        let position = inner.rows.len();
        inner.rows.push(StoredRow {
            id,
            category: category.to_string(),
            geometry: None,
        });
        inner.index.insert(id, position);
        Ok(())
    }

    /// Insert `count` fresh rows of `category` and return their ids.
    pub fn seed(&self, category: &str, count: usize) -> Result<Vec<EntityId>> {
        let ids: Vec<EntityId> = (0..count).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            self.insert(*id, category)?;
        }
        Ok(ids)
    }

    /// Make the next `n` calls fail as if the store were unreachable.
    pub fn fail_next(&self, n: u32) -> Result<()> {
        self.lock()?.pending_failures = n;
        Ok(())
    }

    /// Toggle a persistent outage.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<()> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    pub fn geometry(&self, id: &EntityId) -> Option<GeoPoint> {
        let inner = self.lock().ok()?;
        inner
            .index
            .get(id)
            .and_then(|&i| inner.rows[i].geometry)
    }

    /// Number of update calls received, failed ones included.
    pub fn update_calls(&self) -> u64 {
        self.lock().map(|inner| inner.update_calls).unwrap_or_default()
    }

    /// Most recent batch that was applied.
    pub fn last_batch(&self) -> Option<GeometryBatch> {
        self.lock().ok().and_then(|inner| inner.last_batch.clone())
    }

    pub fn rows(&self) -> Vec<StoredRow> {
        self.lock().map(|inner| inner.rows.clone()).unwrap_or_default()
    }
}

impl Inner {
    fn check_available(&mut self) -> Result<()> {
        if self.unavailable {
            return Err(PersistenceError::Unavailable("store offline".into()));
        }
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(PersistenceError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentifierSource for InMemoryStore {
    async fn fetch_entity_ids(&self, category: &str, limit: usize) -> Result<Vec<EntityId>> {
        self.simulate_latency().await;

        let mut inner = self.lock()?;
        inner.check_available()?;

        Ok(inner
            .rows
            .iter()
            .filter(|row| row.category == category)
            .take(limit)
            .map(|row| row.id)
            .collect())
    }
}

#[async_trait]
impl GeometryRepository for InMemoryStore {
    async fn update_geometries(&self, batch: &GeometryBatch) -> Result<u64> {
        self.simulate_latency().await;

        let mut inner = self.lock()?;
        inner.update_calls += 1;
        inner.check_available()?;

        // Decode everything first so a bad geometry leaves the table untouched.
        let decoded = batch
            .iter()
            .map(|(id, wkb)| decode_point(wkb).map(|point| (*id, point)))
            .collect::<Result<Vec<_>>>()?;

        let mut matched = 0;
        for (id, point) in decoded {
            if let Some(&i) = inner.index.get(&id) {
                inner.rows[i].geometry = Some(point);
                matched += 1;
            }
        }
        inner.last_batch = Some(batch.clone());

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_fetch_filters_by_category_and_limit() {
        let store = InMemoryStore::new();
        let vehicles = store.seed("vehicles", 3).unwrap();
        store.seed("vessels", 2).unwrap();

        let ids = store.fetch_entity_ids("vehicles", 2).await.unwrap();
        assert_eq!(ids, vehicles[..2]);

        let ids = store.fetch_entity_ids("vehicles", 10).await.unwrap();
        assert_eq!(ids.len(), 3);

        assert!(store.fetch_entity_ids("aircraft", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_matches_known_rows_only() {
        let store = InMemoryStore::new();
        let ids = store.seed("vehicles", 2).unwrap();

        let mut batch = GeometryBatch::default();
        batch.push(ids[0], &GeoPoint::new(12.5, -40.0));
        batch.push(Uuid::new_v4(), &GeoPoint::new(0.0, 0.0));

        assert_eq!(store.update_geometries(&batch).await.unwrap(), 1);
        assert_eq!(store.geometry(&ids[0]), Some(GeoPoint::new(12.5, -40.0)));
        assert_eq!(store.geometry(&ids[1]), None);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = InMemoryStore::new();
        let ids = store.seed("vehicles", 1).unwrap();
        store.fail_next(1).unwrap();

        let mut batch = GeometryBatch::default();
        batch.push(ids[0], &GeoPoint::new(1.0, 1.0));

        assert_err!(store.update_geometries(&batch).await);
        assert_eq!(store.geometry(&ids[0]), None);
        assert_ok!(store.update_geometries(&batch).await);
        assert_eq!(store.update_calls(), 2);
    }

    #[tokio::test]
    async fn test_bad_geometry_rejects_whole_batch() {
        let store = InMemoryStore::new();
        let ids = store.seed("vehicles", 2).unwrap();

        let batch = GeometryBatch::from_parts(
            ids.clone(),
            vec![crate::geometry::encode_point(&GeoPoint::new(1.0, 1.0)), vec![0u8; 3]],
        )
        .unwrap();

        assert!(matches!(
            store.update_geometries(&batch).await,
            Err(PersistenceError::Encoding(_))
        ));
        assert!(store.rows().iter().all(|row| row.geometry.is_none()));
    }

    #[tokio::test]
    async fn test_outage_blocks_reads() {
        let store = InMemoryStore::new();
        store.seed("vehicles", 1).unwrap();
        store.set_unavailable(true).unwrap();
        assert_err!(store.fetch_entity_ids("vehicles", 1).await);
        store.set_unavailable(false).unwrap();
        assert_ok!(store.fetch_entity_ids("vehicles", 1).await);
    }
}
