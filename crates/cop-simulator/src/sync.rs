//! Geometry sync: one batched store write per tick.

use std::sync::Arc;

use cop_domain::{EntityId, GeoPoint};
use cop_persistence::{GeometryBatch, GeometryRepository};

use crate::error::SyncError;

/// Pushes entity positions to the external store.
pub struct GeometrySync<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for GeometrySync<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> GeometrySync<S>
where
    S: GeometryRepository + ?Sized,
{
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encode every position and write them in a single batch.
    ///
    /// An empty slice succeeds without touching the store. Otherwise the batch
    /// either lands as a whole or the call fails.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the store rejects or cannot receive the
    /// batch.
    pub async fn flush(&self, positions: &[(EntityId, GeoPoint)]) -> Result<u64, SyncError> {
        if positions.is_empty() {
            return Ok(0);
        }

        let mut batch = GeometryBatch::with_capacity(positions.len());
        for (id, point) in positions {
            batch.push(*id, point);
        }

        let rows = self
            .store
            .update_geometries(&batch)
            .await
            .map_err(|source| SyncError::Store {
                batch_len: batch.len(),
                source,
            })?;

        if rows < batch.len() as u64 {
            tracing::warn!(
                sent = batch.len(),
                matched = rows,
                "Some identifiers matched no row in the store"
            );
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cop_persistence::InMemoryStore;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_empty_flush_makes_no_call() {
        let store = Arc::new(InMemoryStore::new());
        let sync = GeometrySync::new(Arc::clone(&store));

        assert_eq!(assert_ok!(sync.flush(&[]).await), 0);
        assert_eq!(store.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_flush_is_one_batched_write() {
        let store = Arc::new(InMemoryStore::new());
        let ids = store.seed("vehicles", 3).unwrap();
        let sync = GeometrySync::new(Arc::clone(&store));

        let positions: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, GeoPoint::new(i as f64, -(i as f64))))
            .collect();

        assert_eq!(sync.flush(&positions).await.unwrap(), 3);
        assert_eq!(store.update_calls(), 1);
        assert_eq!(store.last_batch().unwrap().ids(), ids.as_slice());
        assert_eq!(store.geometry(&ids[2]), Some(GeoPoint::new(2.0, -2.0)));
    }

    #[tokio::test]
    async fn test_failed_flush_reports_whole_batch() {
        let store = Arc::new(InMemoryStore::new());
        let ids = store.seed("vehicles", 2).unwrap();
        store.fail_next(1).unwrap();
        let sync = GeometrySync::new(Arc::clone(&store));

        let positions = vec![(ids[0], GeoPoint::new(1.0, 1.0)), (ids[1], GeoPoint::new(2.0, 2.0))];
        let err = sync.flush(&positions).await.unwrap_err();

        assert!(matches!(err, SyncError::Store { batch_len: 2, .. }));
        assert!(store.rows().iter().all(|row| row.geometry.is_none()));
    }
}
