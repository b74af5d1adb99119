//! # Repository Traits
//!
//! Abstract interfaces over the external spatial store.
//! Implementations can be swapped for different backends (PostGIS, in-memory).

use async_trait::async_trait;
use cop_domain::{EntityId, GeoPoint};

use crate::error::{PersistenceError, Result};
use crate::geometry::encode_point;

// =============================================================================
// GEOMETRY BATCH
// =============================================================================

/// One tick's worth of geometry updates as parallel arrays.
///
/// `ids[i]` is written with `wkb[i]`. The two vectors always have the same
/// length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryBatch {
    ids: Vec<EntityId>,
    wkb: Vec<Vec<u8>>,
}

impl GeometryBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            wkb: Vec::with_capacity(capacity),
        }
    }

    /// Encode and append one position.
    pub fn push(&mut self, id: EntityId, point: &GeoPoint) {
        self.ids.push(id);
        self.wkb.push(encode_point(point));
    }

    /// Build a batch from already encoded geometries.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidQuery`] if the arrays differ in length.
    pub fn from_parts(ids: Vec<EntityId>, wkb: Vec<Vec<u8>>) -> Result<Self> {
        if ids.len() != wkb.len() {
            return Err(PersistenceError::InvalidQuery(format!(
                "{} ids for {} geometries",
                ids.len(),
                wkb.len()
            )));
        }
        Ok(Self { ids, wkb })
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn wkb(&self) -> &[Vec<u8>] {
        &self.wkb
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &[u8])> {
        self.ids.iter().zip(self.wkb.iter().map(Vec::as_slice))
    }
}

// =============================================================================
// IDENTIFIER SOURCE
// =============================================================================

/// Supplies identifiers of rows that already exist in the store.
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// Fetch up to `limit` identifiers whose category equals `category`.
    ///
    /// Returns fewer than `limit` when the store holds fewer matching rows.
    async fn fetch_entity_ids(&self, category: &str, limit: usize) -> Result<Vec<EntityId>>;
}

// =============================================================================
// GEOMETRY REPOSITORY
// =============================================================================

/// Accepts batched point geometry writes keyed by identifier.
#[async_trait]
pub trait GeometryRepository: Send + Sync {
    /// Write every geometry in the batch as a single unit.
    ///
    /// Returns the number of rows matched. Either the whole batch is applied
    /// or an error is returned and nothing is.
    async fn update_geometries(&self, batch: &GeometryBatch) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::decode_point;
    use uuid::Uuid;

    #[test]
    fn test_batch_keeps_arrays_parallel() {
        let mut batch = GeometryBatch::with_capacity(2);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        batch.push(a, &GeoPoint::new(10.0, 20.0));
        batch.push(b, &GeoPoint::new(-5.0, 3.5));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ids(), &[a, b]);

        let decoded: Vec<_> = batch
            .iter()
            .map(|(id, wkb)| (*id, decode_point(wkb).unwrap()))
            .collect();
        assert_eq!(decoded[1], (b, GeoPoint::new(-5.0, 3.5)));
    }

    #[test]
    fn test_from_parts_rejects_mismatch() {
        let err = GeometryBatch::from_parts(vec![Uuid::nil()], vec![]).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidQuery(_)));
    }
}
