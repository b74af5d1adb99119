//! Entity registry: the owned set of simulated entities.

use std::collections::HashSet;

use cop_domain::{BoundingBox, EntityId, GeoPoint, SimulatedEntity};
use cop_persistence::IdentifierSource;
use rand::Rng;
use tracing::{info, warn};

use crate::error::{Result, SimulationError};
use crate::steering::{SteeringOutcome, SteeringPolicy};

/// How new entities are placed and how fast they move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnConfig {
    pub region: BoundingBox,
    pub speed_min_km: f64,
    pub speed_max_km: f64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            region: BoundingBox::default(),
            speed_min_km: 40.0,
            speed_max_km: 100.0,
        }
    }
}

/// Result of stepping every entity once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceSummary {
    pub advanced: usize,
    pub retargeted: usize,
}

/// Read the identifiers to track from the store.
///
/// Startup aborts if the store cannot be read, returns nothing, or returns
/// fewer identifiers than requested.
///
/// # Errors
///
/// [`SimulationError::IdentifierSource`], [`SimulationError::EmptyInput`] or
/// [`SimulationError::InsufficientIdentifiers`].
pub async fn fetch_identifiers<S>(source: &S, category: &str, count: usize) -> Result<Vec<EntityId>>
where
    S: IdentifierSource + ?Sized,
{
    let ids = source
        .fetch_entity_ids(category, count)
        .await
        .map_err(SimulationError::IdentifierSource)?;

    info!(category, requested = count, found = ids.len(), "Fetched identifiers for tracking");

    if ids.is_empty() {
        return Err(SimulationError::EmptyInput);
    }
    if ids.len() < count {
        warn!(
            category,
            requested = count,
            found = ids.len(),
            "Not enough rows in the store; seed at least {count} '{category}' rows"
        );
        return Err(SimulationError::InsufficientIdentifiers {
            requested: count,
            found: ids.len(),
        });
    }

    Ok(ids)
}

/// Owns every simulated entity, in the order they were registered.
///
/// The registry is the only writer of entity state.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    entities: Vec<SimulatedEntity>,
}

impl EntityRegistry {
    /// Create one entity per identifier with a random start, target, heading
    /// and speed.
    ///
    /// Repeated identifiers are registered once.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::EmptyInput`] if `identifiers` is empty.
    pub fn initialize<R: Rng + ?Sized>(
        identifiers: &[EntityId],
        spawn: &SpawnConfig,
        rng: &mut R,
    ) -> Result<Self> {
        if identifiers.is_empty() {
            return Err(SimulationError::EmptyInput);
        }

        let mut seen = HashSet::with_capacity(identifiers.len());
        let mut entities = Vec::with_capacity(identifiers.len());

        for &id in identifiers {
            if !seen.insert(id) {
                warn!(%id, "Duplicate identifier ignored");
                continue;
            }

            let position = spawn.region.sample(rng);
            let target = spawn.region.sample(rng);
            let heading_deg = rng.gen_range(0.0..360.0);
            let speed_km = rng.gen_range(spawn.speed_min_km..=spawn.speed_max_km);

            entities.push(SimulatedEntity::new(id, position, heading_deg, speed_km, target));
        }

        info!(count = entities.len(), "Initialized simulated entities");
        Ok(Self { entities })
    }

    /// Wrap entities that were built elsewhere, keeping their order.
    ///
    /// The caller is responsible for unique identifiers.
    pub const fn from_entities(entities: Vec<SimulatedEntity>) -> Self {
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&SimulatedEntity> {
        self.entities.iter().find(|e| e.id == *id)
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &SimulatedEntity)> {
        self.entities.iter().map(|e| (&e.id, e))
    }

    /// Current position of every entity, in registration order.
    pub fn positions(&self) -> Vec<(EntityId, GeoPoint)> {
        self.entities.iter().map(|e| (e.id, e.position)).collect()
    }

    /// Step every entity once under `policy`.
    pub fn advance_all<R: Rng + ?Sized>(&mut self, policy: &SteeringPolicy, rng: &mut R) -> AdvanceSummary {
        let mut summary = AdvanceSummary::default();
        for entity in &mut self.entities {
            if let SteeringOutcome::Retargeted { previous_target } = policy.advance(entity, rng) {
                tracing::debug!(
                    id = %entity.id,
                    prev_lat = previous_target.latitude,
                    prev_lon = previous_target.longitude,
                    next_lat = entity.target.latitude,
                    next_lon = entity.target.longitude,
                    "Target reached, retargeted"
                );
                summary.retargeted += 1;
            }
            summary.advanced += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cop_persistence::InMemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    #[test]
    fn test_initialize_empty_fails() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = EntityRegistry::initialize(&[], &SpawnConfig::default(), &mut rng);
        assert!(matches!(result, Err(SimulationError::EmptyInput)));
    }

    #[test]
    fn test_initialize_respects_spawn_config() {
        let spawn = SpawnConfig {
            region: BoundingBox::new(25.0, 45.0, -85.0, -65.0).unwrap(),
            speed_min_km: 2.0,
            speed_max_km: 5.0,
        };
        let ids: Vec<_> = (0..100).map(|_| Uuid::new_v4()).collect();
        let mut rng = StdRng::seed_from_u64(4);

        let registry = EntityRegistry::initialize(&ids, &spawn, &mut rng).unwrap();
        assert_eq!(registry.len(), 100);

        for (id, e) in registry.iter() {
            assert_eq!(*id, e.id);
            assert!(spawn.region.contains(&e.position));
            assert!(spawn.region.contains(&e.target));
            assert!((0.0..360.0).contains(&e.heading_deg));
            assert!((2.0..=5.0).contains(&e.speed_km));
        }
    }

    #[test]
    fn test_iteration_order_is_stable() {
        let ids: Vec<_> = (0..20).map(|_| Uuid::new_v4()).collect();
        let mut rng = StdRng::seed_from_u64(8);
        let mut registry = EntityRegistry::initialize(&ids, &SpawnConfig::default(), &mut rng).unwrap();

        let order: Vec<_> = registry.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, ids);

        registry.advance_all(&SteeringPolicy::default(), &mut rng);
        let after: Vec<_> = registry.positions().into_iter().map(|(id, _)| id).collect();
        assert_eq!(after, ids);
    }

    #[test]
    fn test_duplicates_registered_once() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rng = StdRng::seed_from_u64(8);
        let registry = EntityRegistry::initialize(&[id, other, id], &SpawnConfig::default(), &mut rng).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&other).is_some());
    }

    #[test]
    fn test_advance_all_moves_everyone() {
        let ids: Vec<_> = (0..10).map(|_| Uuid::new_v4()).collect();
        let mut rng = StdRng::seed_from_u64(12);
        let mut registry = EntityRegistry::initialize(&ids, &SpawnConfig::default(), &mut rng).unwrap();
        let before = registry.positions();

        let summary = registry.advance_all(&SteeringPolicy::default(), &mut rng);
        assert_eq!(summary.advanced, 10);

        for ((_, old), (_, new)) in before.iter().zip(registry.positions()) {
            assert_ne!(*old, new);
        }
    }

    #[tokio::test]
    async fn test_fetch_identifiers_checks_supply() {
        let store = InMemoryStore::new();
        let seeded = store.seed("vehicles", 3).unwrap();

        let ids = fetch_identifiers(&store, "vehicles", 3).await.unwrap();
        assert_eq!(ids, seeded);

        let short = fetch_identifiers(&store, "vehicles", 5).await;
        assert!(matches!(
            short,
            Err(SimulationError::InsufficientIdentifiers { requested: 5, found: 3 })
        ));

        let none = fetch_identifiers(&store, "aircraft", 5).await;
        assert!(matches!(none, Err(SimulationError::EmptyInput)));

        store.set_unavailable(true).unwrap();
        let down = fetch_identifiers(&store, "vehicles", 3).await;
        assert!(matches!(down, Err(SimulationError::IdentifierSource(_))));
    }
}
