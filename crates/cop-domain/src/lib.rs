//! # Common Operating Picture - Domain Model
//!
//! Value objects shared by the motion simulator and the persistence layer.
//! Positions are WGS84 degrees; distances are kilometres.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a tracked row in the external spatial store.
pub type EntityId = Uuid;

// =============================================================================
// ERRORS
// =============================================================================

/// Domain validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid point: lat={latitude}, lon={longitude}")]
    InvalidPoint { latitude: f64, longitude: f64 },
}

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build a point, rejecting out-of-range or non-finite coordinates.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        let point = Self::new(latitude, longitude);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(DomainError::InvalidPoint {
                latitude,
                longitude,
            })
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Wrap longitude into [-180, 180) and clamp latitude to the poles.
    #[must_use]
    pub fn normalized(self) -> Self {
        let mut longitude = (self.longitude + 180.0).rem_euclid(360.0) - 180.0;
        if longitude >= 180.0 {
            longitude -= 360.0;
        }
        Self {
            latitude: self.latitude.clamp(-90.0, 90.0),
            longitude,
        }
    }
}

/// Rectangular operating region in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a validated region.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidRegion`] if a bound leaves the globe or a
    /// minimum is not strictly below its maximum.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self, DomainError> {
        let bounds = [min_lat, max_lat, min_lon, max_lon];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(DomainError::InvalidRegion("bounds must be finite".into()));
        }
        if !(-90.0..=90.0).contains(&min_lat) || !(-90.0..=90.0).contains(&max_lat) {
            return Err(DomainError::InvalidRegion(format!(
                "latitude bounds [{min_lat}, {max_lat}] outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&min_lon) || !(-180.0..=180.0).contains(&max_lon) {
            return Err(DomainError::InvalidRegion(format!(
                "longitude bounds [{min_lon}, {max_lon}] outside [-180, 180]"
            )));
        }
        if min_lat >= max_lat || min_lon >= max_lon {
            return Err(DomainError::InvalidRegion(format!(
                "empty region lat [{min_lat}, {max_lat}] lon [{min_lon}, {max_lon}]"
            )));
        }

        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lon..=self.max_lon).contains(&point.longitude)
    }

    /// Draw a uniformly distributed point inside the region.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> GeoPoint {
        GeoPoint::new(
            rng.gen_range(self.min_lat..=self.max_lat),
            rng.gen_range(self.min_lon..=self.max_lon),
        )
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        // Keeps tracks clear of the poles and the antimeridian
        Self {
            min_lat: -55.0,
            max_lat: 55.0,
            min_lon: -160.0,
            max_lon: 160.0,
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A moving object tracked by the simulator.
///
/// `heading_deg` stays in [0, 360). `speed_km` is the distance covered per
/// tick and never changes after creation. `target` is only ever replaced as a
/// whole, on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedEntity {
    pub id: EntityId,
    pub position: GeoPoint,
    pub heading_deg: f64,
    pub speed_km: f64,
    pub target: GeoPoint,
}

impl SimulatedEntity {
    pub const fn new(
        id: EntityId,
        position: GeoPoint,
        heading_deg: f64,
        speed_km: f64,
        target: GeoPoint,
    ) -> Self {
        Self {
            id,
            position,
            heading_deg,
            speed_km,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_region_rejects_inverted_bounds() {
        assert!(BoundingBox::new(10.0, -10.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 5.0, 5.0).is_err());
        assert!(BoundingBox::new(-91.0, 0.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(0.0, 1.0, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_region_sample_stays_inside() {
        let region = BoundingBox::new(25.0, 45.0, -85.0, -65.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let p = region.sample(&mut rng);
            assert!(region.contains(&p), "{p:?} escaped {region:?}");
        }
    }

    #[test]
    fn test_normalized_wraps_longitude() {
        let p = GeoPoint::new(10.0, 190.0).normalized();
        assert!((p.longitude + 170.0).abs() < 1e-9);

        let p = GeoPoint::new(10.0, -180.0).normalized();
        assert!((p.longitude + 180.0).abs() < 1e-9);

        let p = GeoPoint::new(95.0, 180.0).normalized();
        assert!((p.latitude - 90.0).abs() < 1e-9);
        assert!((p.longitude + 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_try_new_validates() {
        assert!(GeoPoint::try_new(45.0, 90.0).is_ok());
        assert_eq!(
            GeoPoint::try_new(91.0, 0.0),
            Err(DomainError::InvalidPoint {
                latitude: 91.0,
                longitude: 0.0
            })
        );
    }

    #[test]
    fn test_entity_serializes() {
        let entity = SimulatedEntity::new(
            Uuid::nil(),
            GeoPoint::new(1.0, 2.0),
            90.0,
            50.0,
            GeoPoint::new(3.0, 4.0),
        );
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["heading_deg"], 90.0);
        assert_eq!(json["target"]["longitude"], 4.0);
    }
}
