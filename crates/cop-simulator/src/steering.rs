//! Bounded-turn steering toward a roaming destination.
//!
//! Each tick an entity turns at most `max_turn_rate_deg` toward its target and
//! then moves `speed_km` along the new heading. Capping the turn gives curved
//! tracks instead of instant snaps to the target bearing. When an entity gets
//! within `arrival_threshold_km` of its target, a new target is drawn
//! uniformly from the operating region.

use cop_domain::{BoundingBox, GeoPoint, SimulatedEntity};
use rand::Rng;

use crate::navigation::{bearing, destination_point, distance, normalize_bearing_delta, wrap_heading};

/// Default cap on heading change per tick, in degrees.
pub const DEFAULT_MAX_TURN_RATE_DEG: f64 = 5.0;

/// Default distance under which a target counts as reached.
pub const DEFAULT_ARRIVAL_THRESHOLD_KM: f64 = 80.0;

/// What happened to an entity during one steering step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SteeringOutcome {
    /// Kept flying toward the existing target
    Cruising,
    /// Reached the target and picked a new one before moving
    Retargeted { previous_target: GeoPoint },
}

/// Per-tick steering parameters shared by every entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringPolicy {
    pub max_turn_rate_deg: f64,
    pub arrival_threshold_km: f64,
    pub region: BoundingBox,
}

impl Default for SteeringPolicy {
    fn default() -> Self {
        Self {
            max_turn_rate_deg: DEFAULT_MAX_TURN_RATE_DEG,
            arrival_threshold_km: DEFAULT_ARRIVAL_THRESHOLD_KM,
            region: BoundingBox::default(),
        }
    }
}

impl SteeringPolicy {
    pub const fn new(max_turn_rate_deg: f64, arrival_threshold_km: f64, region: BoundingBox) -> Self {
        Self {
            max_turn_rate_deg,
            arrival_threshold_km,
            region,
        }
    }

    /// Clamp a signed heading difference to the turn-rate limit.
    #[must_use]
    pub fn bounded_turn(&self, diff_deg: f64) -> f64 {
        diff_deg.clamp(-self.max_turn_rate_deg, self.max_turn_rate_deg)
    }

    /// Heading change this entity would make toward `target` this tick.
    #[must_use]
    pub fn turn_toward(&self, entity: &SimulatedEntity, target: &GeoPoint) -> f64 {
        let desired = bearing(&entity.position, target);
        self.bounded_turn(normalize_bearing_delta(desired - entity.heading_deg))
    }

    /// Advance one entity by a single tick.
    pub fn advance<R: Rng + ?Sized>(&self, entity: &mut SimulatedEntity, rng: &mut R) -> SteeringOutcome {
        let mut outcome = SteeringOutcome::Cruising;

        if distance(&entity.position, &entity.target) < self.arrival_threshold_km {
            let previous_target = entity.target;
            entity.target = self.region.sample(rng);
            outcome = SteeringOutcome::Retargeted { previous_target };
        }

        let turn = self.turn_toward(entity, &entity.target);
        entity.heading_deg = wrap_heading(entity.heading_deg + turn);
        entity.position = destination_point(&entity.position, entity.heading_deg, entity.speed_km);

        outcome
    }
}
