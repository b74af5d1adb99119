//! Great-circle navigation on a spherical earth.
//!
//! All functions are pure. Inputs are assumed to be valid coordinates and are
//! not re-checked here.

use cop_domain::GeoPoint;

/// Mean earth radius used for both projection and distance.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial compass bearing from `from` toward `to`, in [0, 360).
#[must_use]
pub fn bearing(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let x = delta_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    wrap_heading(x.atan2(y).to_degrees())
}

/// Project `origin` along `bearing_deg` for `distance_km`.
///
/// The resulting longitude is wrapped into [-180, 180).
#[must_use]
pub fn destination_point(origin: &GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
    let angular = distance_km / EARTH_RADIUS_KM;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees()).normalized()
}

/// Haversine great-circle distance in kilometres.
#[must_use]
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Wrap any angle into [0, 360).
#[must_use]
pub fn wrap_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed shortest rotation in (-180, 180].
///
/// A difference of exactly 180 degrees maps to +180, so a target directly
/// behind is always turned toward clockwise.
#[must_use]
pub fn normalize_bearing_delta(delta: f64) -> f64 {
    let wrapped = delta.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}
