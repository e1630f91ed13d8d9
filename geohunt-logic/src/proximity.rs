//! Great-circle distance and landmark range checks. Everything here is a pure function of its
//! inputs.

use crate::{
    fix::{Fix, Positioned},
    landmark::Landmark,
};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points given in degrees
pub fn distance_meters(a: &impl Positioned, b: &impl Positioned) -> f64 {
    let a = a.coordinate();
    let b = b.coordinate();

    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lng = (d_lng / 2.0).sin();
    let h = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;

    // Rounding can push h a hair outside [0, 1] near antipodes, asin would give NaN
    2.0 * EARTH_RADIUS_METERS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Whether `fix` is close enough to `landmark` to unlock its task, the boundary counts as in
/// range
pub fn is_in_range(fix: &Fix, landmark: &Landmark) -> bool {
    distance_meters(fix, landmark) <= landmark.radius_meters
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyLandmark<'a> {
    pub landmark: &'a Landmark,
    pub distance_meters: f64,
}

/// Landmarks within `max_distance` meters of `fix`, closest first. Equal distances keep the
/// order of `landmarks`.
pub fn nearby<'a, I>(fix: &Fix, landmarks: I, max_distance: f64) -> Vec<NearbyLandmark<'a>>
where
    I: IntoIterator<Item = &'a Landmark>,
{
    let mut found = landmarks
        .into_iter()
        .map(|landmark| NearbyLandmark {
            landmark,
            distance_meters: distance_meters(fix, landmark),
        })
        .filter(|n| n.distance_meters <= max_distance)
        .collect::<Vec<_>>();

    found.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

    found
}
