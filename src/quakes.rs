//! Filtering the earthquake feed down to what matters around the user.

use std::cmp::Ordering;

use crate::api::models::{Coordinates, Earthquake};

/// Mean Earth radius (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

pub const DEFAULT_RADIUS_KM: f64 = 500.0;

/// Great-circle distance between two points, haversine formula.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuake {
    pub quake: Earthquake,
    pub distance_km: f64,
}

/// Quakes within `radius_km` of `origin` and at least `min_magnitude`,
/// closest first. Equal distances put the most recent first.
pub fn nearby(feed: &[Earthquake], origin: Coordinates, radius_km: f64, min_magnitude: f64) -> Vec<NearbyQuake> {
    let mut out: Vec<NearbyQuake> = feed
        .iter()
        .filter(|q| q.magnitude >= min_magnitude)
        .map(|q| NearbyQuake { distance_km: distance_km(origin, q.coordinates()), quake: q.clone() })
        .filter(|n| n.distance_km <= radius_km)
        .collect();
    out.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.quake.time.cmp(&a.quake.time))
    });
    out
}
