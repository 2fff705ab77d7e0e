//! Great-circle distance between readings, used for distance-gated emission.

use crate::domain::Reading;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance in meters between two (latitude, longitude) pairs in degrees.
pub fn distance_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Distance in meters between two readings.
pub fn reading_distance(a: &Reading, b: &Reading) -> f64 {
    distance_meters(
        (a.latitude(), a.longitude()),
        (b.latitude(), b.longitude()),
    )
}

/// Latitude delta (degrees) corresponding to `meters` due north. Handy for building tracks.
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_M).to_degrees()
}
