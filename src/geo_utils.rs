//! # Geographic Utilities
//!
//! Distance helpers shared by the location filter and the trip trail queries.
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`meters_to_km`] | Unit conversion used at the storage/display boundary |
//!
//! ## Example
//!
//! ```rust
//! use trip_tracker::{GpsPoint, geo_utils};
//!
//! let london = GpsPoint::new(51.5074, -0.1278);
//! let paris = GpsPoint::new(48.8566, 2.3522);
//!
//! let distance = geo_utils::haversine_distance(&london, &paris);
//! assert!((distance - 343_560.0).abs() < 5000.0);
//! ```

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters (spherical Earth, radius 6,371 km).
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Total length of a polyline in meters. Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Convert meters to kilometers.
#[inline]
pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

/// Offset a point northwards by roughly `meters`. Used to build synthetic tracks.
pub fn offset_north(point: &GpsPoint, meters: f64) -> GpsPoint {
    // One degree of latitude is ~111,195 m on the haversine sphere
    GpsPoint::new(point.latitude + meters / 111_195.0, point.longitude)
}
