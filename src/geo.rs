//! Coordinates and great-circle math shared by status text and arrival detection.

use std::fmt;

use ::geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
///
/// On the wire a position is always the two element array `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to `other` in meters (haversine on the mean earth radius).
    ///
    /// The result is never rounded; callers round only for display.
    pub fn distance_m(&self, other: &LatLon) -> f64 {
        Point::from(*self).haversine_distance(&Point::from(*other))
    }

    /// Query string form used by the routing proxy (`lat,lon` with five decimals).
    pub fn query_param(&self) -> String {
        format!("{:.5},{:.5}", self.lat, self.lon)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Four decimal `lat, lon` as shown in status lines and popups.
impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

impl From<LatLon> for Point<f64> {
    fn from(p: LatLon) -> Self {
        Point::new(p.lon, p.lat)
    }
}

impl From<[f64; 2]> for LatLon {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<LatLon> for [f64; 2] {
    fn from(p: LatLon) -> Self {
        [p.lat, p.lon]
    }
}

/// Human readable distance: whole meters below one kilometer, otherwise one decimal km.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}
