use serde::{Deserialize, Serialize};

use crate::geo::LatLon;
use crate::vehicle::VehicleId;

/// An ordered polyline with the provider's summary for one origin/destination pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub points: Vec<LatLon>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
}

impl Route {
    pub fn is_drawable(&self) -> bool {
        !self.points.is_empty()
    }

    /// Distance rounded to one decimal kilometer, if known.
    pub fn km_text(&self) -> Option<String> {
        self.distance_m
            .filter(|m| *m > 0.0)
            .map(|m| format!("{:.1} km", m / 1000.0))
    }

    /// Duration rounded to whole minutes, if known and at least a minute after rounding.
    pub fn minutes_text(&self) -> Option<String> {
        self.duration_s
            .map(|s| (s / 60.0).round() as i64)
            .filter(|min| *min > 0)
            .map(|min| format!("~{min} min"))
    }

    /// Status line form: `"12.0 km, ~15 min"` or `"Route ready"` when either part is unknown.
    pub fn stats_text(&self) -> String {
        match (self.km_text(), self.minutes_text()) {
            (Some(km), Some(min)) => format!("{km}, {min}"),
            _ => "Route ready".to_string(),
        }
    }

    /// Info panel form: whichever parts are known, or a placeholder.
    pub fn meta_text(&self) -> String {
        let parts: Vec<String> = [self.km_text(), self.minutes_text()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            "Distance/time unavailable".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A route as kept by the backend for next-session recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRoute {
    #[serde(default)]
    pub path: Vec<LatLon>,
    pub destination: Option<LatLon>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub travel_time_seconds: Option<f64>,
}

impl StoredRoute {
    /// The stored route as a drawable [`Route`] plus its destination, when complete.
    pub fn into_route(self) -> Option<(Route, LatLon)> {
        let destination = self.destination?;
        if self.path.is_empty() {
            return None;
        }
        let route = Route {
            points: self.path,
            distance_m: self.distance_meters,
            duration_s: self.travel_time_seconds,
        };
        Some((route, destination))
    }
}

/// Payload of `POST routes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub vehicle_id: VehicleId,
    pub path: Vec<LatLon>,
    pub destination: LatLon,
    pub distance_meters: Option<f64>,
    pub travel_time_seconds: Option<f64>,
}

impl RouteRecord {
    pub fn new(vehicle_id: VehicleId, route: &Route, destination: LatLon) -> Self {
        Self {
            vehicle_id,
            path: route.points.clone(),
            destination,
            distance_meters: route.distance_m.filter(|m| *m > 0.0),
            travel_time_seconds: route.duration_s.filter(|s| *s > 0.0),
        }
    }
}

/// Kind of a point of interest along a stored route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoiKind {
    Fuel,
    Parking,
    TruckParking,
    Other,
}

impl PoiKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "fuel" => Self::Fuel,
            "parking" => Self::Parking,
            "truck_parking" => Self::TruckParking,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub kind: PoiKind,
    pub name: String,
    pub position: LatLon,
    pub tags: Vec<(String, String)>,
}
