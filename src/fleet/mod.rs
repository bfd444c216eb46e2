use dashmap::DashMap;
use serde::Deserialize;

use crate::geo::LatLon;
use crate::vehicle::VehicleId;

use self::error::VehicleNotFound;

pub mod error;

/// One row of `GET latest-locations`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetLocation {
    pub vehicle_id: VehicleId,
    pub vehicle_name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub travel_time_seconds: Option<f64>,
}

impl FleetLocation {
    /// The feed row as a positioned [`FleetEntry`], or `None` when coordinates are missing.
    pub fn into_entry(self) -> Option<FleetEntry> {
        let position = LatLon::new(self.lat?, self.lon?);
        Some(FleetEntry {
            vehicle_id: self.vehicle_id,
            name: self.vehicle_name,
            position,
            timestamp: self.timestamp,
            distance_m: self.distance_meters,
            travel_time_s: self.travel_time_seconds,
        })
    }
}

/// Latest known position of a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetEntry {
    pub vehicle_id: VehicleId,
    pub name: String,
    pub position: LatLon,
    pub timestamp: String,
    pub distance_m: Option<f64>,
    pub travel_time_s: Option<f64>,
}

impl FleetEntry {
    /// List line summary, e.g. `"ETA: 15 min • Dist: 12.0 km"`.
    pub fn eta_text(&self) -> String {
        let eta = self
            .travel_time_s
            .map(|s| (s / 60.0).round() as i64)
            .filter(|min| *min > 0)
            .map(|min| format!("{min} min"))
            .unwrap_or_else(|| "ETA n/a".to_string());
        let dist = self
            .distance_m
            .filter(|m| *m > 0.0)
            .map(|m| format!("{:.1} km", m / 1000.0))
            .unwrap_or_else(|| "Dist n/a".to_string());
        format!("ETA: {eta} • Dist: {dist}")
    }
}

/// The most recent fleet feed, keyed by [`VehicleId`].
///
/// Written by the fleet refresh and read by vehicle selection, so it is shared between the
/// controller task and command handles.
#[derive(Debug)]
pub struct FleetMap {
    vehicles: DashMap<VehicleId, FleetEntry, ahash::RandomState>,
}

impl FleetMap {
    /// Construct a new empty [`FleetMap`].
    pub fn new() -> FleetMap {
        Self::default()
    }

    /// Merge a feed into the map, skipping rows without coordinates.
    ///
    /// Returns the positioned entries of this feed ordered by vehicle id.
    pub fn apply_feed(&self, feed: Vec<FleetLocation>) -> Vec<FleetEntry> {
        let mut entries: Vec<FleetEntry> = feed
            .into_iter()
            .filter_map(FleetLocation::into_entry)
            .collect();
        entries.sort_by_key(|entry| entry.vehicle_id);

        for entry in &entries {
            self.vehicles.insert(entry.vehicle_id, entry.clone());
        }
        entries
    }

    /// Lookup the latest entry for `vehicle_id`.
    pub fn get(&self, vehicle_id: VehicleId) -> Result<FleetEntry, VehicleNotFound> {
        self.vehicles
            .get(&vehicle_id)
            .map(|entry| entry.value().clone())
            .ok_or(VehicleNotFound { vehicle_id })
    }

    pub(crate) fn len(&self) -> usize {
        self.vehicles.len()
    }
}

impl Default for FleetMap {
    fn default() -> Self {
        Self {
            vehicles: DashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> Vec<FleetLocation> {
        serde_json::from_str(
            r#"[
                {"vehicleId": 3, "vehicleName": "Truck-3", "lat": null, "lon": null, "timestamp": "2024-01-01T10:00:00Z"},
                {"vehicleId": 2, "vehicleName": "Truck-1", "lat": 53.30, "lon": -6.25, "timestamp": "2024-01-01T10:00:00Z",
                 "distanceMeters": 12000, "travelTimeSeconds": 900},
                {"vehicleId": 1, "vehicleName": "Van", "lat": 52.0, "lon": -7.0, "timestamp": "2024-01-01T09:59:00Z"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_feed_skips_missing_coordinates() {
        let map = FleetMap::new();
        let entries = map.apply_feed(feed());

        assert_eq!(entries.len(), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(entries[0].vehicle_id, VehicleId::new(1));
        assert!(map.get(VehicleId::new(3)).is_err());
    }

    #[test]
    fn test_lookup() {
        let map = FleetMap::new();
        map.apply_feed(feed());

        let truck = map.get(VehicleId::new(2)).unwrap();
        assert_eq!(truck.name, "Truck-1");
        assert_eq!(truck.position, LatLon::new(53.30, -6.25));
        assert_eq!(truck.eta_text(), "ETA: 15 min • Dist: 12.0 km");
    }

    #[test]
    fn test_lookup_missing_vehicle() {
        let map = FleetMap::new();
        let err = map.get(VehicleId::new(9)).unwrap_err();
        assert_eq!(err.vehicle_id, VehicleId::new(9));
        assert_eq!(map.get(VehicleId::new(9)).unwrap_err().to_string(), "vehicle 9 is not in the fleet feed");
    }

    #[test]
    fn test_missing_summary_text() {
        let map = FleetMap::new();
        map.apply_feed(feed());
        assert_eq!(map.get(VehicleId::new(1)).unwrap().eta_text(), "ETA: ETA n/a • Dist: Dist n/a");
    }

    #[test]
    fn test_sub_half_minute_eta_is_unknown() {
        let map = FleetMap::new();
        map.apply_feed(vec![FleetLocation {
            vehicle_id: VehicleId::new(4),
            vehicle_name: "Bike".to_string(),
            lat: Some(53.3),
            lon: Some(-6.25),
            timestamp: String::new(),
            distance_meters: Some(1_200.0),
            travel_time_seconds: Some(20.0),
        }]);
        assert_eq!(map.get(VehicleId::new(4)).unwrap().eta_text(), "ETA: ETA n/a • Dist: 1.2 km");
    }

    #[test]
    fn test_later_feed_overwrites() {
        let map = FleetMap::new();
        map.apply_feed(feed());
        map.apply_feed(vec![FleetLocation {
            vehicle_id: VehicleId::new(2),
            vehicle_name: "Truck-1".to_string(),
            lat: Some(53.31),
            lon: Some(-6.26),
            timestamp: String::new(),
            distance_meters: None,
            travel_time_seconds: None,
        }]);
        assert_eq!(map.get(VehicleId::new(2)).unwrap().position, LatLon::new(53.31, -6.26));
    }
}
