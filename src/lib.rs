pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod fleet;
pub mod geo;
pub mod geolocation;
pub mod route;
pub mod session;
pub mod state_machine;
pub mod vehicle;
pub mod view;

use crate::vehicle::VehicleId;

/// Latest known position of every vehicle.
pub const LATEST_LOCATIONS_PATH: &str = "latest-locations";

/// Where computed routes are persisted.
pub const ROUTES_PATH: &str = "routes";

/// Live location ingest, relative to the ingest base url.
pub const INGEST_LOCATION_PATH: &str = "ingest-location";

/// Route stored for a vehicle. `GET` loads it (204 when none), `DELETE` clears it.
pub fn stored_route_path(vehicle_id: VehicleId) -> String {
    format!("vehicle/{vehicle_id}/route")
}

/// POIs along the stored route of a vehicle.
pub fn pois_path(vehicle_id: VehicleId) -> String {
    format!("vehicle/{vehicle_id}/pois")
}
