//! Backend collaborators: the routing proxy and the route/fleet store.
//!
//! The controller only depends on the [`RouteProvider`] and [`RouteStore`] traits so it can be
//! driven by in-memory implementations in tests. [`RouteServiceClient`] and
//! [`PersistenceClient`] are the `reqwest` implementations talking to the backend.

use std::future::Future;

use reqwest::{Response, StatusCode};

use crate::error::ServiceError;
use crate::fleet::FleetLocation;
use crate::geo::LatLon;
use crate::route::{Poi, Route, RouteRecord, StoredRoute};
use crate::vehicle::VehicleId;

mod routing;
mod store;

pub use routing::{RouteServiceClient, parse_route};
pub use store::{PersistenceClient, parse_pois};

/// Obtains routes between two points from an external routing provider.
pub trait RouteProvider: Send + Sync + 'static {
    /// Request a route from `origin` to `destination`.
    ///
    /// A response without at least one non-empty point sequence is an error.
    fn fetch_route(
        &self,
        origin: LatLon,
        destination: LatLon,
    ) -> impl Future<Output = Result<Route, ServiceError>> + Send;
}

/// Backend storage of routes, POIs, and fleet positions.
pub trait RouteStore: Send + Sync + 'static {
    /// The route stored for `vehicle_id`, or `None` when nothing is stored.
    fn load_route(
        &self,
        vehicle_id: VehicleId,
    ) -> impl Future<Output = Result<Option<StoredRoute>, ServiceError>> + Send;

    fn save_route(
        &self,
        record: &RouteRecord,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn clear_route(
        &self,
        vehicle_id: VehicleId,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// POIs along the stored route of `vehicle_id`, or `None` when no route is stored.
    fn load_pois(
        &self,
        vehicle_id: VehicleId,
    ) -> impl Future<Output = Result<Option<Vec<Poi>>, ServiceError>> + Send;

    fn latest_locations(
        &self,
    ) -> impl Future<Output = Result<Vec<FleetLocation>, ServiceError>> + Send;

    /// Report a live position of `vehicle_id`. A no-op when no ingest endpoint is configured.
    fn post_live_location(
        &self,
        vehicle_id: VehicleId,
        position: LatLon,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;
}

/// The body of a successful response, or [`ServiceError::Status`] carrying the error body.
async fn success_body(response: Response) -> Result<String, ServiceError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(ServiceError::Status { status, body })
    }
}

fn is_no_content(response: &Response) -> bool {
    response.status() == StatusCode::NO_CONTENT
}
