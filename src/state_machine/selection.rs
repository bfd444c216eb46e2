//! Origin / destination selection and the route that belongs to it.
//!
//! ```text
//! Idle --SelectOrigin--> OriginSet(NoRoute) --MapClick--> OriginSet(RouteLoading)
//!                             ^    |                              |
//!                             |    +--stored route found--+       v
//!                             |                            +-> OriginSet(RouteActive)
//!                             +--------ClearRoute{keep}------------+
//! ```

use tracing::{debug, warn};

use super::StateMachine;
use super::effect::{Effect, EffectQueue};
use crate::error::ServiceError;
use crate::geo::LatLon;
use crate::route::{Poi, Route, RouteRecord, StoredRoute};
use crate::session::{RouteTicket, SelectionEpoch};
use crate::vehicle::VehicleId;
use crate::view::{RouteInfo, RouteLayer, Status, ViewUpdate};

/// The vehicle anchoring the route.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub vehicle_id: VehicleId,
    pub vehicle_name: String,
    /// `None` while the vehicle has not been located yet.
    pub position: Option<LatLon>,
}

impl Origin {
    pub fn new(vehicle_id: VehicleId, vehicle_name: impl Into<String>, position: LatLon) -> Self {
        Self {
            vehicle_id,
            vehicle_name: vehicle_name.into(),
            position: Some(position),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub origin: Option<Origin>,
    pub destination: Option<LatLon>,
    pub route: Option<Route>,
    pub map_click_armed: bool,
    pub pois_shown: bool,
    pub epoch: SelectionEpoch,
}

#[derive(Debug)]
pub enum SelectionInput {
    SelectOrigin(Origin),
    StoredRouteLoaded {
        epoch: SelectionEpoch,
        result: Result<Option<StoredRoute>, ServiceError>,
    },
    /// A point picked on the map. Ignored unless map click is armed.
    MapClick(LatLon),
    /// Set the destination directly, regardless of map click.
    SelectDestination(LatLon),
    RouteFetched {
        epoch: SelectionEpoch,
        result: Result<Route, ServiceError>,
    },
    ClearRoute {
        keep_origin: bool,
    },
    TogglePois,
    PoisLoaded {
        epoch: SelectionEpoch,
        result: Result<Option<Vec<Poi>>, ServiceError>,
    },
}

#[derive(Debug, Default)]
pub struct SelectionMachine {
    state: SelectionState,
    effects: EffectQueue,
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.state.origin.as_ref()
    }

    pub fn destination(&self) -> Option<LatLon> {
        self.state.destination
    }

    pub fn route(&self) -> Option<&Route> {
        self.state.route.as_ref()
    }

    pub fn is_map_click_armed(&self) -> bool {
        self.state.map_click_armed
    }

    pub fn epoch(&self) -> SelectionEpoch {
        self.state.epoch
    }

    fn select_origin(&mut self, origin: Origin) {
        let previous = self.state.origin.take();
        // A destination picked before any origin waits for this origin instead of being dropped.
        let keep_pending = previous.is_none() && self.state.route.is_none();

        self.state.epoch = self.state.epoch.next();
        self.remove_drawn_route();
        if !keep_pending {
            self.remove_destination();
        }
        self.hide_pois();
        self.set_map_click(false);
        self.effects.view(ViewUpdate::RouteInfo(None));

        if let Some(previous) = previous.filter(|p| p.vehicle_id != origin.vehicle_id) {
            self.effects.push(Effect::ClearStoredRoute(previous.vehicle_id));
        }

        let text = match origin.position {
            Some(position) => format!(
                "Origin set to {} ({position}). Checking for stored route...",
                origin.vehicle_name
            ),
            None => format!(
                "Origin set to {}. Checking for stored route...",
                origin.vehicle_name
            ),
        };
        self.effects.status(Status::info(text));
        self.effects.push(Effect::LoadStoredRoute {
            epoch: self.state.epoch,
            vehicle_id: origin.vehicle_id,
        });

        self.state.origin = Some(origin);
    }

    fn stored_route_loaded(
        &mut self,
        epoch: SelectionEpoch,
        result: Result<Option<StoredRoute>, ServiceError>,
    ) {
        if epoch != self.state.epoch {
            debug!(%epoch, current = %self.state.epoch, "Discarding stale stored route");
            return;
        }
        let Some(name) = self.origin_name() else {
            return;
        };

        match result {
            Ok(stored) => match stored.and_then(StoredRoute::into_route) {
                Some((route, destination)) => {
                    self.state.destination = Some(destination);
                    self.effects
                        .view(ViewUpdate::DestinationMarker(Some(destination)));
                    self.install_route(route, &name);
                    self.effects
                        .status(Status::info(format!("Showing stored route for {name}.")));
                }
                None => {
                    self.effects.status(Status::info(format!(
                        "Origin set to {name}. Click the map to choose a destination."
                    )));
                    self.set_map_click(true);
                    self.request_route();
                }
            },
            Err(err) => {
                warn!(error = %err, vehicle = %name, "Failed to load stored route");
                self.effects.status(Status::error(format!(
                    "Origin set to {name}. Could not load stored route. Click the map to choose a destination."
                )));
                self.set_map_click(true);
                self.request_route();
            }
        }
    }

    fn map_click(&mut self, position: LatLon) {
        if !self.state.map_click_armed {
            debug!(%position, "Map click ignored, not armed");
            return;
        }
        self.select_destination(position);
    }

    fn select_destination(&mut self, position: LatLon) {
        self.state.epoch = self.state.epoch.next();
        if self.state.route.take().is_some() {
            self.effects
                .view(ViewUpdate::RemoveRoute(RouteLayer::Selection));
            self.effects.view(ViewUpdate::ClearEnabled(false));
            self.effects.view(ViewUpdate::RouteInfo(None));
        }
        self.state.destination = Some(position);
        self.effects
            .view(ViewUpdate::DestinationMarker(Some(position)));

        if self.state.origin.is_some() {
            self.effects.status(Status::info(format!(
                "Destination set at {position}. Fetching route…"
            )));
            self.request_route();
        } else {
            self.effects.status(Status::muted(format!(
                "Destination set at {position}. Click a vehicle to set origin."
            )));
        }
    }

    /// Issue a route request for the current selection. A no-op unless both ends are known.
    fn request_route(&mut self) -> bool {
        let (Some(origin), Some(destination)) = (&self.state.origin, self.state.destination)
        else {
            return false;
        };
        let Some(position) = origin.position else {
            debug!(vehicle_id = %origin.vehicle_id, "Origin has no position yet, not routing");
            return false;
        };

        self.effects.push(Effect::FetchRoute {
            ticket: RouteTicket::Selection(self.state.epoch),
            origin: position,
            destination,
        });
        true
    }

    fn route_fetched(&mut self, epoch: SelectionEpoch, result: Result<Route, ServiceError>) {
        if epoch != self.state.epoch {
            debug!(%epoch, current = %self.state.epoch, "Discarding stale route");
            return;
        }
        let (Some(origin), Some(destination)) = (&self.state.origin, self.state.destination)
        else {
            return;
        };
        let vehicle_id = origin.vehicle_id;
        let name = origin.vehicle_name.clone();

        let route = result.and_then(|route| {
            if route.is_drawable() {
                Ok(route)
            } else {
                Err(ServiceError::NoRoute)
            }
        });

        match route {
            Ok(route) => {
                self.effects.push(Effect::SaveRoute(RouteRecord::new(
                    vehicle_id,
                    &route,
                    destination,
                )));
                self.install_route(route, &name);
                let stats = self
                    .state
                    .route
                    .as_ref()
                    .map(Route::stats_text)
                    .unwrap_or_default();
                self.effects.status(Status::success(format!(
                    "{stats} from {name} to destination."
                )));
            }
            Err(err) => {
                warn!(error = %err, vehicle = %name, "Route request failed");
                self.effects
                    .status(Status::error(format!("Unable to fetch route: {err}")));
            }
        }
    }

    fn clear_route(&mut self, keep_origin: bool) {
        self.state.epoch = self.state.epoch.next();
        self.state.route = None;
        self.effects
            .view(ViewUpdate::RemoveRoute(RouteLayer::Selection));
        self.remove_destination();
        self.hide_pois();
        self.set_map_click(false);
        self.effects.view(ViewUpdate::ClearEnabled(false));
        self.effects.view(ViewUpdate::RouteInfo(None));

        if let Some(origin) = &self.state.origin {
            self.effects
                .push(Effect::ClearStoredRoute(origin.vehicle_id));
        }

        match self.origin_name().filter(|_| keep_origin) {
            Some(name) => {
                self.effects.status(Status::muted(format!(
                    "Route cleared. Click the map to choose a destination for {name}."
                )));
                self.set_map_click(true);
            }
            None => {
                self.state.origin = None;
                self.effects.status(Status::muted(
                    "Route cleared. Click a vehicle to set origin, then click the map for destination.",
                ));
            }
        }
    }

    fn toggle_pois(&mut self) {
        let Some(origin) = &self.state.origin else {
            self.effects.status(Status::error(
                "Select a vehicle with a stored route before loading POIs.",
            ));
            return;
        };
        let vehicle_id = origin.vehicle_id;

        if self.state.pois_shown {
            self.hide_pois();
            self.effects.status(Status::muted("POIs hidden."));
            return;
        }

        self.effects.status(Status::info("Loading POIs..."));
        self.effects.push(Effect::LoadPois {
            epoch: self.state.epoch,
            vehicle_id,
        });
    }

    fn pois_loaded(
        &mut self,
        epoch: SelectionEpoch,
        result: Result<Option<Vec<Poi>>, ServiceError>,
    ) {
        if epoch != self.state.epoch {
            debug!(%epoch, current = %self.state.epoch, "Discarding stale POIs");
            return;
        }
        let Some(name) = self.origin_name() else {
            return;
        };

        match result {
            Ok(None) => self.effects.status(Status::error(
                "No stored route for this vehicle; cannot load POIs.",
            )),
            Ok(Some(pois)) if pois.is_empty() => self
                .effects
                .status(Status::info("No POIs found along this route.")),
            Ok(Some(pois)) => {
                let count = pois.len();
                self.state.pois_shown = true;
                self.effects.view(ViewUpdate::Pois(Some(pois)));
                self.effects
                    .status(Status::success(format!("Loaded {count} POIs for {name}.")));
            }
            Err(err) => {
                warn!(error = %err, "POI request failed");
                self.effects
                    .status(Status::error(format!("Unable to load POIs: {err}")));
            }
        }
    }

    fn install_route(&mut self, route: Route, vehicle_name: &str) {
        self.effects.view(ViewUpdate::DrawRoute {
            layer: RouteLayer::Selection,
            points: route.points.clone(),
        });
        self.effects.view(ViewUpdate::RouteInfo(Some(RouteInfo::new(
            vehicle_name,
            &route,
        ))));
        self.effects.view(ViewUpdate::ClearEnabled(true));
        self.set_map_click(false);
        self.state.route = Some(route);
    }

    fn remove_drawn_route(&mut self) {
        self.state.route = None;
        self.effects
            .view(ViewUpdate::RemoveRoute(RouteLayer::Selection));
        self.effects.view(ViewUpdate::ClearEnabled(false));
    }

    fn remove_destination(&mut self) {
        self.state.destination = None;
        self.effects.view(ViewUpdate::DestinationMarker(None));
    }

    fn hide_pois(&mut self) {
        if self.state.pois_shown {
            self.state.pois_shown = false;
            self.effects.view(ViewUpdate::Pois(None));
        }
    }

    fn set_map_click(&mut self, armed: bool) {
        if self.state.map_click_armed != armed {
            self.state.map_click_armed = armed;
            self.effects.view(ViewUpdate::MapClickArmed(armed));
        }
    }

    fn origin_name(&self) -> Option<String> {
        self.state
            .origin
            .as_ref()
            .map(|origin| origin.vehicle_name.clone())
    }
}

impl StateMachine for SelectionMachine {
    type Input = SelectionInput;
    type Output = Effect;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            SelectionInput::SelectOrigin(origin) => self.select_origin(origin),
            SelectionInput::StoredRouteLoaded { epoch, result } => {
                self.stored_route_loaded(epoch, result)
            }
            SelectionInput::MapClick(position) => self.map_click(position),
            SelectionInput::SelectDestination(position) => self.select_destination(position),
            SelectionInput::RouteFetched { epoch, result } => self.route_fetched(epoch, result),
            SelectionInput::ClearRoute { keep_origin } => self.clear_route(keep_origin),
            SelectionInput::TogglePois => self.toggle_pois(),
            SelectionInput::PoisLoaded { epoch, result } => self.pois_loaded(epoch, result),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.effects.pop()
    }
}
