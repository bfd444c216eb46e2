//! Updates pushed to whatever renders the map, the fleet list and the status line.

use crate::fleet::FleetEntry;
use crate::geo::LatLon;
use crate::route::{Poi, Route};
use crate::state_machine::tracking::TrackingPhase;

/// Colouring of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
    Muted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub tone: Tone,
}

impl Status {
    pub fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Tone::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(Tone::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Tone::Error, text)
    }

    pub fn muted(text: impl Into<String>) -> Self {
        Self::new(Tone::Muted, text)
    }
}

/// Route layers drawn on the map. Live tracking keeps its own layer so a manual clear of the
/// selected route leaves the tracked route alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLayer {
    Selection,
    Tracking,
}

/// Summary box of the active route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub vehicle_name: String,
    pub meta: String,
}

impl RouteInfo {
    pub fn new(vehicle_name: &str, route: &Route) -> Self {
        Self {
            vehicle_name: vehicle_name.to_string(),
            meta: route.meta_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    Status(Status),
    /// Replace the polyline of `layer` and fit the map to it.
    DrawRoute { layer: RouteLayer, points: Vec<LatLon> },
    RemoveRoute(RouteLayer),
    DestinationMarker(Option<LatLon>),
    /// Last sample of the tracked vehicle.
    PositionMarker(Option<LatLon>),
    /// Latest fix of the live location watch. Kept apart from the tracking marker.
    LiveMarker(Option<LatLon>),
    Recenter(LatLon),
    MapClickArmed(bool),
    ClearEnabled(bool),
    RouteInfo(Option<RouteInfo>),
    Pois(Option<Vec<Poi>>),
    Fleet(Vec<FleetEntry>),
    FleetUnavailable,
    Tracking(TrackingPhase),
    LiveLocation(bool),
}
