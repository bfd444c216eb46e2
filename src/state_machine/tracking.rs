//! Live tracking of the configured vehicle towards its stored destination.
//!
//! ```text
//! Stopped --Start--> Starting --destination loaded--> Running --within threshold--> Arrived
//!    ^                  |                                |
//!    +---setup error----+                                |
//!    +--------------------------Stop---------------------+
//! ```
//!
//! Arrival is strict: a sample exactly at the threshold distance is still en route.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::StateMachine;
use super::effect::{Effect, EffectQueue};
use crate::config::TrackingSettings;
use crate::error::ServiceError;
use crate::geo::{LatLon, format_distance};
use crate::geolocation::GeolocationError;
use crate::route::{Route, StoredRoute};
use crate::session::{RouteTicket, TrackingSessionId};
use crate::vehicle::VehicleId;
use crate::view::{RouteInfo, RouteLayer, Status, ViewUpdate};

/// Observable phase of the tracking loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    Stopped,
    Starting,
    Running,
    Arrived,
}

/// Reasons live tracking could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingStartError {
    #[error("Live tracking is already running.")]
    AlreadyRunning,

    #[error("Geolocation is not supported on this host.")]
    CapabilityAbsent,

    #[error("No vehicle is configured for live tracking.")]
    NoVehicleConfigured,

    #[error("No stored destination for vehicle {0}; set a destination first.")]
    NoStoredDestination(VehicleId),

    #[error("Could not load the stored destination: {0}")]
    Load(String),
}

#[derive(Debug)]
pub enum TrackingInput {
    /// `capability` tells whether the host can sample locations at all. `session` identifies
    /// the attempt if it goes ahead.
    Start {
        capability: bool,
        session: TrackingSessionId,
    },
    DestinationLoaded {
        session: TrackingSessionId,
        result: Result<Option<StoredRoute>, ServiceError>,
    },
    Tick {
        session: TrackingSessionId,
    },
    Sampled {
        session: TrackingSessionId,
        result: Result<LatLon, GeolocationError>,
    },
    /// The settling delay after a sample elapsed.
    Settled {
        session: TrackingSessionId,
        position: LatLon,
    },
    RouteFetched {
        session: TrackingSessionId,
        result: Result<Route, ServiceError>,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveSession {
    session: TrackingSessionId,
    vehicle_id: VehicleId,
    destination: LatLon,
    last_sample: Option<LatLon>,
    centered: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum LoopState {
    Stopped,
    Starting {
        session: TrackingSessionId,
        vehicle_id: VehicleId,
    },
    Running(ActiveSession),
    Arrived(ActiveSession),
}

#[derive(Debug)]
pub struct TrackingMachine {
    settings: TrackingSettings,
    state: LoopState,
    last_start_error: Option<TrackingStartError>,
    effects: EffectQueue,
}

impl TrackingMachine {
    pub fn new(settings: TrackingSettings) -> Self {
        Self {
            settings,
            state: LoopState::Stopped,
            last_start_error: None,
            effects: EffectQueue::new(),
        }
    }

    pub fn phase(&self) -> TrackingPhase {
        match self.state {
            LoopState::Stopped => TrackingPhase::Stopped,
            LoopState::Starting { .. } => TrackingPhase::Starting,
            LoopState::Running(_) => TrackingPhase::Running,
            LoopState::Arrived(_) => TrackingPhase::Arrived,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LoopState::Running(_))
    }

    pub fn session(&self) -> Option<&TrackingSessionId> {
        match &self.state {
            LoopState::Stopped => None,
            LoopState::Starting { session, .. } => Some(session),
            LoopState::Running(active) | LoopState::Arrived(active) => Some(&active.session),
        }
    }

    pub fn destination(&self) -> Option<LatLon> {
        match &self.state {
            LoopState::Running(active) | LoopState::Arrived(active) => Some(active.destination),
            _ => None,
        }
    }

    pub fn last_sample(&self) -> Option<LatLon> {
        match &self.state {
            LoopState::Running(active) | LoopState::Arrived(active) => active.last_sample,
            _ => None,
        }
    }

    /// Why the most recent start attempt failed, if it did.
    pub fn start_error(&self) -> Option<&TrackingStartError> {
        self.last_start_error.as_ref()
    }

    fn start(&mut self, capability: bool, session: TrackingSessionId) {
        if matches!(self.state, LoopState::Starting { .. } | LoopState::Running(_)) {
            // Rejected without touching the running session.
            self.effects
                .status(Status::error(TrackingStartError::AlreadyRunning.to_string()));
            self.last_start_error = Some(TrackingStartError::AlreadyRunning);
            return;
        }
        if !capability {
            return self.fail_start(TrackingStartError::CapabilityAbsent);
        }
        let Some(vehicle_id) = self.settings.vehicle else {
            return self.fail_start(TrackingStartError::NoVehicleConfigured);
        };

        info!(%session, %vehicle_id, "Starting live tracking");

        self.last_start_error = None;
        self.state = LoopState::Starting {
            session: session.clone(),
            vehicle_id,
        };
        self.effects
            .view(ViewUpdate::Tracking(TrackingPhase::Starting));
        self.effects
            .status(Status::info("Starting live tracking..."));
        self.effects.push(Effect::LoadTrackingDestination {
            session,
            vehicle_id,
        });
    }

    fn fail_start(&mut self, err: TrackingStartError) {
        warn!(error = %err, "Live tracking could not start");
        self.state = LoopState::Stopped;
        self.effects
            .view(ViewUpdate::Tracking(TrackingPhase::Stopped));
        self.effects.status(Status::error(err.to_string()));
        self.last_start_error = Some(err);
    }

    fn destination_loaded(
        &mut self,
        session: TrackingSessionId,
        result: Result<Option<StoredRoute>, ServiceError>,
    ) {
        let vehicle_id = match &self.state {
            LoopState::Starting {
                session: current,
                vehicle_id,
            } if *current == session => *vehicle_id,
            _ => {
                debug!(%session, "Discarding destination for an abandoned start");
                return;
            }
        };

        let destination = match result {
            Ok(stored) => stored.and_then(|stored| stored.destination),
            Err(err) => return self.fail_start(TrackingStartError::Load(err.to_string())),
        };
        let Some(destination) = destination else {
            return self.fail_start(TrackingStartError::NoStoredDestination(vehicle_id));
        };

        self.state = LoopState::Running(ActiveSession {
            session: session.clone(),
            vehicle_id,
            destination,
            last_sample: None,
            centered: false,
        });
        self.effects
            .view(ViewUpdate::Tracking(TrackingPhase::Running));
        self.effects
            .view(ViewUpdate::DestinationMarker(Some(destination)));
        self.effects.status(Status::info(format!(
            "Live tracking vehicle {vehicle_id} to {destination}."
        )));

        // One immediate tick, then the repeating schedule.
        self.effects.push(Effect::RequestSample {
            session: session.clone(),
        });
        self.effects.push(Effect::ScheduleTicks {
            session,
            period: self.settings.tick_period,
        });
    }

    fn tick(&mut self, session: TrackingSessionId) {
        if self.running_session(&session).is_none() {
            debug!(%session, "Ignoring tick of an inactive session");
            return;
        }
        self.effects.push(Effect::RequestSample { session });
    }

    fn sampled(&mut self, session: TrackingSessionId, result: Result<LatLon, GeolocationError>) {
        let Some(active) = self.running_session(&session) else {
            debug!(%session, "Discarding sample of an inactive session");
            return;
        };

        match result {
            Ok(position) => {
                active.last_sample = Some(position);
                let recenter = !active.centered;
                active.centered = true;

                self.effects
                    .view(ViewUpdate::PositionMarker(Some(position)));
                if recenter {
                    self.effects.view(ViewUpdate::Recenter(position));
                }
                self.effects.push(Effect::Settle { session, position });
            }
            Err(err) if err.is_fatal() => {
                warn!(error = %err, "Location capability lost, stopping live tracking");
                self.effects.push(Effect::CancelTicks);
                self.state = LoopState::Stopped;
                self.effects
                    .view(ViewUpdate::Tracking(TrackingPhase::Stopped));
                self.effects
                    .status(Status::error(format!("Live tracking stopped: {err}")));
            }
            Err(err) => {
                warn!(error = %err, "Location sample failed");
                self.effects.status(Status::error(format!(
                    "Unable to get current location: {err}"
                )));
            }
        }
    }

    fn settled(&mut self, session: TrackingSessionId, position: LatLon) {
        let threshold = self.settings.arrival_threshold_m;
        let Some(active) = self.running_session(&session) else {
            debug!(%session, "Discarding settled sample of an inactive session");
            return;
        };
        let destination = active.destination;
        let distance = position.distance_m(&destination);

        if distance < threshold {
            info!(%session, distance_m = distance, "Arrived at destination");
            let arrived = active.clone();
            self.state = LoopState::Arrived(arrived);
            self.effects.push(Effect::CancelTicks);
            self.effects
                .view(ViewUpdate::Tracking(TrackingPhase::Arrived));
            self.effects.status(Status::success(format!(
                "Arrived at destination ({} away).",
                format_distance(distance)
            )));
            return;
        }

        self.effects.status(Status::info(format!(
            "{} from destination. Updating route...",
            format_distance(distance)
        )));
        self.effects.push(Effect::FetchRoute {
            ticket: RouteTicket::Tracking(session),
            origin: position,
            destination,
        });
    }

    fn route_fetched(&mut self, session: TrackingSessionId, result: Result<Route, ServiceError>) {
        let Some(active) = self.running_session(&session) else {
            debug!(%session, "Discarding route of an inactive session");
            return;
        };
        let label = format!("Vehicle {}", active.vehicle_id);

        match result {
            Ok(route) if route.is_drawable() => {
                self.effects.view(ViewUpdate::DrawRoute {
                    layer: RouteLayer::Tracking,
                    points: route.points.clone(),
                });
                self.effects
                    .view(ViewUpdate::RouteInfo(Some(RouteInfo::new(&label, &route))));
                self.effects.status(Status::success(format!(
                    "{} to destination.",
                    route.stats_text()
                )));
            }
            Ok(_) => self.route_failed(&ServiceError::NoRoute),
            Err(err) => self.route_failed(&err),
        }
    }

    fn route_failed(&mut self, err: &ServiceError) {
        warn!(error = %err, "Tracking re-route failed, keeping the loop running");
        self.effects
            .status(Status::error(format!("Unable to update route: {err}")));
    }

    fn stop(&mut self) {
        match std::mem::replace(&mut self.state, LoopState::Stopped) {
            LoopState::Stopped => return,
            LoopState::Running(active) => {
                info!(session = %active.session, "Stopping live tracking");
                self.effects.push(Effect::CancelTicks);
            }
            LoopState::Starting { .. } | LoopState::Arrived(_) => {}
        }
        self.effects
            .view(ViewUpdate::Tracking(TrackingPhase::Stopped));
        self.effects.status(Status::muted("Live tracking stopped."));
    }

    fn running_session(&mut self, session: &TrackingSessionId) -> Option<&mut ActiveSession> {
        match &mut self.state {
            LoopState::Running(active) if active.session == *session => Some(active),
            _ => None,
        }
    }
}

impl StateMachine for TrackingMachine {
    type Input = TrackingInput;
    type Output = Effect;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            TrackingInput::Start {
                capability,
                session,
            } => self.start(capability, session),
            TrackingInput::DestinationLoaded { session, result } => {
                self.destination_loaded(session, result)
            }
            TrackingInput::Tick { session } => self.tick(session),
            TrackingInput::Sampled { session, result } => self.sampled(session, result),
            TrackingInput::Settled { session, position } => self.settled(session, position),
            TrackingInput::RouteFetched { session, result } => self.route_fetched(session, result),
            TrackingInput::Stop => self.stop(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.effects.pop()
    }
}
