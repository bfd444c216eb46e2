use tracing::{debug, info, warn};

use super::StateMachine;
use super::effect::{Effect, EffectQueue};
use crate::geo::LatLon;
use crate::geolocation::GeolocationError;
use crate::vehicle::VehicleId;
use crate::view::{Status, ViewUpdate};

/// Follows the host's own location continuously and forwards each fix to the ingest endpoint.
///
/// Independent from live tracking: it never routes and never checks arrival.
#[derive(Debug)]
pub struct LiveLocationMachine {
    vehicle: Option<VehicleId>,
    watching: bool,
    centered: bool,
    latest: Option<LatLon>,
    effects: EffectQueue,
}

#[derive(Debug)]
pub enum LiveLocationInput {
    Toggle { capability: bool },
    Fix(Result<LatLon, GeolocationError>),
}

impl LiveLocationMachine {
    /// Fixes are posted on behalf of `vehicle` when one is configured.
    pub fn new(vehicle: Option<VehicleId>) -> Self {
        Self {
            vehicle,
            watching: false,
            centered: false,
            latest: None,
            effects: EffectQueue::new(),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn latest(&self) -> Option<LatLon> {
        self.latest
    }

    fn toggle(&mut self, capability: bool) {
        if self.watching {
            info!("Stopping live location");
            return self.stop(Status::muted("Live location stopped."));
        }
        if !capability {
            self.effects
                .status(Status::error("Geolocation is not supported on this host."));
            return;
        }

        info!(vehicle = ?self.vehicle, "Starting live location");
        self.watching = true;
        self.centered = false;
        self.effects.push(Effect::StartWatch);
        self.effects.view(ViewUpdate::LiveLocation(true));
        self.effects
            .status(Status::info("Waiting for your location..."));
    }

    fn fix(&mut self, result: Result<LatLon, GeolocationError>) {
        if !self.watching {
            debug!("Dropping fix received after the watch stopped");
            return;
        }

        let position = match result {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "Live location watch failed");
                return self.stop(Status::error("Unable to access your location."));
            }
        };

        self.latest = Some(position);
        self.effects
            .view(ViewUpdate::LiveMarker(Some(position)));
        if !self.centered {
            self.centered = true;
            self.effects.view(ViewUpdate::Recenter(position));
        }
        self.effects
            .status(Status::success(format!("Your location: {position}")));

        if let Some(vehicle_id) = self.vehicle {
            self.effects.push(Effect::PostLiveLocation {
                vehicle_id,
                position,
            });
        }
    }

    fn stop(&mut self, status: Status) {
        self.watching = false;
        self.latest = None;
        self.effects.push(Effect::StopWatch);
        self.effects.view(ViewUpdate::LiveMarker(None));
        self.effects.view(ViewUpdate::LiveLocation(false));
        self.effects.status(status);
    }
}

impl StateMachine for LiveLocationMachine {
    type Input = LiveLocationInput;
    type Output = Effect;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            LiveLocationInput::Toggle { capability } => self.toggle(capability),
            LiveLocationInput::Fix(result) => self.fix(result),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.effects.pop()
    }
}
