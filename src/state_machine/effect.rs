use std::collections::VecDeque;
use std::time::Duration;

use crate::geo::LatLon;
use crate::route::RouteRecord;
use crate::session::{RouteTicket, SelectionEpoch, TrackingSessionId};
use crate::vehicle::VehicleId;
use crate::view::{Status, ViewUpdate};

/// Work decided by a machine and carried out by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    View(ViewUpdate),

    /// Look up the route stored for the newly selected origin.
    LoadStoredRoute {
        epoch: SelectionEpoch,
        vehicle_id: VehicleId,
    },
    FetchRoute {
        ticket: RouteTicket,
        origin: LatLon,
        destination: LatLon,
    },
    /// Fire-and-forget.
    SaveRoute(RouteRecord),
    /// Fire-and-forget.
    ClearStoredRoute(VehicleId),
    LoadPois {
        epoch: SelectionEpoch,
        vehicle_id: VehicleId,
    },

    LoadTrackingDestination {
        session: TrackingSessionId,
        vehicle_id: VehicleId,
    },
    /// Start the repeating tracking tick. At most one schedule exists at a time.
    ScheduleTicks {
        session: TrackingSessionId,
        period: Duration,
    },
    CancelTicks,
    RequestSample {
        session: TrackingSessionId,
    },
    /// Wait the settling delay, then report the sample back for the arrival check.
    Settle {
        session: TrackingSessionId,
        position: LatLon,
    },

    StartWatch,
    StopWatch,
    /// Fire-and-forget.
    PostLiveLocation {
        vehicle_id: VehicleId,
        position: LatLon,
    },
}

/// FIFO of pending [`Effect`]s owned by a machine.
#[derive(Debug, Default)]
pub struct EffectQueue {
    pending: VecDeque<Effect>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.pending.push_back(effect);
    }

    pub fn view(&mut self, update: ViewUpdate) {
        self.push(Effect::View(update));
    }

    pub fn status(&mut self, status: Status) {
        self.view(ViewUpdate::Status(status));
    }

    pub fn pop(&mut self) -> Option<Effect> {
        self.pending.pop_front()
    }

}
