//! Identity tokens attached to outstanding requests.
//!
//! Every request the controller issues carries the token of the selection or tracking session
//! that caused it. Results are applied only while that token is still current.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Identity of one live tracking session, from `start` until stop or arrival.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct TrackingSessionId(Arc<Uuid>);

impl TrackingSessionId {
    pub fn generate() -> Self {
        Self(Arc::new(Uuid::new_v4()))
    }
}

impl fmt::Debug for TrackingSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackingSessionId({})", self.0)
    }
}

impl fmt::Display for TrackingSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation counter of the origin/destination selection.
///
/// Bumped on every transition that changes the origin, the destination or clears the route.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SelectionEpoch(u64);

impl SelectionEpoch {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SelectionEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tag of an outstanding route request, used to route the response back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTicket {
    Selection(SelectionEpoch),
    Tracking(TrackingSessionId),
}
