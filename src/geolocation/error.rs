use std::time::Duration;

use thiserror::Error;

/// Failures of a location sample or watch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    /// The host offers no location capability at all. Never retried.
    #[error("geolocation is not supported on this host")]
    CapabilityAbsent,

    /// No sample arrived before the timeout.
    #[error("timed out after {0:?} waiting for a location sample")]
    Timeout(Duration),

    /// Only a sample older than the allowed maximum age was available.
    #[error("latest location sample is {age:?} old")]
    Stale { age: Duration },

    /// The underlying location feed has shut down.
    #[error("location feed closed")]
    Closed,
}

impl GeolocationError {
    /// Whether the failure should end the operation that requested the sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CapabilityAbsent)
    }
}
