use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Backend identifier of a vehicle in the fleet.
///
/// The same identifier keys stored routes, POI lookups and live location ingest.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(u64);

impl VehicleId {
    /// Create a new [`VehicleId`] from the raw backend key.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for VehicleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::str::FromStr for VehicleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
