use crate::vehicle::VehicleId;

/// Indicates that a vehicle lookup failed because the fleet feed has not reported it.
#[derive(Debug, thiserror::Error)]
#[error("vehicle {vehicle_id} is not in the fleet feed")]
pub struct VehicleNotFound {
    pub vehicle_id: VehicleId,
}
