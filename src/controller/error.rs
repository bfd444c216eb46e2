/// Indicates that a command could not be delivered because the controller has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("controller is no longer running")]
pub struct ControllerClosed;
