//! Manager and connector errors.

use sic_bus::BusError;
use sic_message::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Component class {0} registered twice")]
    DuplicateClass(&'static str),

    #[error(transparent)]
    Bus(#[from] BusError),
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The manager tried and failed to start the component. `reason` is the
    /// original failure text.
    #[error("Component {name} did not start: {reason}")]
    NotStarted { name: String, reason: String },

    /// Neither the component nor a manager on its host answered.
    #[error("Could not reach {name} on {ip}, is a component manager running there?")]
    Unreachable { name: String, ip: String },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
