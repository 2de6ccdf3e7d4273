//! Component errors.

use sic_bus::BusError;
use sic_message::CodecError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComponentError {
    /// Construction or startup failed. `reason` is the original failure
    /// text.
    #[error("Component {name} failed to start: {reason}")]
    Start { name: String, reason: String },

    #[error("Component {name} did not become ready within {timeout:?}")]
    StartupTimeout { name: String, timeout: Duration },

    #[error("Invalid configuration for {name}: {reason}")]
    Conf { name: String, reason: String },

    /// A user message or request handler failed.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// A sensor capture or service computation failed.
    #[error("Execution failed: {0}")]
    Execute(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Component task failed: {0}")]
    Join(String),
}

impl ComponentError {
    /// Failure text reported to a remote starter.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            ComponentError::Start { reason, .. } | ComponentError::Conf { reason, .. } => {
                reason.clone()
            }
            other => other.to_string(),
        }
    }
}
