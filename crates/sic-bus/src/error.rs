//! Bus errors.

use sic_message::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Error type returned by message and request handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A caller broke the request/reply contract.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// No matching reply arrived in time. The peer is unreachable or
    /// overloaded.
    #[error("{request} on {channel} timed out after {timeout:?}")]
    Timeout {
        request: &'static str,
        channel: String,
        timeout: Duration,
    },

    #[error("Broker connection closed")]
    ConnectionClosed,

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Handler failed: {0}")]
    Handler(HandlerError),

    #[error("Unexpected reply: expected {expected}, got {found}")]
    UnexpectedReply {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Subscription task failed: {0}")]
    Join(String),
}

impl BusError {
    /// Recover a bus error that travelled through a handler boundary.
    pub fn from_handler(err: HandlerError) -> Self {
        match err.downcast::<BusError>() {
            Ok(bus_err) => *bus_err,
            Err(other) => BusError::Handler(other),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_handler_unwraps_bus_errors() {
        let boxed: HandlerError = Box::new(BusError::ContractViolation("nested".into()));
        assert!(matches!(
            BusError::from_handler(boxed),
            BusError::ContractViolation(_)
        ));
    }

    #[test]
    fn test_from_handler_wraps_foreign_errors() {
        let boxed: HandlerError = "plain failure".into();
        let err = BusError::from_handler(boxed);
        assert!(matches!(err, BusError::Handler(_)));
        assert_eq!(err.to_string(), "Handler failed: plain failure");
    }
}
