//! Message kinds.
//!
//! The kind travels in the wire header so receivers can filter requests
//! without knowing the concrete type. Each kind also has a zero-sized
//! marker used as the second parameter of [`Envelope`](crate::Envelope).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Regular data output by a component.
    Data,
    /// A user request that requires a reply.
    Request,
    /// Component configuration.
    Conf,
    /// Framework reply or notification.
    Control,
    /// Framework request handled by the runtime itself.
    ControlRequest,
}

impl MessageKind {
    #[must_use]
    pub fn is_request(self) -> bool {
        matches!(self, MessageKind::Request | MessageKind::ControlRequest)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Type-level message kind.
pub trait Kind: fmt::Debug + Clone + Copy + Default + Send + Sync + 'static {
    const KIND: MessageKind;
}

macro_rules! kind_marker {
    ($($(#[$doc:meta])* $marker:ident => $kind:ident;)*) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            pub struct $marker;

            impl Kind for $marker {
                const KIND: MessageKind = MessageKind::$kind;
            }
        )*
    };
}

kind_marker! {
    /// Marker for [`MessageKind::Data`].
    Data => Data;
    /// Marker for [`MessageKind::Request`].
    Request => Request;
    /// Marker for [`MessageKind::Conf`].
    Conf => Conf;
    /// Marker for [`MessageKind::Control`].
    Control => Control;
    /// Marker for [`MessageKind::ControlRequest`].
    ControlRequest => ControlRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_kinds() {
        assert!(MessageKind::Request.is_request());
        assert!(MessageKind::ControlRequest.is_request());
        assert!(!MessageKind::Data.is_request());
        assert!(!MessageKind::Conf.is_request());
        assert!(!MessageKind::Control.is_request());
    }

    #[test]
    fn test_markers() {
        assert_eq!(<Request as Kind>::KIND, MessageKind::Request);
        assert_eq!(<Conf as Kind>::KIND, MessageKind::Conf);
    }
}
