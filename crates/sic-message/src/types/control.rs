//! Framework control messages.
//!
//! These are handled by the component runtime and the component manager
//! before any user code sees a request.

use crate::codec::{FieldReader, FieldWriter};
use crate::error::CodecError;
use crate::message::{Message, Payload};
use crate::{message_types, payload_fields};
use serde::{Deserialize, Serialize};
use sic_telemetry::LogLevel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping;
payload_fields!(Ping {});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pong;
payload_fields!(Pong {});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Success;
payload_fields!(Success {});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stop;
payload_fields!(Stop {});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ignored;
payload_fields!(Ignored {});

/// Ask a component to subscribe to another channel as input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connect {
    pub channel: String,
}
payload_fields!(Connect { channel });

/// Startup failure text reported by a component manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotStarted {
    pub message: String,
}
payload_fields!(NotStarted { message });

/// Ask a component manager to start an instance of a registered class.
#[derive(Debug, Clone)]
pub struct StartComponent {
    pub component_name: String,
    pub log_level: LogLevel,
    /// Configuration replacing the class default.
    pub conf: Option<Box<dyn Message>>,
}

impl StartComponent {
    #[must_use]
    pub fn new(component_name: impl Into<String>, log_level: LogLevel) -> Self {
        Self {
            component_name: component_name.into(),
            log_level,
            conf: None,
        }
    }

    #[must_use]
    pub fn with_conf(mut self, conf: Box<dyn Message>) -> Self {
        self.conf = Some(conf);
        self
    }
}

impl Payload for StartComponent {
    fn write_fields(&self, out: &mut FieldWriter) -> Result<(), CodecError> {
        out.plain("component_name", &self.component_name)?
            .plain("log_level", &self.log_level)?
            .nested_opt("conf", self.conf.as_deref())?;
        Ok(())
    }

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            component_name: fields.plain("component_name")?,
            log_level: fields.plain("log_level")?,
            conf: fields.nested_opt("conf")?,
        })
    }
}

message_types! {
    /// Liveness probe, answered with [`PongMessage`].
    pub PingRequest = Ping as ControlRequest;
    pub PongMessage = Pong as Control;
    /// Acknowledgement of a control request.
    pub SuccessMessage = Success as Control;
    pub StopRequest = Stop as ControlRequest;
    /// Reply that never satisfies a waiting caller.
    pub IgnoredMessage = Ignored as Control;
    pub ConnectRequest = Connect as ControlRequest;
    pub StartComponentRequest = StartComponent as ControlRequest;
    pub NotStartedMessage = NotStarted as Control;
}

impl ConnectRequest {
    #[must_use]
    pub fn to_channel(channel: impl Into<String>) -> Self {
        Self::new(Connect {
            channel: channel.into(),
        })
    }
}

impl NotStartedMessage {
    #[must_use]
    pub fn with_reason(message: impl Into<String>) -> Self {
        Self::new(NotStarted {
            message: message.into(),
        })
    }
}
