//! Message envelope header.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Correlation id pairing a request with its reply.
///
/// Drawn from the random UUID space at construction, so callers on
/// different hosts never need a shared allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Id carried by replies that must never satisfy a waiting caller.
    pub const DETACHED: RequestId = RequestId(Uuid::nil());

    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.0.is_nil()
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Envelope fields shared by every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: Option<f64>,
    /// Name of the component that output the message.
    pub origin: Option<String>,
    /// Correlation id, set on requests and on their replies.
    pub request_id: Option<RequestId>,
}

/// Current wall-clock time in float seconds.
#[must_use]
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
