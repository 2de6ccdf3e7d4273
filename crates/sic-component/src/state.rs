//! Component lifecycle states.

use serde_json::Value;
use std::fmt;

/// Lifecycle state of one component instance.
///
/// Transitions only move forward, in declaration order:
///
/// ```text
/// Created → ConnectingBus → Starting → Ready → Running → Stopping → Stopped
/// ```
///
/// A failed start jumps from `ConnectingBus` or `Starting` straight to
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentState {
    Created,
    ConnectingBus,
    Starting,
    Ready,
    Running,
    Stopping,
    Stopped,
}

impl ComponentState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentState::Created => "created",
            ComponentState::ConnectingBus => "connecting_bus",
            ComponentState::Starting => "starting",
            ComponentState::Ready => "ready",
            ComponentState::Running => "running",
            ComponentState::Stopping => "stopping",
            ComponentState::Stopped => "stopped",
        }
    }

    /// Whether the instance accepts control requests.
    #[must_use]
    pub fn is_serving(self) -> bool {
        matches!(self, ComponentState::Ready | ComponentState::Running)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == ComponentState::Stopped
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ComponentState> for Value {
    fn from(state: ComponentState) -> Self {
        Value::String(state.as_str().to_string())
    }
}
