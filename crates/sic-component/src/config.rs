//! Runtime and fusion configuration.

use std::env;
use std::time::Duration;

/// Time a component class gets to reach `Ready` unless it overrides it.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Messages kept per input buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10;

/// Maximum timestamp distance, in seconds, between fused messages.
pub const DEFAULT_TOLERANCE_SECS: f64 = 0.5;

/// Upper bound on how long the fusion loop sleeps between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time without a fused tuple, while data arrives, before a warning.
pub const DEFAULT_STALL_WARNING: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    /// Capacity of each (type, origin) buffer.
    pub capacity: usize,
    /// Alignment tolerance in seconds, inclusive.
    pub tolerance: f64,
    pub poll_interval: Duration,
    pub stall_warning_after: Duration,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            tolerance: DEFAULT_TOLERANCE_SECS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stall_warning_after: DEFAULT_STALL_WARNING,
        }
    }
}

impl FusionConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIC_FUSION_BUFFER_CAPACITY`: messages per buffer (default: 10)
    /// - `SIC_FUSION_TOLERANCE_SECS`: alignment tolerance (default: 0.5)
    /// - `SIC_FUSION_POLL_MS`: poll interval in milliseconds (default: 100)
    /// - `SIC_FUSION_STALL_WARNING_MS`: stall warning delay (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env::var("SIC_FUSION_BUFFER_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.capacity),
            tolerance: env::var("SIC_FUSION_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tolerance),
            poll_interval: env::var("SIC_FUSION_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            stall_warning_after: env::var("SIC_FUSION_STALL_WARNING_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.stall_warning_after),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.capacity > 0
            && self.tolerance.is_finite()
            && self.tolerance >= 0.0
            && !self.poll_interval.is_zero()
    }
}
