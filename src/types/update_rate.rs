//! Update rate control for telemetry streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for subscribers of a telemetry feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every snapshot the driver publishes (one per poll)
    Native,

    /// Throttled to maximum Hz
    /// If the requested rate meets or exceeds the poll rate, Native is used
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the driver's poll interval
    pub fn normalize(self, poll_interval: Duration) -> Self {
        let source_hz = if poll_interval.is_zero() {
            f64::INFINITY
        } else {
            1.0 / poll_interval.as_secs_f64()
        };

        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if throttling is needed at all
    pub fn throttle_interval(self, poll_interval: Duration) -> Option<Duration> {
        match self.normalize(poll_interval) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
