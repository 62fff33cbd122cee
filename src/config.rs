//! Operating parameters for the acquisition core.
//!
//! [`TelemetryConfig::default`] carries the compiled-in constants; a host
//! application only builds a custom value to pick a different binder, point the
//! REST transport elsewhere, or tighten intervals in tests.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binder::BinderKind;
use crate::layout::SEGMENT_NAME_CANDIDATES;
use crate::{Result, TelemetryError};

/// Base URL of the producer's local REST service.
pub const DEFAULT_REST_BASE_URL: &str = "http://localhost:6397";

/// Configuration for transports, selector and driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Binder instantiated at startup.
    pub binder: BinderKind,
    /// Ordered segment name candidates.
    pub segment_names: Vec<String>,
    /// Directory searched by the Unix binder.
    pub shm_dir: PathBuf,
    /// Minimum time between bind attempts while disconnected.
    pub shm_retry_interval_ms: u64,
    /// Whether the REST fallback is attempted at all.
    pub enable_rest_fallback: bool,
    pub rest_base_url: String,
    /// Per-request timeout for REST endpoints.
    pub rest_timeout_ms: u64,
    /// Minimum time between REST connection probes while disconnected.
    pub rest_retry_interval_ms: u64,
    /// Minimum time between detection rounds while no transport is resolved.
    pub detection_interval_ms: u64,
    /// Driver poll cadence.
    pub poll_interval_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            binder: BinderKind::platform_default(),
            segment_names: SEGMENT_NAME_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            shm_dir: PathBuf::from("/dev/shm"),
            shm_retry_interval_ms: 2_000,
            enable_rest_fallback: true,
            rest_base_url: DEFAULT_REST_BASE_URL.to_string(),
            rest_timeout_ms: 3_000,
            rest_retry_interval_ms: 10_000,
            detection_interval_ms: 5_000,
            poll_interval_ms: 16,
        }
    }
}

impl TelemetryConfig {
    /// Parse a YAML document. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config(format!("YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the core cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.segment_names.is_empty() || self.segment_names.iter().any(|n| n.is_empty()) {
            return Err(TelemetryError::config("segment_names must list at least one name"));
        }
        if self.rest_timeout_ms == 0 {
            return Err(TelemetryError::config("rest_timeout_ms must be nonzero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(TelemetryError::config("poll_interval_ms must be nonzero"));
        }
        if !self.rest_base_url.starts_with("http://") && !self.rest_base_url.starts_with("https://")
        {
            return Err(TelemetryError::config(format!(
                "rest_base_url must be an http(s) URL, got '{}'",
                self.rest_base_url
            )));
        }
        Ok(())
    }

    pub fn shm_retry_interval(&self) -> Duration {
        Duration::from_millis(self.shm_retry_interval_ms)
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_millis(self.rest_timeout_ms)
    }

    pub fn rest_retry_interval(&self) -> Duration {
        Duration::from_millis(self.rest_retry_interval_ms)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
