//! Error types for telemetry acquisition.
//!
//! Every failure the acquisition core can observe maps onto one variant of
//! [`TelemetryError`]. The variants follow the four classes the core cares about:
//!
//! - **Unavailable**: the producer is not running or has not created its segment yet
//! - **Transient invalid data**: a bound segment with build version zero or
//!   physically implausible values (menus, loading screens, torn writes)
//! - **Binding faults**: the OS refused access or the mapping failed
//! - **Transport exhaustion**: neither shared memory nor the REST service answered
//!
//! None of these ever reach the consumer of [`TransportSelector`](crate::TransportSelector);
//! the selector absorbs them and reports `None` / `false` instead. They are public
//! so transports and binders can be driven directly.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use lmu_telemetry::TelemetryError;
//!
//! let error = TelemetryError::unavailable("$rFactor2SMMP_Telemetry$");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Shared memory segment '{name}' is not available")]
    Unavailable { name: String },

    #[error("REST service at {url} is not connected")]
    ServiceUnavailable { url: String },

    #[error("Producer has not published data (build version is zero)")]
    NoData,

    #[error("Implausible value for {field}: {value}")]
    Validation { field: &'static str, value: String },

    #[error("Failed to bind shared memory segment '{name}': {operation}")]
    Binding {
        name: String,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Read of {len} bytes at offset {offset:#x} is outside the mapped view")]
    Memory { offset: usize, len: usize },

    #[error("REST endpoint {endpoint} failed")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Unavailable { .. } => true,
            TelemetryError::ServiceUnavailable { .. } => true,
            TelemetryError::NoData => true,
            TelemetryError::Validation { .. } => true,
            TelemetryError::Binding { .. } => true,
            TelemetryError::Memory { .. } => false,
            TelemetryError::Http { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Config { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Whether the error is an expected, quiet condition (producer absent or idle)
    /// rather than a fault worth surfacing in logs.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            TelemetryError::Unavailable { .. }
                | TelemetryError::ServiceUnavailable { .. }
                | TelemetryError::NoData
                | TelemetryError::Validation { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Unavailable { .. } => vec![
                "Start Le Mans Ultimate or rFactor 2",
                "Enable the rFactor2SharedMemoryMapPlugin in the game settings",
                "Wait for the game to finish loading",
            ],
            TelemetryError::ServiceUnavailable { .. } => vec![
                "Start the game and load into a session",
                "Check that the REST service listens on localhost:6397",
            ],
            TelemetryError::NoData => vec![
                "Leave the menus and get into the car",
                "Wait for the session to finish loading",
            ],
            TelemetryError::Validation { .. } => vec![
                "Retry on the next poll; the producer may have been mid-write",
                "Check that the offset table matches the producer version",
            ],
            TelemetryError::Binding { .. } => vec![
                "Check permissions for the shared memory object",
                "Run the game and this application at the same privilege level",
                "Restart the game",
            ],
            TelemetryError::Memory { .. } => vec![
                "Verify the offset table stays inside the 32768-byte segment",
                "Update the layout for the current producer version",
            ],
            TelemetryError::Http { .. } => vec![
                "Ensure the game is running and in a session",
                "Check that the REST service listens on localhost:6397",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the REST timeout",
                "Check system performance",
                "Verify the game is responding",
            ],
            TelemetryError::Config { .. } => vec![
                "Review the telemetry configuration values",
                "Fall back to TelemetryConfig::default()",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Use the mock binder for cross-platform testing",
                "Select a binder supported on this platform",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify system resources availability",
            ],
        }
    }

    /// Helper constructor for a missing segment.
    pub fn unavailable(name: impl Into<String>) -> Self {
        TelemetryError::Unavailable { name: name.into() }
    }

    /// Helper constructor for a REST service that is not (or no longer) connected.
    pub fn service_unavailable(url: impl Into<String>) -> Self {
        TelemetryError::ServiceUnavailable { url: url.into() }
    }

    /// Helper constructor for binding faults.
    pub fn binding_failed(name: impl Into<String>, operation: impl Into<String>) -> Self {
        TelemetryError::Binding { name: name.into(), operation: operation.into(), source: None }
    }

    /// Helper constructor for binding faults with an underlying cause.
    pub fn binding_failed_with_source(
        name: impl Into<String>,
        operation: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Binding {
            name: name.into(),
            operation: operation.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for out-of-window reads.
    pub fn memory_access_error(offset: usize, len: usize) -> Self {
        TelemetryError::Memory { offset, len }
    }

    /// Helper constructor for validation failures.
    pub fn implausible(field: &'static str, value: impl std::fmt::Display) -> Self {
        TelemetryError::Validation { field, value: value.to_string() }
    }

    /// Helper constructor for REST failures. Timeouts are reported as
    /// [`TelemetryError::Timeout`] so callers can tell them apart.
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error, timeout: Duration) -> Self {
        if source.is_timeout() {
            TelemetryError::Timeout { duration: timeout }
        } else {
            TelemetryError::Http { endpoint: endpoint.into(), source }
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        TelemetryError::Config { details: details.into() }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}
