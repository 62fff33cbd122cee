//! Resilient telemetry acquisition for Le Mans Ultimate and rFactor 2.
//!
//! The producer exports vehicle telemetry through a named shared memory segment
//! and, as a fallback, a local REST service. This crate binds to whichever is
//! available, decodes and validates the data, and hands out immutable
//! [`TelemetrySnapshot`]s.
//!
//! # Architecture
//!
//! ```text
//! SegmentBinder -> bytes -> Decoder -> Validator -> SharedMemoryTransport --+
//!                                                                          +-> TransportSelector -> Driver -> TelemetryFeed
//!                    local REST service -> RestTransport -------------------+
//! ```
//!
//! - **Binder**: opens the producer's segment read-only ([`binder`]).
//! - **Decoder**: reads fixed offsets from a [`TelemetryLayout`] ([`decode`]).
//! - **Validator**: rejects physically implausible snapshots ([`validate`]).
//! - **Selector**: prefers shared memory, falls back to REST, re-detects on loss.
//!
//! # Quick Start
//!
//! Polling the selector directly:
//!
//! ```rust,no_run
//! use lmu_telemetry::{TelemetryConfig, TransportSelector};
//!
//! # #[tokio::main]
//! # async fn main() -> lmu_telemetry::Result<()> {
//! let mut selector = TransportSelector::from_config(&TelemetryConfig::default())?;
//! loop {
//!     if let Some(snapshot) = selector.read_telemetry().await {
//!         println!("gear {} at {:.0} rpm", snapshot.gear, snapshot.rpm);
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! }
//! # }
//! ```
//!
//! Or let a [`TelemetryFeed`] poll on a background task and subscribe to it.

pub mod binder;
pub mod config;
pub mod decode;
pub mod driver;
mod error;
pub mod feed;
pub mod layout;
pub mod selector;
pub mod stream;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transport;
pub mod transports;
pub mod types;
pub mod validate;

pub use binder::{AccessMode, BinderKind, BoundSegment, MockBinder, SegmentBinder};
pub use config::TelemetryConfig;
pub use decode::Decoder;
pub use error::*;
pub use feed::TelemetryFeed;
pub use layout::{RF2_SMMP_V1, SEGMENT_NAME_CANDIDATES, SEGMENT_SIZE, TelemetryLayout};
pub use selector::{SelectorState, TransportSelector};
pub use transport::{RetryTimer, Transport};
pub use transports::{RestTransport, SharedMemoryTransport};
pub use types::*;
pub use validate::Validator;

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Defaults to `lmu_telemetry=info` when `RUST_LOG` is unset or invalid. Does
/// nothing if a global subscriber is already installed, so hosts that set up
/// their own tracing can ignore it.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lmu_telemetry=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
