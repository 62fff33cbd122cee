//! Core types for normalized telemetry.
//!
//! - [`TelemetrySnapshot`] is the one record the acquisition core hands out. It is
//!   built fresh on every poll and never mutated afterwards.
//! - [`Vec3`] carries the producer's local-frame velocity; [`Vec3::speed_kmh`] is the
//!   canonical speed derivation shared by both transports.
//! - [`TransportKind`] names the acquisition path that produced a snapshot.
//! - [`UpdateRate`] controls how often subscribers of a [`TelemetryFeed`](crate::TelemetryFeed)
//!   receive snapshots.

mod snapshot;
mod transport_kind;
mod update_rate;

pub use snapshot::{DEFAULT_MAX_RPM, MS_TO_KMH, TelemetrySnapshot, Vec3};
pub use transport_kind::TransportKind;
pub use update_rate::UpdateRate;
