//! Acquisition path identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which transport is currently serving telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum TransportKind {
    /// No transport resolved yet.
    #[default]
    None,
    /// Shared memory segment (primary).
    SharedMemory,
    /// Local REST service (fallback).
    RestApi,
}

impl TransportKind {
    /// Human-readable name for status displays.
    pub fn display_name(self) -> &'static str {
        match self {
            TransportKind::None => "None",
            TransportKind::SharedMemory => "Shared Memory",
            TransportKind::RestApi => "REST API",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
