//! Physical plausibility checks for decoded snapshots.
//!
//! There is no locking protocol between the producer and this reader, so a read
//! can land in the middle of a producer write. Torn values and layout mismatches
//! both show up as impossible numbers; the validator throws those snapshots away
//! whole instead of clamping them.

use std::ops::RangeInclusive;

use tracing::trace;

use crate::types::{DEFAULT_MAX_RPM, TelemetrySnapshot};
use crate::{Result, TelemetryError};

/// Hard and soft ranges for decoded values.
#[derive(Debug, Clone)]
pub struct Validator {
    pub gear: RangeInclusive<i32>,
    pub rpm: RangeInclusive<f64>,
    pub speed_kmh: RangeInclusive<f64>,
    /// Soft range: values outside are replaced by `fallback_max_rpm`.
    pub max_rpm: RangeInclusive<f64>,
    pub fallback_max_rpm: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            gear: -1..=10,
            rpm: 0.0..=50_000.0,
            speed_kmh: 0.0..=500.0,
            max_rpm: 1000.0..=20_000.0,
            fallback_max_rpm: DEFAULT_MAX_RPM,
        }
    }
}

impl Validator {
    /// Validate a snapshot, substituting soft-range defaults.
    ///
    /// Fails with [`TelemetryError::NoData`] for a zero build version and with
    /// [`TelemetryError::Validation`] for the first hard-range violation.
    pub fn validate(&self, mut snapshot: TelemetrySnapshot) -> Result<TelemetrySnapshot> {
        if snapshot.build_version == 0 {
            return Err(TelemetryError::NoData);
        }

        if !self.max_rpm.contains(&snapshot.max_rpm) {
            trace!(max_rpm = snapshot.max_rpm, "Substituting default max RPM");
            snapshot.max_rpm = self.fallback_max_rpm;
        }

        if let Some((field, value)) =
            snapshot.float_channels().into_iter().find(|(_, value)| !value.is_finite())
        {
            return Err(TelemetryError::implausible(field, value));
        }

        if !self.gear.contains(&snapshot.gear) {
            return Err(TelemetryError::implausible("gear", snapshot.gear));
        }
        if !self.rpm.contains(&snapshot.rpm) {
            return Err(TelemetryError::implausible("rpm", snapshot.rpm));
        }
        if !self.speed_kmh.contains(&snapshot.speed_kmh) {
            return Err(TelemetryError::implausible("speed_kmh", snapshot.speed_kmh));
        }

        Ok(snapshot)
    }

    /// Like [`validate`](Self::validate) but discards the reason.
    pub fn accept(&self, snapshot: TelemetrySnapshot) -> Option<TelemetrySnapshot> {
        match self.validate(snapshot) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                trace!("Rejected snapshot: {}", e);
                None
            }
        }
    }
}
