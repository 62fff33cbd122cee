//! Byte layout of the producer's telemetry segment.
//!
//! The rFactor 2 shared memory plugin (also used by Le Mans Ultimate) publishes a
//! fixed 32768-byte segment. All numeric fields are little-endian; widths vary per
//! field (gear and lap number are `i32`, everything physical is `f64`), so each
//! entry in [`VehicleOffsets`] is paired with a width in [`TelemetryLayout::fields`].
//!
//! Offsets moved several times across producer versions. They live in one
//! [`TelemetryLayout`] value so a correction is a new constant plus a fixture test,
//! never an edit scattered through the decoder.

use crate::{Result, TelemetryError};

/// Size of the producer's segment in bytes.
pub const SEGMENT_SIZE: usize = 32768;

/// Length of the fixed, null-terminated name windows (track, vehicle).
pub const NAME_FIELD_LEN: usize = 64;

/// Ordered list of segment names, most likely first.
///
/// Current plugin builds use the `$…$` convention; older builds created a
/// backslash-namespaced mapping instead.
pub const SEGMENT_NAME_CANDIDATES: [&str; 3] =
    ["$rFactor2SMMP_Telemetry$", "Local\\rFactor2SMMPData", "Global\\rFactor2SMMPData"];

/// Width of a field inside the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U32,
    I32,
    F64,
    /// Three consecutive `f64` values.
    Vec3,
    /// Fixed-length, null-terminated UTF-8 window.
    Name,
}

impl FieldWidth {
    /// Size of the field in bytes.
    pub const fn size(self) -> usize {
        match self {
            FieldWidth::U32 | FieldWidth::I32 => 4,
            FieldWidth::F64 => 8,
            FieldWidth::Vec3 => 24,
            FieldWidth::Name => NAME_FIELD_LEN,
        }
    }
}

/// Offsets inside the per-vehicle block, relative to its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VehicleOffsets {
    pub elapsed_time: usize,
    pub lap_number: usize,
    pub lap_start_time: usize,
    pub vehicle_name: usize,
    pub track_name: usize,
    pub local_velocity: usize,
    pub gear: usize,
    pub engine_rpm: usize,
    pub unfiltered_throttle: usize,
    pub unfiltered_brake: usize,
    pub unfiltered_steering: usize,
    pub unfiltered_clutch: usize,
    pub fuel: usize,
    pub engine_max_rpm: usize,
}

/// Complete offset table for one producer layout revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryLayout {
    /// Revision of this table, bumped whenever an offset changes.
    pub revision: u32,
    /// Build version / liveness counter (`u32`).
    pub build_version: usize,
    /// Producer game mode (`i32`, opaque).
    pub game_mode: usize,
    /// Producer race state (`i32`, opaque).
    pub race_state: usize,
    /// Start of the player vehicle block.
    pub vehicle_base: usize,
    pub vehicle: VehicleOffsets,
}

/// rFactor 2 shared memory map plugin, `VehicleTelemetry` packed to 4 bytes.
pub const RF2_SMMP_V1: TelemetryLayout = TelemetryLayout {
    revision: 1,
    build_version: 0x00,
    game_mode: 0x04,
    race_state: 0x08,
    vehicle_base: 0x10,
    vehicle: VehicleOffsets {
        elapsed_time: 0x0C,
        lap_number: 0x14,
        lap_start_time: 0x18,
        vehicle_name: 0x20,
        track_name: 0x60,
        local_velocity: 0xB8,
        gear: 0x160,
        engine_rpm: 0x164,
        unfiltered_throttle: 0x184,
        unfiltered_brake: 0x18C,
        unfiltered_steering: 0x194,
        unfiltered_clutch: 0x19C,
        fuel: 0x20C,
        engine_max_rpm: 0x214,
    },
};

impl Default for TelemetryLayout {
    fn default() -> Self {
        RF2_SMMP_V1
    }
}

impl TelemetryLayout {
    /// Absolute offset of a vehicle-relative field.
    pub const fn vehicle_field(&self, relative: usize) -> usize {
        self.vehicle_base + relative
    }

    /// Every field as `(name, absolute offset, width)`.
    pub fn fields(&self) -> [(&'static str, usize, FieldWidth); 17] {
        let v = &self.vehicle;
        [
            ("build_version", self.build_version, FieldWidth::U32),
            ("game_mode", self.game_mode, FieldWidth::I32),
            ("race_state", self.race_state, FieldWidth::I32),
            ("elapsed_time", self.vehicle_field(v.elapsed_time), FieldWidth::F64),
            ("lap_number", self.vehicle_field(v.lap_number), FieldWidth::I32),
            ("lap_start_time", self.vehicle_field(v.lap_start_time), FieldWidth::F64),
            ("vehicle_name", self.vehicle_field(v.vehicle_name), FieldWidth::Name),
            ("track_name", self.vehicle_field(v.track_name), FieldWidth::Name),
            ("local_velocity", self.vehicle_field(v.local_velocity), FieldWidth::Vec3),
            ("gear", self.vehicle_field(v.gear), FieldWidth::I32),
            ("engine_rpm", self.vehicle_field(v.engine_rpm), FieldWidth::F64),
            ("unfiltered_throttle", self.vehicle_field(v.unfiltered_throttle), FieldWidth::F64),
            ("unfiltered_brake", self.vehicle_field(v.unfiltered_brake), FieldWidth::F64),
            ("unfiltered_steering", self.vehicle_field(v.unfiltered_steering), FieldWidth::F64),
            ("unfiltered_clutch", self.vehicle_field(v.unfiltered_clutch), FieldWidth::F64),
            ("fuel", self.vehicle_field(v.fuel), FieldWidth::F64),
            ("engine_max_rpm", self.vehicle_field(v.engine_max_rpm), FieldWidth::F64),
        ]
    }

    /// Number of bytes a buffer must hold for every field to be readable.
    pub fn required_len(&self) -> usize {
        self.fields().iter().map(|(_, offset, width)| offset + width.size()).max().unwrap_or(0)
    }

    /// Check that the table fits the segment and that no two fields overlap.
    pub fn check(&self) -> Result<()> {
        if self.required_len() > SEGMENT_SIZE {
            return Err(TelemetryError::memory_access_error(0, self.required_len()));
        }

        let mut spans: Vec<(usize, usize, &'static str)> = self
            .fields()
            .iter()
            .map(|(name, offset, width)| (*offset, offset + width.size(), *name))
            .collect();
        spans.sort_unstable();

        for pair in spans.windows(2) {
            if let [(_, end, first), (start, _, second)] = pair {
                if end > start {
                    return Err(TelemetryError::config(format!(
                        "layout revision {} overlaps {} and {}",
                        self.revision, first, second
                    )));
                }
            }
        }
        Ok(())
    }
}
