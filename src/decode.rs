//! Struct decoder for the producer's telemetry segment.
//!
//! Turns a raw byte window into a [`TelemetrySnapshot`] using a
//! [`TelemetryLayout`]. The decoder never judges plausibility; that is the
//! [`Validator`](crate::Validator)'s job. It only refuses to decode when the
//! build version at offset zero says the producer has not published anything.

use crate::layout::{NAME_FIELD_LEN, TelemetryLayout};
use crate::types::{TelemetrySnapshot, Vec3};
use crate::{Result, TelemetryError};

/// Decodes segment bytes according to one layout revision.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    layout: TelemetryLayout,
}

impl Decoder {
    pub fn new(layout: TelemetryLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &TelemetryLayout {
        &self.layout
    }

    /// Read only the liveness counter.
    pub fn build_version(&self, buf: &[u8]) -> Result<u32> {
        read_u32(buf, self.layout.build_version)
    }

    /// Decode a snapshot.
    ///
    /// Returns `Ok(None)` when the build version is zero, without looking at any
    /// other byte. Returns [`TelemetryError::Memory`] when `buf` is too short for
    /// the layout.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<TelemetrySnapshot>> {
        let build_version = self.build_version(buf)?;
        if build_version == 0 {
            return Ok(None);
        }

        let required = self.layout.required_len();
        if buf.len() < required {
            return Err(TelemetryError::memory_access_error(0, required));
        }

        let l = &self.layout;
        let v = &l.vehicle;
        let at = |relative: usize| l.vehicle_field(relative);

        let elapsed = read_f64(buf, at(v.elapsed_time))?;
        let lap_start = read_f64(buf, at(v.lap_start_time))?;
        let lap_time = elapsed - lap_start;
        let velocity = read_vec3(buf, at(v.local_velocity))?;

        Ok(Some(TelemetrySnapshot {
            build_version,
            game_mode: read_i32(buf, l.game_mode)?,
            race_state: read_i32(buf, l.race_state)?,
            gear: read_i32(buf, at(v.gear))?,
            rpm: read_f64(buf, at(v.engine_rpm))?,
            max_rpm: read_f64(buf, at(v.engine_max_rpm))?,
            speed_kmh: velocity.speed_kmh(),
            lap_number: read_i32(buf, at(v.lap_number))?,
            // NaN must reach the validator, so only finite values are floored.
            lap_time_sec: if lap_time.is_finite() { lap_time.max(0.0) } else { lap_time },
            fuel: read_f64(buf, at(v.fuel))?,
            brake: read_f64(buf, at(v.unfiltered_brake))?,
            throttle: read_f64(buf, at(v.unfiltered_throttle))?,
            clutch: read_f64(buf, at(v.unfiltered_clutch))?,
            steering: read_f64(buf, at(v.unfiltered_steering))?,
            track_name: read_name(buf, at(v.track_name))?,
            car_name: read_name(buf, at(v.vehicle_name))?,
            ..TelemetrySnapshot::default()
        }))
    }
}

fn window<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N]> {
    buf.get(offset..offset + N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or(TelemetryError::Memory { offset, len: N })
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Result<u32> {
    Ok(u32::from_le_bytes(window(buf, offset)?))
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32> {
    Ok(i32::from_le_bytes(window(buf, offset)?))
}

fn read_f64(buf: &[u8], offset: usize) -> Result<f64> {
    Ok(f64::from_le_bytes(window(buf, offset)?))
}

fn read_vec3(buf: &[u8], offset: usize) -> Result<Vec3> {
    Ok(Vec3::new(read_f64(buf, offset)?, read_f64(buf, offset + 8)?, read_f64(buf, offset + 16)?))
}

/// Null-terminated UTF-8 window, trimmed.
fn read_name(buf: &[u8], offset: usize) -> Result<String> {
    let bytes = buf
        .get(offset..offset + NAME_FIELD_LEN)
        .ok_or(TelemetryError::Memory { offset, len: NAME_FIELD_LEN })?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(String::from_utf8_lossy(&bytes[..end]).trim().to_string())
}
