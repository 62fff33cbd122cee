//! Test utilities for building producer segments byte by byte
//!
//! [`SegmentFixture`] writes values at the offsets of a [`TelemetryLayout`] so
//! decoder, transport and selector tests all exercise the same byte image a live
//! producer would publish.

#![cfg(any(test, feature = "benchmark"))]

use crate::layout::{NAME_FIELD_LEN, RF2_SMMP_V1, SEGMENT_SIZE, TelemetryLayout};

/// Builder for a full 32768-byte segment image.
#[derive(Debug, Clone)]
pub struct SegmentFixture {
    layout: TelemetryLayout,
    bytes: Vec<u8>,
}

impl SegmentFixture {
    /// All-zero segment: producer running but not simulating.
    pub fn empty() -> Self {
        Self { layout: RF2_SMMP_V1, bytes: vec![0; SEGMENT_SIZE] }
    }

    /// A car on track in fourth gear at exactly 180 km/h.
    pub fn driving() -> Self {
        Self::empty()
            .build_version(1125)
            .game_mode(2)
            .race_state(5)
            .gear(4)
            .rpm(7250.5)
            .max_rpm(9000.0)
            .velocity(30.0, 0.0, 40.0)
            .lap_number(3)
            .lap_times(142.25, 100.0)
            .fuel(61.5)
            .inputs(0.75, 0.125, 0.0, -0.25)
            .track_name("Circuit de la Sarthe")
            .car_name("Porsche 963")
    }

    fn put(mut self, offset: usize, value: &[u8]) -> Self {
        self.bytes[offset..offset + value.len()].copy_from_slice(value);
        self
    }

    fn put_vehicle_f64(self, relative: usize, value: f64) -> Self {
        let offset = self.layout.vehicle_field(relative);
        self.put(offset, &value.to_le_bytes())
    }

    pub fn build_version(self, version: u32) -> Self {
        let offset = self.layout.build_version;
        self.put(offset, &version.to_le_bytes())
    }

    pub fn game_mode(self, mode: i32) -> Self {
        let offset = self.layout.game_mode;
        self.put(offset, &mode.to_le_bytes())
    }

    pub fn race_state(self, state: i32) -> Self {
        let offset = self.layout.race_state;
        self.put(offset, &state.to_le_bytes())
    }

    pub fn gear(self, gear: i32) -> Self {
        let offset = self.layout.vehicle_field(self.layout.vehicle.gear);
        self.put(offset, &gear.to_le_bytes())
    }

    pub fn lap_number(self, lap: i32) -> Self {
        let offset = self.layout.vehicle_field(self.layout.vehicle.lap_number);
        self.put(offset, &lap.to_le_bytes())
    }

    pub fn rpm(self, rpm: f64) -> Self {
        let relative = self.layout.vehicle.engine_rpm;
        self.put_vehicle_f64(relative, rpm)
    }

    pub fn max_rpm(self, max_rpm: f64) -> Self {
        let relative = self.layout.vehicle.engine_max_rpm;
        self.put_vehicle_f64(relative, max_rpm)
    }

    pub fn fuel(self, fuel: f64) -> Self {
        let relative = self.layout.vehicle.fuel;
        self.put_vehicle_f64(relative, fuel)
    }

    /// Local-frame velocity in m/s.
    pub fn velocity(self, x: f64, y: f64, z: f64) -> Self {
        let relative = self.layout.vehicle.local_velocity;
        self.put_vehicle_f64(relative, x)
            .put_vehicle_f64(relative + 8, y)
            .put_vehicle_f64(relative + 16, z)
    }

    /// Session elapsed time and the time the current lap started.
    pub fn lap_times(self, elapsed: f64, lap_start: f64) -> Self {
        let v = self.layout.vehicle;
        self.put_vehicle_f64(v.elapsed_time, elapsed).put_vehicle_f64(v.lap_start_time, lap_start)
    }

    pub fn inputs(self, throttle: f64, brake: f64, clutch: f64, steering: f64) -> Self {
        let v = self.layout.vehicle;
        self.put_vehicle_f64(v.unfiltered_throttle, throttle)
            .put_vehicle_f64(v.unfiltered_brake, brake)
            .put_vehicle_f64(v.unfiltered_clutch, clutch)
            .put_vehicle_f64(v.unfiltered_steering, steering)
    }

    pub fn track_name(self, name: &str) -> Self {
        let offset = self.layout.vehicle_field(self.layout.vehicle.track_name);
        self.put_name(offset, name)
    }

    pub fn car_name(self, name: &str) -> Self {
        let offset = self.layout.vehicle_field(self.layout.vehicle.vehicle_name);
        self.put_name(offset, name)
    }

    fn put_name(self, offset: usize, name: &str) -> Self {
        let mut window = [0u8; NAME_FIELD_LEN];
        let len = name.len().min(NAME_FIELD_LEN);
        window[..len].copy_from_slice(&name.as_bytes()[..len]);
        self.put(offset, &window)
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}
