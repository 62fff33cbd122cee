//! Normalized telemetry record

use serde::{Deserialize, Serialize};

/// Metres per second to kilometres per hour.
pub const MS_TO_KMH: f64 = 3.6;

/// Rev limit substituted when the producer reports an implausible one.
pub const DEFAULT_MAX_RPM: f64 = 8000.0;

/// Three-component vector in the producer's local vehicle frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean magnitude.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Speed in km/h for a velocity given in m/s.
    ///
    /// This is the only speed derivation in the crate; both transports use it.
    pub fn speed_kmh(&self) -> f64 {
        self.magnitude() * MS_TO_KMH
    }
}

/// One immutable telemetry record.
///
/// A snapshot is either fully valid or not produced at all: decoders and
/// transports return `Option<TelemetrySnapshot>` and never hand out a record
/// that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TelemetrySnapshot {
    /// Nonzero when the producer published valid data this cycle.
    pub build_version: u32,
    /// Producer game mode, passed through opaquely.
    pub game_mode: i32,
    /// Producer race state, passed through opaquely.
    pub race_state: i32,
    /// -1 reverse, 0 neutral, 1.. forward.
    pub gear: i32,
    pub rpm: f64,
    pub max_rpm: f64,
    pub speed_kmh: f64,
    pub lap_number: i32,
    pub lap_time_sec: f64,
    pub last_lap_time_sec: f64,
    pub best_lap_time_sec: f64,
    /// Litres.
    pub fuel: f64,
    pub max_fuel: f64,
    pub brake: f64,
    pub throttle: f64,
    pub clutch: f64,
    pub steering: f64,
    /// Celsius.
    pub track_temp: f64,
    /// Celsius.
    pub ambient_temp: f64,
    pub track_name: String,
    pub car_name: String,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            build_version: 0,
            game_mode: 0,
            race_state: 0,
            gear: 0,
            rpm: 0.0,
            max_rpm: DEFAULT_MAX_RPM,
            speed_kmh: 0.0,
            lap_number: 0,
            lap_time_sec: 0.0,
            last_lap_time_sec: 0.0,
            best_lap_time_sec: 0.0,
            fuel: 0.0,
            max_fuel: 100.0,
            brake: 0.0,
            throttle: 0.0,
            clutch: 0.0,
            steering: 0.0,
            track_temp: 25.0,
            ambient_temp: 20.0,
            track_name: String::new(),
            car_name: String::new(),
        }
    }
}

impl TelemetrySnapshot {
    /// All floating point channels, named, for validation and diagnostics.
    pub fn float_channels(&self) -> [(&'static str, f64); 14] {
        [
            ("rpm", self.rpm),
            ("max_rpm", self.max_rpm),
            ("speed_kmh", self.speed_kmh),
            ("lap_time_sec", self.lap_time_sec),
            ("last_lap_time_sec", self.last_lap_time_sec),
            ("best_lap_time_sec", self.best_lap_time_sec),
            ("fuel", self.fuel),
            ("max_fuel", self.max_fuel),
            ("brake", self.brake),
            ("throttle", self.throttle),
            ("clutch", self.clutch),
            ("steering", self.steering),
            ("track_temp", self.track_temp),
            ("ambient_temp", self.ambient_temp),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_four_five_velocity_gives_180_kmh() {
        let v = Vec3::new(30.0, 0.0, 40.0);
        assert_eq!(v.magnitude(), 50.0);
        assert_eq!(v.speed_kmh(), 180.0);
    }

    #[test]
    fn snapshot_serializes_in_camel_case() {
        let snapshot = TelemetrySnapshot { gear: 3, ..Default::default() };
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["gear"], 3);
        assert_eq!(json["maxRpm"], DEFAULT_MAX_RPM);
        assert!(json.get("speedKmh").is_some());
    }
}
