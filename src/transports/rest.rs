//! REST transport (fallback path)
//!
//! Polls the producer's local HTTP service. Each read fetches four endpoints
//! concurrently, each bounded by the client timeout, and reassembles them into
//! one [`TelemetrySnapshot`]. An endpoint that times out, refuses the
//! connection or answers with something other than JSON only leaves its
//! sub-fields at their defaults.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, info, trace, warn};

use crate::config::TelemetryConfig;
use crate::transport::{RetryTimer, Transport};
use crate::types::{DEFAULT_MAX_RPM, TelemetrySnapshot, TransportKind, Vec3};
use crate::validate::Validator;
use crate::{Result, TelemetryError};

/// Vehicle list. The player's car is the first entry.
pub const STANDINGS_PATH: &str = "/rest/watch/standings";
pub const GAME_STATE_PATH: &str = "/rest/sessions/GetGameState";
pub const SESSION_INFO_PATH: &str = "/rest/watch/sessionInfo";
pub const PITSTOP_ESTIMATE_PATH: &str = "/rest/strategy/pitstop-estimate";

/// REST payloads carry no build counter; a fetched snapshot is always live.
const REST_BUILD_VERSION: u32 = 1;
/// `raceState` reported while the player is driving a stint (green flag).
const RACE_STATE_GREEN: i32 = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct VehicleStanding {
    car_velocity: Option<Vec3>,
    engine_rotation: Option<f64>,
    rpm: Option<f64>,
    engine_max_rotation: Option<f64>,
    gear: Option<f64>,
    lap_number: Option<f64>,
    current_lap_time: Option<f64>,
    last_lap_time: Option<f64>,
    best_lap_time: Option<f64>,
    fuel: Option<f64>,
    max_fuel: Option<f64>,
    brake: Option<f64>,
    throttle: Option<f64>,
    clutch: Option<f64>,
    steering: Option<f64>,
    car_class: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GameState {
    game_phase: Option<f64>,
    #[serde(rename = "MultiStintState")]
    multi_stint_state: Option<String>,
    in_control_of_vehicle: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SessionInfo {
    track_name: Option<String>,
    track_temp: Option<f64>,
    ambient_temp: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PitstopEstimate {
    fuel: Option<f64>,
}

/// Producer values of zero mean "not reported".
fn reported(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}

fn reported_str(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Secondary transport over the producer's HTTP service.
pub struct RestTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
    validator: Validator,
    connected: bool,
    retry: RetryTimer,
}

impl RestTransport {
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let timeout = config.rest_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lmu-telemetry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TelemetryError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.rest_base_url.trim_end_matches('/').to_string(),
            timeout,
            validator: Validator::default(),
            connected: false,
            retry: RetryTimer::new(config.rest_retry_interval()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a retry deadline is pending.
    pub fn retry_pending(&self) -> bool {
        self.retry.is_armed()
    }

    /// GET one endpoint.
    ///
    /// `Ok(None)` for an empty body or a body that does not parse as `T`;
    /// `Err` when the request itself failed.
    async fn fetch<T: DeserializeOwned>(&self, path: &'static str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TelemetryError::http(path, e, self.timeout))?;

        let body = response.bytes().await.map_err(|e| TelemetryError::http(path, e, self.timeout))?;
        if body.is_empty() {
            return Ok(None);
        }

        match serde_json::from_slice(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                trace!(endpoint = path, "Ignoring unparseable response: {}", e);
                Ok(None)
            }
        }
    }

    fn lose_connection(&mut self) {
        self.connected = false;
        self.retry.arm();
    }
}

/// Unwrap one concurrent fetch, recording its failure.
fn settle<T>(
    path: &'static str,
    result: Result<Option<T>>,
    failures: &mut Vec<TelemetryError>,
) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            debug!(endpoint = path, "REST endpoint unavailable: {}", e);
            failures.push(e);
            None
        }
    }
}

/// Merge the four sub-responses into one snapshot. Absent fields take defaults.
fn assemble(
    player: VehicleStanding,
    game_state: &GameState,
    session: SessionInfo,
    pitstop: Option<PitstopEstimate>,
) -> TelemetrySnapshot {
    let defaults = TelemetrySnapshot::default();
    let velocity = player.car_velocity.unwrap_or_default();
    let fuel = reported(player.fuel).or_else(|| pitstop.and_then(|p| reported(p.fuel)));

    TelemetrySnapshot {
        build_version: REST_BUILD_VERSION,
        game_mode: reported(game_state.game_phase).map_or(0, |v| v as i32),
        race_state: if game_state.multi_stint_state.as_deref() == Some("DRIVING") {
            RACE_STATE_GREEN
        } else {
            0
        },
        gear: player.gear.map_or(0, |v| v as i32),
        rpm: reported(player.engine_rotation).or(player.rpm).unwrap_or(0.0),
        max_rpm: reported(player.engine_max_rotation).unwrap_or(DEFAULT_MAX_RPM),
        speed_kmh: velocity.speed_kmh(),
        lap_number: player.lap_number.map_or(0, |v| v as i32),
        lap_time_sec: player.current_lap_time.unwrap_or(0.0),
        last_lap_time_sec: player.last_lap_time.unwrap_or(0.0),
        best_lap_time_sec: player.best_lap_time.unwrap_or(0.0),
        fuel: fuel.unwrap_or(0.0),
        max_fuel: reported(player.max_fuel).unwrap_or(defaults.max_fuel),
        brake: player.brake.unwrap_or(0.0),
        throttle: player.throttle.unwrap_or(0.0),
        clutch: player.clutch.unwrap_or(0.0),
        steering: player.steering.unwrap_or(0.0),
        track_temp: reported(session.track_temp).unwrap_or(defaults.track_temp),
        ambient_temp: reported(session.ambient_temp).unwrap_or(defaults.ambient_temp),
        track_name: reported_str(session.track_name).unwrap_or_default(),
        car_name: reported_str(player.car_class).unwrap_or_default(),
    }
}

#[async_trait::async_trait]
impl Transport for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::RestApi
    }

    /// Probe the standings endpoint; a non-empty vehicle list means the
    /// producer is in a session.
    async fn connect(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        if !self.retry.is_due() {
            return Err(TelemetryError::service_unavailable(&self.base_url));
        }

        match self.fetch::<Vec<IgnoredAny>>(STANDINGS_PATH).await {
            Ok(Some(vehicles)) if !vehicles.is_empty() => {
                info!(base_url = %self.base_url, vehicles = vehicles.len(), "Connected to REST API");
                self.connected = true;
                self.retry.cancel();
                Ok(())
            }
            Ok(_) => {
                debug!("REST API reachable but no vehicles in standings");
                self.lose_connection();
                Err(TelemetryError::NoData)
            }
            Err(e) => {
                debug!("REST API not reachable: {}", e);
                self.lose_connection();
                Err(e)
            }
        }
    }

    async fn read(&mut self) -> Result<Option<TelemetrySnapshot>> {
        if !self.connected {
            return Err(TelemetryError::service_unavailable(&self.base_url));
        }

        let (standings, game_state, session, pitstop) = tokio::join!(
            self.fetch::<Vec<VehicleStanding>>(STANDINGS_PATH),
            self.fetch::<GameState>(GAME_STATE_PATH),
            self.fetch::<SessionInfo>(SESSION_INFO_PATH),
            self.fetch::<PitstopEstimate>(PITSTOP_ESTIMATE_PATH),
        );

        let mut failures = Vec::new();
        let standings = settle(STANDINGS_PATH, standings, &mut failures);
        let game_state = settle(GAME_STATE_PATH, game_state, &mut failures).unwrap_or_default();
        let session = settle(SESSION_INFO_PATH, session, &mut failures).unwrap_or_default();
        let pitstop = settle(PITSTOP_ESTIMATE_PATH, pitstop, &mut failures);

        if failures.len() == 4 {
            warn!(base_url = %self.base_url, "All REST endpoints failed, connection lost");
            self.lose_connection();
            return Err(failures.swap_remove(0));
        }

        let Some(player) = standings.and_then(|vehicles| vehicles.into_iter().next()) else {
            trace!("No player vehicle in standings");
            return Ok(None);
        };
        if game_state.in_control_of_vehicle == Some(false) {
            trace!("Player not in control of vehicle");
            return Ok(None);
        }

        Ok(self.validator.accept(assemble(player, &game_state, session, pitstop)))
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        if self.connected {
            debug!("Disconnecting REST transport");
        }
        self.connected = false;
        self.retry.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, timeout_ms: u64) -> TelemetryConfig {
        let _ = tracing_subscriber::fmt::try_init();
        TelemetryConfig {
            rest_base_url: server.uri(),
            rest_timeout_ms: timeout_ms,
            ..Default::default()
        }
    }

    async fn mount(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn standings() -> serde_json::Value {
        json!([
            {
                "carVelocity": { "x": 30.0, "y": 0.0, "z": 40.0 },
                "engineRotation": 7100.0,
                "engineMaxRotation": 8800.0,
                "gear": 3,
                "lapNumber": 7,
                "currentLapTime": 61.5,
                "lastLapTime": 212.4,
                "bestLapTime": 209.8,
                "fuel": 48.0,
                "maxFuel": 90.0,
                "throttle": 1.0,
                "brake": 0.0,
                "carClass": "Hypercar"
            },
            { "carVelocity": { "x": 1.0, "y": 0.0, "z": 0.0 }, "gear": 2, "carClass": "LMP2" }
        ])
    }

    async fn full_server() -> MockServer {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(standings())).await;
        mount(
            &server,
            GAME_STATE_PATH,
            ResponseTemplate::new(200).set_body_json(json!({
                "gamePhase": 5,
                "MultiStintState": "DRIVING",
                "inControlOfVehicle": true
            })),
        )
        .await;
        mount(
            &server,
            SESSION_INFO_PATH,
            ResponseTemplate::new(200).set_body_json(json!({
                "trackName": "Circuit de la Sarthe",
                "trackTemp": 31.0,
                "ambientTemp": 22.5
            })),
        )
        .await;
        mount(&server, PITSTOP_ESTIMATE_PATH, ResponseTemplate::new(200).set_body_json(json!({})))
            .await;
        server
    }

    async fn connected(server: &MockServer, timeout_ms: u64) -> RestTransport {
        let mut rest = RestTransport::from_config(&config(server, timeout_ms)).unwrap();
        rest.connect().await.unwrap();
        rest
    }

    #[tokio::test]
    async fn reassembles_snapshot_from_all_endpoints() {
        let server = full_server().await;
        let mut rest = connected(&server, 3_000).await;

        let snapshot = rest.read().await.unwrap().expect("snapshot");
        assert_eq!(snapshot.build_version, 1);
        assert_eq!(snapshot.speed_kmh, 180.0);
        assert_eq!(snapshot.rpm, 7100.0);
        assert_eq!(snapshot.max_rpm, 8800.0);
        assert_eq!(snapshot.gear, 3);
        assert_eq!(snapshot.lap_number, 7);
        assert_eq!(snapshot.game_mode, 5);
        assert_eq!(snapshot.race_state, 5);
        assert_eq!(snapshot.fuel, 48.0);
        assert_eq!(snapshot.max_fuel, 90.0);
        assert_eq!(snapshot.track_name, "Circuit de la Sarthe");
        assert_eq!(snapshot.track_temp, 31.0);
        assert_eq!(snapshot.car_name, "Hypercar");
    }

    #[tokio::test]
    async fn slow_endpoint_does_not_block_the_others() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(standings())).await;
        mount(
            &server,
            GAME_STATE_PATH,
            ResponseTemplate::new(200)
                .set_body_json(json!({ "gamePhase": 5 }))
                .set_delay(Duration::from_secs(5)),
        )
        .await;
        mount(
            &server,
            SESSION_INFO_PATH,
            ResponseTemplate::new(200).set_body_json(json!({ "trackName": "Spa" })),
        )
        .await;
        let mut rest = connected(&server, 300).await;

        let started = Instant::now();
        let snapshot = rest.read().await.unwrap().expect("snapshot despite slow endpoint");
        assert!(started.elapsed() < Duration::from_secs(2), "read waited for the slow endpoint");

        assert_eq!(snapshot.speed_kmh, 180.0);
        assert_eq!(snapshot.track_name, "Spa");
        assert_eq!(snapshot.game_mode, 0, "timed out endpoint falls back to defaults");
        assert!(rest.is_connected());
    }

    #[tokio::test]
    async fn missing_endpoints_take_defaults() {
        let server = MockServer::start().await;
        mount(
            &server,
            STANDINGS_PATH,
            ResponseTemplate::new(200).set_body_json(json!([{ "gear": 1, "rpm": 2500.0 }])),
        )
        .await;
        let mut rest = connected(&server, 1_000).await;

        let snapshot = rest.read().await.unwrap().expect("snapshot");
        assert_eq!(snapshot.rpm, 2500.0);
        assert_eq!(snapshot.speed_kmh, 0.0);
        assert_eq!(snapshot.max_rpm, 8000.0);
        assert_eq!(snapshot.max_fuel, 100.0);
        assert_eq!(snapshot.track_temp, 25.0);
        assert_eq!(snapshot.ambient_temp, 20.0);
        assert_eq!(snapshot.race_state, 0);
        assert!(snapshot.track_name.is_empty());
    }

    #[tokio::test]
    async fn pitstop_estimate_supplies_missing_fuel() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(json!([{ "gear": 2 }])))
            .await;
        mount(
            &server,
            PITSTOP_ESTIMATE_PATH,
            ResponseTemplate::new(200).set_body_json(json!({ "fuel": 33.5 })),
        )
        .await;
        let mut rest = connected(&server, 1_000).await;

        assert_eq!(rest.read().await.unwrap().unwrap().fuel, 33.5);
    }

    #[tokio::test]
    async fn not_in_control_is_no_data() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(standings())).await;
        mount(
            &server,
            GAME_STATE_PATH,
            ResponseTemplate::new(200).set_body_json(json!({ "inControlOfVehicle": false })),
        )
        .await;
        let mut rest = connected(&server, 1_000).await;

        assert_eq!(rest.read().await.unwrap(), None);
        assert!(rest.is_connected());
    }

    #[tokio::test]
    async fn non_json_body_is_an_absent_response() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(standings())).await;
        mount(
            &server,
            SESSION_INFO_PATH,
            ResponseTemplate::new(200).set_body_string("<html>loading</html>"),
        )
        .await;
        let mut rest = connected(&server, 1_000).await;

        let snapshot = rest.read().await.unwrap().unwrap();
        assert!(snapshot.track_name.is_empty());
        assert_eq!(snapshot.track_temp, 25.0);
    }

    #[tokio::test]
    async fn implausible_payload_is_rejected() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(json!([{ "gear": 11 }])))
            .await;
        let mut rest = connected(&server, 1_000).await;

        assert_eq!(rest.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_standings_do_not_connect() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(json!([]))).await;
        let mut rest = RestTransport::from_config(&config(&server, 1_000)).unwrap();

        assert!(matches!(rest.connect().await, Err(TelemetryError::NoData)));
        assert!(!rest.is_connected());
        assert!(rest.retry_pending());
    }

    #[tokio::test]
    async fn retry_interval_gates_standings_requests() {
        let server = MockServer::start().await;
        mount(&server, STANDINGS_PATH, ResponseTemplate::new(200).set_body_json(json!([]))).await;
        let mut rest = RestTransport::from_config(&config(&server, 1_000)).unwrap();
        assert!(matches!(rest.connect().await, Err(TelemetryError::NoData)));

        tokio::time::pause();
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(3)).await;
            assert!(matches!(rest.connect().await, Err(TelemetryError::ServiceUnavailable { .. })));
        }
        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1, "no request before the retry interval elapses");

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::resume();
        assert!(matches!(rest.connect().await, Err(TelemetryError::NoData)));
        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|request| request.url.path() == STANDINGS_PATH));
    }

    #[tokio::test]
    async fn all_endpoints_failing_drops_connection() {
        let server = full_server().await;
        let mut rest = connected(&server, 1_000).await;

        server.reset().await;
        assert!(rest.read().await.is_err());
        assert!(!rest.is_connected());
        assert!(rest.retry_pending());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let server = full_server().await;
        let mut rest = connected(&server, 1_000).await;

        rest.disconnect();
        rest.disconnect();
        assert!(!rest.is_connected());
        assert!(!rest.retry_pending());
        assert!(matches!(rest.read().await, Err(TelemetryError::ServiceUnavailable { .. })));
    }
}
