//! Transport selection and failover
//!
//! [`TransportSelector`] owns the shared memory transport and, optionally, the
//! REST fallback. It hides which one is active behind
//! [`read_telemetry`](TransportSelector::read_telemetry), which never returns an
//! error: a down producer is only ever visible as `None` and
//! `is_game_running() == false`.

use tracing::{debug, info, trace};

use crate::config::TelemetryConfig;
use crate::transport::{RetryTimer, Transport};
use crate::transports::{RestTransport, SharedMemoryTransport};
use crate::types::{TelemetrySnapshot, TransportKind};
use crate::Result;

pub const STATUS_SHARED_MEMORY: &str = "Connected via Shared Memory";
pub const STATUS_REST_API: &str = "Connected via REST API";
pub const STATUS_WAITING: &str = "Disconnected - Start Le Mans Ultimate";
pub const STATUS_DISCONNECTED: &str = "Disconnected";

/// Which transport, if any, is serving reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorState {
    #[default]
    Unresolved,
    UsingPrimary,
    UsingSecondary,
}

/// Chooses between the primary and secondary transport.
///
/// Detection runs lazily inside `read_telemetry` while unresolved, at most once
/// per detection interval. A read failure on the active transport only flips
/// the state back to [`SelectorState::Unresolved`]; the following call
/// re-detects.
pub struct TransportSelector {
    primary: Box<dyn Transport>,
    secondary: Option<Box<dyn Transport>>,
    state: SelectorState,
    detection: RetryTimer,
    status: &'static str,
}

impl TransportSelector {
    pub fn new(
        primary: Box<dyn Transport>,
        secondary: Option<Box<dyn Transport>>,
        detection_interval: std::time::Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            state: SelectorState::Unresolved,
            detection: RetryTimer::new(detection_interval),
            status: STATUS_WAITING,
        }
    }

    /// Build both transports from `config`.
    ///
    /// The binder is instantiated here, once; an unsupported binder kind fails
    /// construction rather than every later read.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;

        let primary: Box<dyn Transport> = Box::new(SharedMemoryTransport::from_config(config)?);
        let secondary: Option<Box<dyn Transport>> = if config.enable_rest_fallback {
            Some(Box::new(RestTransport::from_config(config)?))
        } else {
            None
        };

        debug!(
            binder = ?config.binder,
            rest_fallback = config.enable_rest_fallback,
            "Created transport selector"
        );
        Ok(Self::new(primary, secondary, config.detection_interval()))
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Run one detection round if one is due.
    ///
    /// Returns the snapshot read while accepting a transport, so a successful
    /// detection also serves the poll that triggered it.
    pub async fn detect(&mut self) -> Option<TelemetrySnapshot> {
        if self.state != SelectorState::Unresolved || !self.detection.is_due() {
            return None;
        }
        trace!("Detecting telemetry transport");

        match self.primary.connect().await {
            Ok(()) => match self.primary.read().await {
                Ok(Some(snapshot)) => {
                    self.resolve(SelectorState::UsingPrimary);
                    return Some(snapshot);
                }
                Ok(None) => {
                    debug!("Shared memory bound but first read was not valid");
                    self.primary.disconnect();
                }
                Err(e) => debug!("Shared memory read failed during detection: {}", e),
            },
            Err(e) => trace!("Shared memory not usable: {}", e),
        }

        if let Some(secondary) = self.secondary.as_mut() {
            match secondary.connect().await {
                Ok(()) => {
                    self.resolve(SelectorState::UsingSecondary);
                    return self.read_active().await;
                }
                Err(e) => trace!("REST API not usable: {}", e),
            }
        }

        debug!("No telemetry transport available");
        self.status = STATUS_WAITING;
        self.detection.arm();
        None
    }

    /// Read one snapshot from whichever transport is active.
    pub async fn read_telemetry(&mut self) -> Option<TelemetrySnapshot> {
        match self.state {
            SelectorState::Unresolved => self.detect().await,
            SelectorState::UsingPrimary | SelectorState::UsingSecondary => self.read_active().await,
        }
    }

    pub fn is_game_running(&self) -> bool {
        self.active().is_some_and(|transport| transport.is_connected())
    }

    pub fn current_method(&self) -> TransportKind {
        self.active().map_or(TransportKind::None, |transport| transport.kind())
    }

    /// Human-readable connection status.
    pub fn connection_status(&self) -> &'static str {
        self.status
    }

    /// Disconnect both transports and cancel pending detection.
    pub fn disconnect(&mut self) {
        self.primary.disconnect();
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.disconnect();
        }
        self.detection.cancel();
        if self.state != SelectorState::Unresolved {
            info!(from = ?self.state, "Telemetry transport disconnected");
        }
        self.state = SelectorState::Unresolved;
        self.status = STATUS_DISCONNECTED;
    }

    fn active(&self) -> Option<&dyn Transport> {
        match self.state {
            SelectorState::Unresolved => None,
            SelectorState::UsingPrimary => Some(self.primary.as_ref()),
            SelectorState::UsingSecondary => self.secondary.as_deref(),
        }
    }

    fn active_mut(&mut self) -> Option<&mut Box<dyn Transport>> {
        match self.state {
            SelectorState::Unresolved => None,
            SelectorState::UsingPrimary => Some(&mut self.primary),
            SelectorState::UsingSecondary => self.secondary.as_mut(),
        }
    }

    fn resolve(&mut self, state: SelectorState) {
        info!(from = ?self.state, to = ?state, "Telemetry transport selected");
        self.state = state;
        self.detection.cancel();
        self.status = match state {
            SelectorState::UsingPrimary => STATUS_SHARED_MEMORY,
            SelectorState::UsingSecondary => STATUS_REST_API,
            SelectorState::Unresolved => STATUS_WAITING,
        };
    }

    async fn read_active(&mut self) -> Option<TelemetrySnapshot> {
        let transport = self.active_mut()?;
        match transport.read().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let kind = transport.kind();
                transport.disconnect();
                info!(transport = %kind, "Telemetry transport lost, re-detecting on next read: {}", e);
                self.state = SelectorState::Unresolved;
                self.status = STATUS_WAITING;
                self.detection.cancel();
                None
            }
        }
    }
}

impl std::fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSelector")
            .field("state", &self.state)
            .field("status", &self.status)
            .field("has_secondary", &self.secondary.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{BinderKind, MockBinder};
    use crate::test_utils::SegmentFixture;
    use crate::TelemetryError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Script {
        connect_ok: bool,
        reads: VecDeque<Result<Option<TelemetrySnapshot>>>,
        connects: usize,
        disconnects: usize,
        connected: bool,
    }

    /// Scripted transport; the test keeps a handle to the shared script.
    struct FakeTransport {
        kind: TransportKind,
        script: Arc<Mutex<Script>>,
    }

    impl FakeTransport {
        fn new(kind: TransportKind, connect_ok: bool) -> (Box<dyn Transport>, Arc<Mutex<Script>>) {
            let script = Arc::new(Mutex::new(Script { connect_ok, ..Default::default() }));
            (Box::new(Self { kind, script: script.clone() }), script)
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn connect(&mut self) -> Result<()> {
            let mut script = self.script.lock().unwrap();
            script.connects += 1;
            script.connected = script.connect_ok;
            if script.connect_ok { Ok(()) } else { Err(TelemetryError::unavailable("fake")) }
        }

        async fn read(&mut self) -> Result<Option<TelemetrySnapshot>> {
            let mut script = self.script.lock().unwrap();
            let next = script.reads.pop_front().unwrap_or(Ok(None));
            if next.is_err() {
                script.connected = false;
            }
            next
        }

        fn is_connected(&self) -> bool {
            self.script.lock().unwrap().connected
        }

        fn disconnect(&mut self) {
            let mut script = self.script.lock().unwrap();
            script.disconnects += 1;
            script.connected = false;
        }
    }

    fn valid() -> TelemetrySnapshot {
        TelemetrySnapshot { build_version: 7, gear: 2, rpm: 4000.0, ..Default::default() }
    }

    #[tokio::test]
    async fn prefers_primary_when_first_read_is_valid() {
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, true);
        let (secondary, s) = FakeTransport::new(TransportKind::RestApi, true);
        p.lock().unwrap().reads.push_back(Ok(Some(valid())));
        let mut selector = TransportSelector::new(primary, Some(secondary), Duration::from_secs(5));

        assert_eq!(selector.read_telemetry().await, Some(valid()));
        assert_eq!(selector.state(), SelectorState::UsingPrimary);
        assert_eq!(selector.current_method(), TransportKind::SharedMemory);
        assert_eq!(selector.connection_status(), STATUS_SHARED_MEMORY);
        assert!(selector.is_game_running());
        assert_eq!(s.lock().unwrap().connects, 0);
    }

    #[tokio::test]
    async fn secondary_is_attempted_before_giving_up() {
        let (primary, _) = FakeTransport::new(TransportKind::SharedMemory, false);
        let (secondary, s) = FakeTransport::new(TransportKind::RestApi, false);
        let mut selector = TransportSelector::new(primary, Some(secondary), Duration::from_secs(5));

        assert_eq!(selector.read_telemetry().await, None);
        assert_eq!(s.lock().unwrap().connects, 1, "secondary must be tried");
        assert!(!selector.is_game_running());
        assert_eq!(selector.current_method(), TransportKind::None);
        assert_eq!(selector.connection_status(), STATUS_WAITING);
    }

    #[tokio::test]
    async fn invalid_first_primary_read_falls_back_to_secondary() {
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, true);
        let (secondary, s) = FakeTransport::new(TransportKind::RestApi, true);
        s.lock().unwrap().reads.push_back(Ok(Some(valid())));
        let mut selector = TransportSelector::new(primary, Some(secondary), Duration::from_secs(5));

        assert_eq!(selector.read_telemetry().await, Some(valid()));
        assert_eq!(selector.state(), SelectorState::UsingSecondary);
        assert_eq!(selector.connection_status(), STATUS_REST_API);
        assert_eq!(p.lock().unwrap().disconnects, 1, "rejected primary is released");
    }

    #[tokio::test]
    async fn read_failure_flips_to_unresolved_and_redetects_lazily() {
        let _ = tracing_subscriber::fmt::try_init();
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, true);
        {
            let mut script = p.lock().unwrap();
            script.reads.push_back(Ok(Some(valid())));
            script.reads.push_back(Err(TelemetryError::binding_failed("fake", "read")));
            script.reads.push_back(Ok(Some(valid())));
        }
        let mut selector = TransportSelector::new(primary, None, Duration::from_secs(5));

        assert!(selector.read_telemetry().await.is_some());
        assert_eq!(p.lock().unwrap().connects, 1);

        assert_eq!(selector.read_telemetry().await, None);
        assert_eq!(selector.state(), SelectorState::Unresolved);
        assert_eq!(p.lock().unwrap().connects, 1, "no detection inside the failing read");

        assert!(selector.read_telemetry().await.is_some());
        assert_eq!(p.lock().unwrap().connects, 2);
        assert_eq!(selector.state(), SelectorState::UsingPrimary);
    }

    #[tokio::test]
    async fn transient_none_keeps_active_transport() {
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, true);
        {
            let mut script = p.lock().unwrap();
            script.reads.push_back(Ok(Some(valid())));
            script.reads.push_back(Ok(None));
        }
        let mut selector = TransportSelector::new(primary, None, Duration::from_secs(5));

        selector.read_telemetry().await;
        assert_eq!(selector.read_telemetry().await, None);
        assert_eq!(selector.state(), SelectorState::UsingPrimary);
    }

    #[tokio::test(start_paused = true)]
    async fn detection_is_rate_limited_while_unresolved() {
        let _ = tracing_subscriber::fmt::try_init();
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, false);
        let mut selector = TransportSelector::new(primary, None, Duration::from_secs(5));

        selector.read_telemetry().await;
        selector.read_telemetry().await;
        assert_eq!(p.lock().unwrap().connects, 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        selector.read_telemetry().await;
        assert_eq!(p.lock().unwrap().connects, 2);
    }

    #[tokio::test]
    async fn disconnect_releases_both_transports() {
        let (primary, p) = FakeTransport::new(TransportKind::SharedMemory, true);
        let (secondary, s) = FakeTransport::new(TransportKind::RestApi, true);
        p.lock().unwrap().reads.push_back(Ok(Some(valid())));
        let mut selector = TransportSelector::new(primary, Some(secondary), Duration::from_secs(5));
        selector.read_telemetry().await;

        selector.disconnect();
        selector.disconnect();
        assert_eq!(selector.connection_status(), STATUS_DISCONNECTED);
        assert_eq!(selector.current_method(), TransportKind::None);
        assert_eq!(p.lock().unwrap().disconnects, 2);
        assert_eq!(s.lock().unwrap().disconnects, 2);
    }

    #[tokio::test]
    async fn zero_build_version_reads_as_none_over_shared_memory() {
        let binder = MockBinder::new();
        let producer = binder.publish("$rFactor2SMMP_Telemetry$", SegmentFixture::driving().build());
        let config = TelemetryConfig { binder: BinderKind::Mock, ..Default::default() };
        let primary = SharedMemoryTransport::with_binder(Box::new(binder.clone()), &config);
        let mut selector = TransportSelector::new(Box::new(primary), None, Duration::from_secs(5));

        let snapshot = selector.read_telemetry().await.expect("live segment");
        assert_eq!(snapshot.speed_kmh, 180.0);

        producer.write(SegmentFixture::driving().build_version(0).build());
        assert_eq!(selector.read_telemetry().await, None);
        assert!(selector.is_game_running(), "transient no-data keeps the connection");

        selector.disconnect();
        assert_eq!(binder.open_views(), 0);
    }
}
