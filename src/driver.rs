//! Driver runs the transport selector on a polling task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::selector::TransportSelector;
use crate::types::{TelemetrySnapshot, TransportKind};

/// Shortest poll period the driver runs at; shorter requests are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Latest snapshot, `None` while no valid data is available
    pub snapshots: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    /// Active transport
    pub method: watch::Receiver<TransportKind>,
    /// Human-readable connection status
    pub status: watch::Receiver<&'static str>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver polls a [`TransportSelector`] on a single task.
///
/// All acquisition work happens on that task. Consumers only see the watch
/// channels, so a slow subscriber never delays a poll.
pub struct Driver;

impl Driver {
    /// Spawn the polling task. Must be called inside a tokio runtime.
    ///
    /// `poll_interval` is clamped to [`MIN_POLL_INTERVAL`].
    pub fn spawn(selector: TransportSelector, poll_interval: Duration) -> DriverChannels {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (method_tx, method_rx) = watch::channel(selector.current_method());
        let (status_tx, status_rx) = watch::channel(selector.connection_status());
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::poll_task(selector, poll_interval, snapshot_tx, method_tx, status_tx, cancel_task)
                .await;
        });

        DriverChannels { snapshots: snapshot_rx, method: method_rx, status: status_rx, cancel }
    }

    async fn poll_task(
        mut selector: TransportSelector,
        poll_interval: Duration,
        snapshot_tx: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
        method_tx: watch::Sender<TransportKind>,
        status_tx: watch::Sender<&'static str>,
        cancel: CancellationToken,
    ) {
        info!(poll_ms = poll_interval.as_millis() as u64, "Telemetry driver started");
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u64;
        let mut published = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Telemetry driver cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let snapshot = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Telemetry driver cancelled during read");
                    break;
                }
                snapshot = selector.read_telemetry() => snapshot,
            };
            polls += 1;

            match snapshot {
                Some(snapshot) => {
                    published += 1;
                    trace!(poll = polls, gear = snapshot.gear, rpm = snapshot.rpm, "Snapshot");
                    snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                }
                None => {
                    // Only wake subscribers on the transition into "no data".
                    snapshot_tx.send_if_modified(|current| current.take().is_some());
                }
            }

            let method = selector.current_method();
            method_tx.send_if_modified(|current| std::mem::replace(current, method) != method);
            let status = selector.connection_status();
            status_tx.send_if_modified(|current| std::mem::replace(current, status) != status);

            if snapshot_tx.is_closed() {
                debug!("All snapshot receivers dropped, stopping driver");
                break;
            }
        }

        selector.disconnect();
        snapshot_tx.send_replace(None);
        method_tx.send_replace(TransportKind::None);
        status_tx.send_replace(selector.connection_status());
        info!(polls, published, "Telemetry driver stopped");
    }
}
