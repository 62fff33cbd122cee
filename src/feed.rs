//! Continuous telemetry feed for a display layer

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::driver::{Driver, MIN_POLL_INTERVAL};
use crate::selector::TransportSelector;
use crate::stream::ThrottleExt;
use crate::types::{TelemetrySnapshot, TransportKind, UpdateRate};
use crate::Result;

/// Handle to a running telemetry driver.
///
/// Dropping the feed stops the driver, which disconnects both transports.
///
/// ```rust,no_run
/// use futures::StreamExt;
/// use lmu_telemetry::{TelemetryConfig, TelemetryFeed, UpdateRate};
///
/// # #[tokio::main]
/// # async fn main() -> lmu_telemetry::Result<()> {
/// let feed = TelemetryFeed::start(&TelemetryConfig::default())?;
/// let mut snapshots = feed.subscribe(UpdateRate::Max(30));
///
/// while let Some(snapshot) = snapshots.next().await {
///     println!("{} rpm, gear {}, {:.0} km/h", snapshot.rpm, snapshot.gear, snapshot.speed_kmh);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TelemetryFeed {
    snapshots: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    method: watch::Receiver<TransportKind>,
    status: watch::Receiver<&'static str>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl TelemetryFeed {
    /// Build a selector from `config` and start polling it.
    ///
    /// Succeeds even when the producer is not running; subscribers simply
    /// wait until data arrives.
    pub fn start(config: &TelemetryConfig) -> Result<Self> {
        let selector = TransportSelector::from_config(config)?;
        Ok(Self::with_selector(selector, config.poll_interval()))
    }

    /// Start polling an existing selector.
    pub fn with_selector(selector: TransportSelector, poll_interval: Duration) -> Self {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let channels = Driver::spawn(selector, poll_interval);
        info!(poll_ms = poll_interval.as_millis() as u64, "Telemetry feed started");

        Self {
            snapshots: channels.snapshots,
            method: channels.method,
            status: channels.status,
            poll_interval,
            cancel: channels.cancel,
        }
    }

    /// Stream of valid snapshots at most at `rate`.
    ///
    /// Polls without valid data are skipped, not surfaced as items. The stream
    /// ends once the feed is shut down.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<TelemetrySnapshot>> + 'static {
        let snapshots =
            WatchStream::new(self.snapshots.clone()).filter_map(|snapshot| async move { snapshot });

        match rate.throttle_interval(self.poll_interval) {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }

    /// Stream of transport changes, starting with the current one.
    pub fn method_updates(&self) -> impl Stream<Item = TransportKind> + 'static {
        WatchStream::new(self.method.clone())
    }

    /// Most recent valid snapshot, if the last poll produced one.
    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.snapshots.borrow().clone()
    }

    pub fn current_method(&self) -> TransportKind {
        *self.method.borrow()
    }

    pub fn connection_status(&self) -> &'static str {
        *self.status.borrow()
    }

    pub fn is_game_running(&self) -> bool {
        self.current_method() != TransportKind::None
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Stop the driver. Subscriber streams end after the driver exits.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Shutting down telemetry feed");
            self.cancel.cancel();
        }
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}
