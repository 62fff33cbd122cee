//! Transport trait for telemetry sources

use std::time::Duration;

use tokio::time::Instant;

use crate::types::{TelemetrySnapshot, TransportKind};
use crate::Result;

/// A pollable source of telemetry snapshots.
///
/// Both the shared memory path and the REST path implement this, and the
/// [`TransportSelector`](crate::TransportSelector) drives them only through it.
/// Polling is caller-driven: a transport never spawns its own timer task.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Which acquisition path this is.
    fn kind(&self) -> TransportKind;

    /// Try to establish a connection.
    ///
    /// Returns immediately with an error while the transport's own retry
    /// interval has not elapsed since the last failed attempt.
    async fn connect(&mut self) -> Result<()>;

    /// Read one snapshot.
    ///
    /// Returns:
    /// - `Ok(Some(snapshot))` - a fully valid snapshot
    /// - `Ok(None)` - no valid data this cycle, connection kept
    /// - `Err(e)` - the transport lost its connection and is disconnected
    async fn read(&mut self) -> Result<Option<TelemetrySnapshot>>;

    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;

    /// Cheap liveness check, lighter than a full read.
    fn is_alive(&self) -> bool {
        self.is_connected()
    }

    /// Release every resource held. Safe to call repeatedly.
    fn disconnect(&mut self);
}

/// A single owned retry deadline.
///
/// Transports arm it after a failed attempt and cancel it on every state exit,
/// so no deadline outlives a disconnect/reconnect cycle.
#[derive(Debug, Clone)]
pub struct RetryTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl RetryTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval, deadline: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule the next attempt one interval from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.interval);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True when no attempt is pending or the pending deadline has passed.
    pub fn is_due(&self) -> bool {
        self.deadline.is_none_or(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timer_gates_until_interval_elapses() {
        let mut timer = RetryTimer::new(Duration::from_secs(5));
        assert!(timer.is_due());

        timer.arm();
        assert!(timer.is_armed());
        assert!(!timer.is_due());

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(!timer.is_due());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(timer.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_makes_timer_due_immediately() {
        let mut timer = RetryTimer::new(Duration::from_secs(10));
        timer.arm();
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(timer.is_due());
    }
}
