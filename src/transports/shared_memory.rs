//! Shared memory transport (primary path)

use tracing::{debug, info, trace, warn};

use crate::binder::{AccessMode, BoundSegment, SegmentBinder};
use crate::config::TelemetryConfig;
use crate::decode::Decoder;
use crate::transport::{RetryTimer, Transport};
use crate::types::{TelemetrySnapshot, TransportKind};
use crate::validate::Validator;
use crate::{Result, TelemetryError};

/// Connection state of the shared memory transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No segment bound.
    Disconnected,
    /// Walking the candidate name list.
    Binding,
    /// A live segment is bound and decoded on every read.
    Connected,
}

/// Reads telemetry straight out of the producer's mapped segment.
///
/// Once bound, every [`read`](Transport::read) re-decodes the live view; the OS
/// mapping already reflects producer writes, so there is nothing else to poll.
/// Version-zero or implausible reads are tolerated without dropping the
/// segment. Only a failing read of the view itself disconnects.
pub struct SharedMemoryTransport {
    binder: Box<dyn SegmentBinder>,
    names: Vec<String>,
    decoder: Decoder,
    validator: Validator,
    segment: Option<BoundSegment>,
    state: LinkState,
    retry: RetryTimer,
    buffer: Vec<u8>,
}

impl SharedMemoryTransport {
    /// Create a transport using the binder selected by `config`.
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        let binder = crate::binder::create_binder(config)?;
        Ok(Self::with_binder(binder, config))
    }

    /// Create a transport around an existing binder.
    pub fn with_binder(binder: Box<dyn SegmentBinder>, config: &TelemetryConfig) -> Self {
        Self {
            binder,
            names: config.segment_names.clone(),
            decoder: Decoder::default(),
            validator: Validator::default(),
            segment: None,
            state: LinkState::Disconnected,
            retry: RetryTimer::new(config.shm_retry_interval()),
            buffer: Vec::new(),
        }
    }

    /// Use a different layout revision.
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Name of the bound segment, if any.
    pub fn segment_name(&self) -> Option<&str> {
        self.segment.as_ref().map(BoundSegment::name)
    }

    /// Whether a retry deadline is pending.
    pub fn retry_pending(&self) -> bool {
        self.retry.is_armed()
    }

    fn drop_segment(&mut self) {
        if let Some(segment) = self.segment.take() {
            segment.release();
        }
        self.state = LinkState::Disconnected;
    }
}

#[async_trait::async_trait]
impl Transport for SharedMemoryTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::SharedMemory
    }

    async fn connect(&mut self) -> Result<()> {
        if self.state == LinkState::Connected {
            return Ok(());
        }
        if !self.retry.is_due() {
            return Err(TelemetryError::unavailable(self.names.join(", ")));
        }

        self.state = LinkState::Binding;
        match self.binder.bind_first(&self.names, AccessMode::Read) {
            Ok(segment) => {
                info!(name = segment.name(), len = segment.len(), "Connected to shared memory");
                self.buffer = vec![0; segment.len()];
                self.segment = Some(segment);
                self.state = LinkState::Connected;
                self.retry.cancel();
                Ok(())
            }
            Err(e) => {
                if e.is_expected() {
                    debug!("Shared memory not available: {}", e);
                } else {
                    warn!("Shared memory binding failed: {}", e);
                }
                self.state = LinkState::Disconnected;
                self.retry.arm();
                Err(e)
            }
        }
    }

    async fn read(&mut self) -> Result<Option<TelemetrySnapshot>> {
        let Some(segment) = self.segment.as_ref() else {
            return Err(TelemetryError::unavailable(self.names.join(", ")));
        };

        let decoded = segment
            .read_at(0, &mut self.buffer)
            .and_then(|()| self.decoder.decode(&self.buffer));

        match decoded {
            Ok(Some(snapshot)) => Ok(self.validator.accept(snapshot)),
            Ok(None) => {
                trace!("Build version is zero, no data this cycle");
                Ok(None)
            }
            Err(e) => {
                warn!(name = segment.name(), "Shared memory read failed, releasing segment: {}", e);
                self.drop_segment();
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Reads only the 4-byte build version.
    fn is_alive(&self) -> bool {
        self.segment
            .as_ref()
            .and_then(|segment| segment.read_u32(self.decoder.layout().build_version).ok())
            .is_some_and(|version| version != 0)
    }

    fn disconnect(&mut self) {
        if self.segment.is_some() {
            debug!("Disconnecting shared memory transport");
        }
        self.drop_segment();
        self.retry.cancel();
    }
}

impl Drop for SharedMemoryTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
