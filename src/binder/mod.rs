//! Named shared segment binding.
//!
//! A [`SegmentBinder`] opens an OS-level named shared memory object owned by the
//! producer and maps it read-only. Every implementation hands back the same
//! [`BoundSegment`] type, so the decoder and transports never see a platform
//! handle.
//!
//! | Binder | Backing object |
//! |--------|----------------|
//! | [`WindowsBinder`] | `OpenFileMappingW` + `MapViewOfFile` |
//! | [`UnixBinder`] | a file under `/dev/shm` (Wine/Proton bridges mirror the mapping there) |
//! | [`MockBinder`] | in-process buffers, deterministic, for tests and unsupported platforms |
//!
//! The binder is picked once at startup from [`BinderKind`]; nothing else in the
//! crate branches on the platform.

mod mock;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use mock::{MockBinder, MockSegment};
#[cfg(unix)]
pub use unix::UnixBinder;
#[cfg(windows)]
pub use windows::WindowsBinder;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::TelemetryConfig;
use crate::decode::read_u32;
use crate::{Result, TelemetryError};

/// Access requested on the producer's segment.
///
/// Only read access exists. The core never writes to memory it does not own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum AccessMode {
    #[default]
    Read,
}

/// Readable window onto a mapped segment.
///
/// Implementations copy out of live memory; the producer may be writing
/// concurrently, so callers validate what they read.
pub trait SegmentView: Send + Sync {
    /// Size of the mapped view in bytes.
    fn len(&self) -> usize;

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()>;
}

/// A mapped segment together with the handle that keeps it alive.
///
/// Dropping the value unmaps the view and closes the handle in one step, on
/// every exit path.
pub struct BoundSegment {
    name: String,
    view: Box<dyn SegmentView>,
}

impl BoundSegment {
    pub fn new(name: impl Into<String>, view: Box<dyn SegmentView>) -> Self {
        Self { name: name.into(), view }
    }

    /// Name the segment was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.len() == 0
    }

    pub fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.view.read_at(offset, dst)
    }

    /// Read a little-endian `u32` at `offset`.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut word = [0u8; 4];
        self.view.read_at(offset, &mut word)?;
        read_u32(&word, 0)
    }

    /// Unmap and close now. Equivalent to dropping.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BoundSegment {
    fn drop(&mut self) {
        debug!(name = %self.name, "Released shared memory segment");
    }
}

impl std::fmt::Debug for BoundSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundSegment").field("name", &self.name).field("len", &self.len()).finish()
    }
}

/// Opens named segments.
pub trait SegmentBinder: Send {
    /// Open and map `name` with no further checks.
    fn open(&self, name: &str, access: AccessMode) -> Result<BoundSegment>;

    /// Open `name` and require the producer to have published data.
    ///
    /// A segment that exists but still reads zero at the build-version word is
    /// released and reported as [`TelemetryError::NoData`].
    fn try_bind(&self, name: &str, access: AccessMode) -> Result<BoundSegment> {
        let segment = self.open(name, access)?;
        if segment.read_u32(0)? == 0 {
            trace!(name, "Segment exists but is zeroed");
            segment.release();
            return Err(TelemetryError::NoData);
        }
        Ok(segment)
    }

    /// Try each candidate in order and return the first live segment.
    ///
    /// When every candidate fails, the most informative error wins: a binding
    /// fault over "no data" over "unavailable".
    fn bind_first(&self, names: &[String], access: AccessMode) -> Result<BoundSegment> {
        let mut worst: Option<TelemetryError> = None;

        for name in names {
            match self.try_bind(name, access) {
                Ok(segment) => {
                    debug!(name = %name, "Bound shared memory segment");
                    return Ok(segment);
                }
                Err(e) => {
                    trace!(name = %name, "Candidate failed: {}", e);
                    if severity(&e) >= worst.as_ref().map(severity).unwrap_or(0) {
                        worst = Some(e);
                    }
                }
            }
        }

        Err(worst.unwrap_or_else(|| TelemetryError::unavailable("<no candidates>")))
    }
}

fn severity(error: &TelemetryError) -> u8 {
    match error {
        TelemetryError::Unavailable { .. } => 1,
        TelemetryError::NoData => 2,
        _ => 3,
    }
}

/// Which binder implementation to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinderKind {
    Windows,
    Unix,
    Mock,
}

impl BinderKind {
    /// The binder matching the compilation target.
    pub const fn platform_default() -> Self {
        if cfg!(windows) {
            BinderKind::Windows
        } else if cfg!(unix) {
            BinderKind::Unix
        } else {
            BinderKind::Mock
        }
    }
}

impl Default for BinderKind {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Instantiate the binder selected by `config`.
pub fn create_binder(config: &TelemetryConfig) -> Result<Box<dyn SegmentBinder>> {
    match config.binder {
        #[cfg(windows)]
        BinderKind::Windows => Ok(Box::new(WindowsBinder::new())),
        #[cfg(not(windows))]
        BinderKind::Windows => {
            Err(TelemetryError::unsupported_platform("Named file mapping binder", "Windows"))
        }
        #[cfg(unix)]
        BinderKind::Unix => Ok(Box::new(UnixBinder::new(&config.shm_dir))),
        #[cfg(not(unix))]
        BinderKind::Unix => Err(TelemetryError::unsupported_platform("/dev/shm binder", "Unix")),
        BinderKind::Mock => Ok(Box::new(MockBinder::new())),
    }
}
