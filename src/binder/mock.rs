//! Deterministic in-process binder
//!
//! Stands in for the producer on platforms without a native binder and in tests.
//! Segments are plain byte buffers shared between the "producer" side
//! ([`MockSegment`]) and every view bound to them, so writes made after binding
//! are visible to readers the same way a live mapping is.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::{AccessMode, BoundSegment, SegmentBinder, SegmentView};
use crate::{Result, TelemetryError};

/// Producer side of a mock segment.
#[derive(Debug, Default)]
pub struct MockSegment {
    bytes: RwLock<Vec<u8>>,
    faulted: AtomicBool,
}

impl MockSegment {
    /// Replace the whole segment contents.
    pub fn write(&self, bytes: Vec<u8>) {
        *self.bytes.write().unwrap_or_else(PoisonError::into_inner) = bytes;
    }

    /// Make every subsequent read through a bound view fail, as if the mapping
    /// had been torn down underneath the reader.
    pub fn set_faulted(&self, faulted: bool) {
        self.faulted.store(faulted, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Registry {
    segments: HashMap<String, Arc<MockSegment>>,
    denied: HashSet<String>,
    attempts: Vec<String>,
}

/// In-process [`SegmentBinder`].
///
/// Cloning shares the registry, so a test can keep one clone as the "producer"
/// and hand the other to a transport.
#[derive(Debug, Clone, Default)]
pub struct MockBinder {
    registry: Arc<Mutex<Registry>>,
    open_views: Arc<AtomicUsize>,
}

impl MockBinder {
    /// A binder with no segments: every bind reports the producer as absent.
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or replace) a named segment, as the producer does on startup.
    pub fn publish(&self, name: &str, bytes: Vec<u8>) -> Arc<MockSegment> {
        let segment = Arc::new(MockSegment { bytes: RwLock::new(bytes), ..Default::default() });
        self.registry().segments.insert(name.to_string(), Arc::clone(&segment));
        segment
    }

    /// Remove a named segment, as when the producer exits. Views that are
    /// already bound keep the old memory alive.
    pub fn remove(&self, name: &str) {
        self.registry().segments.remove(name);
    }

    /// Refuse access to `name` from now on.
    pub fn deny(&self, name: &str) {
        self.registry().denied.insert(name.to_string());
    }

    /// Names passed to [`SegmentBinder::open`], in call order.
    pub fn attempts(&self) -> Vec<String> {
        self.registry().attempts.clone()
    }

    /// Number of views currently bound and not yet released.
    pub fn open_views(&self) -> usize {
        self.open_views.load(Ordering::SeqCst)
    }
}

impl SegmentBinder for MockBinder {
    fn open(&self, name: &str, _access: AccessMode) -> Result<BoundSegment> {
        let segment = {
            let mut registry = self.registry();
            registry.attempts.push(name.to_string());

            let segment = registry
                .segments
                .get(name)
                .cloned()
                .ok_or_else(|| TelemetryError::unavailable(name))?;

            if registry.denied.contains(name) {
                return Err(TelemetryError::binding_failed(name, "open: access denied"));
            }
            segment
        };

        self.open_views.fetch_add(1, Ordering::SeqCst);
        let view = MockView { segment, open_views: Arc::clone(&self.open_views) };
        Ok(BoundSegment::new(name, Box::new(view)))
    }
}

struct MockView {
    segment: Arc<MockSegment>,
    open_views: Arc<AtomicUsize>,
}

impl SegmentView for MockView {
    fn len(&self) -> usize {
        self.segment.bytes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        if self.segment.faulted.load(Ordering::SeqCst) {
            return Err(TelemetryError::binding_failed("mock", "read: mapping lost"));
        }

        let bytes = self.segment.bytes.read().unwrap_or_else(PoisonError::into_inner);
        let src = bytes
            .get(offset..offset + dst.len())
            .ok_or(TelemetryError::Memory { offset, len: dst.len() })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl Drop for MockView {
    fn drop(&mut self) {
        self.open_views.fetch_sub(1, Ordering::SeqCst);
    }
}
