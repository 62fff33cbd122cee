//! `/dev/shm` binder
//!
//! When the game runs under Wine or Proton, a bridge process mirrors the
//! producer's named mappings into files under `/dev/shm` using the same names.
//! This binder maps those files read-only.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::trace;

use super::{AccessMode, BoundSegment, SegmentBinder, SegmentView};
use crate::layout::SEGMENT_SIZE;
use crate::{Result, TelemetryError};

/// [`SegmentBinder`] over files in a shared memory directory.
#[derive(Debug, Clone)]
pub struct UnixBinder {
    dir: PathBuf,
}

impl UnixBinder {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }
}

impl SegmentBinder for UnixBinder {
    fn open(&self, name: &str, access: AccessMode) -> Result<BoundSegment> {
        let path = self.dir.join(name);
        trace!(path = %path.display(), "Opening shared memory file");

        let file = match access {
            AccessMode::Read => File::open(&path),
        }
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => TelemetryError::unavailable(name),
            _ => TelemetryError::binding_failed_with_source(name, "open", Box::new(e)),
        })?;

        let file_len = file
            .metadata()
            .map_err(|e| TelemetryError::binding_failed_with_source(name, "metadata", Box::new(e)))?
            .len();
        if file_len < SEGMENT_SIZE as u64 {
            return Err(TelemetryError::binding_failed(
                name,
                format!("segment is {} bytes, expected {}", file_len, SEGMENT_SIZE),
            ));
        }

        // SAFETY: the map is read-only. The producer may write concurrently;
        // readers copy bytes out and validate them.
        let map = unsafe { MmapOptions::new().len(SEGMENT_SIZE).map(&file) }
            .map_err(|e| TelemetryError::binding_failed_with_source(name, "mmap", Box::new(e)))?;

        Ok(BoundSegment::new(name, Box::new(UnixView { map })))
    }
}

struct UnixView {
    map: Mmap,
}

impl SegmentView for UnixView {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let src = self
            .map
            .get(offset..offset + dst.len())
            .ok_or(TelemetryError::Memory { offset, len: dst.len() })?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SegmentFixture;

    #[test]
    fn maps_segment_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("$rFactor2SMMP_Telemetry$"), SegmentFixture::driving().build())
            .unwrap();

        let segment = UnixBinder::new(dir.path())
            .try_bind("$rFactor2SMMP_Telemetry$", AccessMode::Read)
            .unwrap();
        assert_eq!(segment.len(), SEGMENT_SIZE);
        assert_eq!(segment.read_u32(0).unwrap(), 1125);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = UnixBinder::new(dir.path()).open("absent", AccessMode::Read).unwrap_err();
        assert!(matches!(err, TelemetryError::Unavailable { .. }));
    }

    #[test]
    fn truncated_file_is_a_binding_fault() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("short"), vec![1u8; 128]).unwrap();
        let err = UnixBinder::new(dir.path()).open("short", AccessMode::Read).unwrap_err();
        assert!(matches!(err, TelemetryError::Binding { .. }));
    }

    #[test]
    fn zeroed_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("menu"), SegmentFixture::empty().build()).unwrap();
        let err = UnixBinder::new(dir.path()).try_bind("menu", AccessMode::Read).unwrap_err();
        assert!(matches!(err, TelemetryError::NoData));
    }
}
