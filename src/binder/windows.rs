//! Named file mapping binder for Windows
//!
//! Opens the producer's mapping with `OpenFileMappingW` and maps a read-only
//! view of [`SEGMENT_SIZE`] bytes. The mapping handle and the view are owned by
//! one [`WindowsView`] and released together in its `Drop`.

use std::ptr::NonNull;

use tracing::trace;
use windows::Win32::Foundation::{CloseHandle, ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, HANDLE};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
};
use windows::core::PCWSTR;

use super::{AccessMode, BoundSegment, SegmentBinder, SegmentView};
use crate::layout::SEGMENT_SIZE;
use crate::{Result, TelemetryError};

/// [`SegmentBinder`] over Win32 named file mappings.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsBinder;

impl WindowsBinder {
    pub fn new() -> Self {
        Self
    }
}

impl SegmentBinder for WindowsBinder {
    fn open(&self, name: &str, access: AccessMode) -> Result<BoundSegment> {
        trace!(name, "Opening file mapping");
        let desired = match access {
            AccessMode::Read => FILE_MAP_READ,
        };

        let mapping = unsafe {
            let wide_name = wide_string(name);
            OpenFileMappingW(desired.0, false, PCWSTR::from_raw(wide_name.as_ptr())).map_err(
                |e| {
                    if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() {
                        TelemetryError::unavailable(name)
                    } else if e.code() == ERROR_ACCESS_DENIED.to_hresult() {
                        TelemetryError::binding_failed_with_source(
                            name,
                            "OpenFileMappingW: access denied",
                            Box::new(e),
                        )
                    } else {
                        TelemetryError::windows_api_error("OpenFileMappingW", e)
                    }
                },
            )?
        };

        let base = unsafe {
            let ptr = MapViewOfFile(mapping, desired, 0, 0, SEGMENT_SIZE);
            match NonNull::new(ptr.Value as *mut u8) {
                Some(base) => base,
                None => {
                    let win_err = windows::core::Error::from_thread();
                    let _ = CloseHandle(mapping);
                    return Err(TelemetryError::binding_failed_with_source(
                        name,
                        "MapViewOfFile",
                        Box::new(win_err),
                    ));
                }
            }
        };

        Ok(BoundSegment::new(name, Box::new(WindowsView { mapping, base, len: SEGMENT_SIZE })))
    }
}

/// Mapped view plus the mapping handle that owns it.
struct WindowsView {
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
}

impl SegmentView for WindowsView {
    fn len(&self) -> usize {
        self.len
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let end = offset.checked_add(dst.len()).filter(|end| *end <= self.len);
        if end.is_none() {
            return Err(TelemetryError::Memory { offset, len: dst.len() });
        }

        // SAFETY: the range was bounds-checked against the mapped length and the
        // view stays mapped until `self` is dropped.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.base.as_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }
}

impl Drop for WindowsView {
    fn drop(&mut self) {
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: the view is only ever read, and the handle is a kernel object that can
// be used from any thread.
unsafe impl Send for WindowsView {}
unsafe impl Sync for WindowsView {}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
