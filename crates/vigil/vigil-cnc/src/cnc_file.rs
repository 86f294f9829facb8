//! The managed handle returned by every discovery strategy.

use crate::buffer::AtomicBuffer;
use crate::error::CncError;
use crate::fields::ControlFields;
use crate::handshake::Handshake;
use crate::layout::ControlLayout;
use crate::lifecycle::delete_directory;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use vigil_mmap::MmapFileMut;

/// Who keeps the memory behind a region alive.
enum Backing {
    /// Mapped by this crate; unmapped when the handle closes.
    Owned(MmapFileMut),
    /// Mapped by the caller; the handle only drops its own reference.
    Shared(#[allow(dead_code)] Arc<MmapFileMut>),
    /// Raw memory the caller guarantees outlives the handle.
    External,
}

pub(crate) struct Region {
    buffer: AtomicBuffer,
    backing: Backing,
}

impl Region {
    pub(crate) fn owned(mut mapping: MmapFileMut) -> Self {
        // SAFETY: the mapping is moved into `backing` and lives as long as
        // the buffer; moving the value does not move the mapped pages.
        let buffer = unsafe { AtomicBuffer::from_raw_parts(mapping.as_mut_ptr(), mapping.len()) };
        Self {
            buffer,
            backing: Backing::Owned(mapping),
        }
    }

    fn shared(mapping: Arc<MmapFileMut>) -> Self {
        // SAFETY: the Arc clone held in `backing` keeps the pages mapped, and
        // every access through the buffer is atomic.
        let buffer =
            unsafe { AtomicBuffer::from_raw_parts(mapping.as_ptr().cast_mut(), mapping.len()) };
        Self {
            buffer,
            backing: Backing::Shared(mapping),
        }
    }

    pub(crate) fn buffer(&self) -> &AtomicBuffer {
        &self.buffer
    }
}

/// A CnC region together with its control layout.
///
/// The owner calls [`signal_ready`](Self::signal_ready) once its payload is
/// written and then [`timestamp_ordered`](Self::timestamp_ordered) on its
/// heartbeat cadence. Watchers read the same fields, usually from a handle
/// obtained through [`Handshake::open_existing`].
///
/// # Thread Safety
/// `CncFile` is `Send + Sync`. Closing races safely with other threads: an
/// accessor either sees the region or returns [`CncError::Closed`].
pub struct CncFile {
    layout: ControlLayout,
    directory: Option<PathBuf>,
    file: Option<PathBuf>,
    region: RwLock<Option<Region>>,
    closed: AtomicBool,
}

impl CncFile {
    pub(crate) fn new(
        region: Region,
        layout: ControlLayout,
        directory: Option<PathBuf>,
        file: Option<PathBuf>,
    ) -> Result<Self, CncError> {
        layout.check(region.buffer())?;
        Ok(Self {
            layout,
            directory,
            file,
            region: RwLock::new(Some(region)),
            closed: AtomicBool::new(false),
        })
    }

    /// Manages a mapping created elsewhere, without any discovery.
    ///
    /// The handle keeps a reference to the mapping; closing it releases that
    /// reference only, so the caller's `Arc` stays usable.
    pub fn from_mapping(mapping: Arc<MmapFileMut>, layout: ControlLayout) -> Result<Self, CncError> {
        Self::new(Region::shared(mapping), layout, None, None)
    }

    /// Manages raw memory described by `buffer`, without any discovery.
    /// Closing never touches the memory.
    pub fn from_buffer(buffer: AtomicBuffer, layout: ControlLayout) -> Result<Self, CncError> {
        let region = Region {
            buffer,
            backing: Backing::External,
        };
        Self::new(region, layout, None, None)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the handle, unmapping the region if the handle owns it.
    ///
    /// Safe to call any number of times from any thread; only the first call
    /// releases the region.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if let Some(region) = self.region.write().take() {
            if let Backing::Owned(mapping) = &region.backing {
                tracing::debug!(len = mapping.len(), file = ?self.file, "unmapping cnc file");
            }
        }
    }

    fn with_fields<R>(&self, f: impl FnOnce(ControlFields<'_>) -> R) -> Result<R, CncError> {
        let guard = self.region.read();
        let region = guard.as_ref().ok_or(CncError::Closed)?;
        Ok(f(ControlFields::new(region.buffer(), self.layout)))
    }

    /// Publishes `version` with release ordering. Every write made before this
    /// call is visible to a watcher that reads the new version.
    pub fn signal_ready(&self, version: i32) -> Result<(), CncError> {
        self.with_fields(|fields| fields.write_version_ordered(version))
    }

    pub fn version_volatile(&self) -> Result<i32, CncError> {
        self.with_fields(|fields| fields.read_version_acquire())
    }

    pub fn version_weak(&self) -> Result<i32, CncError> {
        self.with_fields(|fields| fields.read_version_plain())
    }

    /// Stores a heartbeat with release ordering.
    pub fn timestamp_ordered(&self, timestamp_ms: i64) -> Result<(), CncError> {
        self.with_fields(|fields| fields.write_timestamp_ordered(timestamp_ms))
    }

    pub fn timestamp_volatile(&self) -> Result<i64, CncError> {
        self.with_fields(|fields| fields.read_timestamp_acquire())
    }

    pub fn timestamp_weak(&self) -> Result<i64, CncError> {
        self.with_fields(|fields| fields.read_timestamp_plain())
    }

    /// Runs the liveness decision of `handshake` against this region, using
    /// the handle's own layout. A closed handle is inactive.
    ///
    /// Blocks [`close`](Self::close) on other threads while waiting.
    pub fn is_active(&self, handshake: &Handshake) -> Result<bool, CncError> {
        let guard = self.region.read();
        match guard.as_ref() {
            None => Ok(false),
            Some(region) => handshake.is_active_with(region.buffer(), self.layout),
        }
    }

    /// The whole region, for payload access.
    pub fn buffer(&self) -> Result<MappedRwLockReadGuard<'_, AtomicBuffer>, CncError> {
        RwLockReadGuard::try_map(self.region.read(), |region| region.as_ref().map(Region::buffer))
            .map_err(|_| CncError::Closed)
    }

    #[inline]
    pub fn layout(&self) -> ControlLayout {
        self.layout
    }

    /// Directory holding the CnC file, when the handle came from a path.
    pub fn cnc_directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn cnc_file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Removes the CnC directory and everything in it. A handle without a
    /// directory has nothing to delete.
    pub fn delete_directory(&self, ignore_failures: bool) -> Result<(), CncError> {
        match &self.directory {
            Some(directory) => delete_directory(directory, ignore_failures),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for CncFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CncFile")
            .field("layout", &self.layout)
            .field("file", &self.file)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
