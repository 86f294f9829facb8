//! Creating, adopting and discovering CnC files.
//!
//! Three mutually exclusive strategies, all methods on [`Handshake`]:
//!
//! - [`create_in_directory`](Handshake::create_in_directory): the owner starts
//!   from a clean directory, refusing to clobber a live owner.
//! - [`create_or_adopt`](Handshake::create_or_adopt): the owner reuses a file
//!   in place, refusing if its heartbeat is still fresh.
//! - [`open_existing`](Handshake::open_existing): a watcher waits for a live,
//!   published file.
//!
//! The liveness check before deleting or adopting is advisory. Two owners
//! starting at the same instant can both pass it.

use crate::cnc_file::{CncFile, Region};
use crate::error::CncError;
use crate::fields::ControlFields;
use crate::handshake::Handshake;
use crate::liveness::{heartbeat_age, heartbeat_blocks_adoption};
use crate::poll::{FILE_POLL_INTERVAL, poll_until_deadline};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use vigil_mmap::MmapFileMut;

impl Handshake {
    /// Creates `directory/filename` from scratch and maps `total_file_length`
    /// bytes read-write.
    ///
    /// If `directory` already exists it is deleted first. Unless
    /// `dir_delete_on_start` is set, the existing file is checked for a live
    /// owner beforehand and [`CncError::ActiveOwner`] is returned, leaving the
    /// directory untouched, if one is found.
    ///
    /// The version field of the new file reads zero until the owner calls
    /// [`CncFile::signal_ready`].
    pub fn create_in_directory(
        &self,
        directory: impl AsRef<Path>,
        filename: &str,
        total_file_length: usize,
        dir_delete_on_start: bool,
    ) -> Result<CncFile, CncError> {
        self.layout.check_mapped_len(total_file_length)?;
        let directory = directory.as_ref();

        self.ensure_directory_exists(directory, filename, dir_delete_on_start)?;

        let path = directory.join(filename);
        let mapping = MmapFileMut::create_rw(&path, total_file_length as u64)
            .map_err(|source| CncError::io("create cnc file", &path, source))?;
        tracing::debug!(path = %path.display(), len = total_file_length, "mapped new cnc file");

        CncFile::new(
            Region::owned(mapping),
            self.layout,
            Some(directory.to_path_buf()),
            Some(path),
        )
    }

    /// Opens or creates `path` and maps `total_file_length` bytes read-write,
    /// keeping whatever the file already holds.
    ///
    /// With `should_pre_exist`, the current fields are read once without
    /// waiting: a non-zero version must pass the version check, and a
    /// heartbeat younger than the timeout fails with
    /// [`CncError::ActiveOwner`]. A stale or never-initialised file is
    /// returned as-is for the caller to reinitialise.
    pub fn create_or_adopt(
        &self,
        path: impl AsRef<Path>,
        total_file_length: usize,
        should_pre_exist: bool,
    ) -> Result<CncFile, CncError> {
        self.layout.check_mapped_len(total_file_length)?;
        let path = path.as_ref();

        // On any early return below the region is dropped, which unmaps it.
        let mapping = MmapFileMut::create_or_open_rw(path, total_file_length as u64)
            .map_err(|source| CncError::io("map cnc file", path, source))?;
        let region = Region::owned(mapping);
        self.layout.check(region.buffer())?;

        if should_pre_exist {
            self.log(|| format!("cnc file exists: {}", path.display()));
            let fields = ControlFields::new(region.buffer(), self.layout);

            let version = fields.read_version_acquire();
            if version != 0 {
                self.version_check.check(version)?;
            }

            let timestamp = fields.read_timestamp_acquire();
            let age_ms = heartbeat_age(self.clock.time(), timestamp);
            self.log(|| format!("heartbeat age is {age_ms} ms"));

            if timestamp != 0 && heartbeat_blocks_adoption(age_ms, self.timeout_ms) {
                return Err(CncError::ActiveOwner {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), version, age_ms, "adopting stale cnc file");
        }

        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf);
        CncFile::new(region, self.layout, directory, Some(path.to_path_buf()))
    }

    /// Waits for `directory/filename` to be created, published and
    /// heartbeating, then returns a handle on it.
    ///
    /// The three waits (file, version, heartbeat) share one deadline, the
    /// timeout measured from entry. Fails
    /// with [`CncError::FileNotFound`], [`CncError::NotInitialized`] or
    /// [`CncError::NoHeartbeat`] respectively, or with the version check's
    /// error.
    pub fn open_existing(
        &self,
        directory: impl AsRef<Path>,
        filename: &str,
    ) -> Result<CncFile, CncError> {
        let directory = directory.as_ref();
        let path = directory.join(filename);

        let deadline_ms = self.deadline_ms(self.timeout_ms);
        // A file shorter than the control fields is still being sized by its owner.
        let required = self.layout.required_len() as u64;
        poll_until_deadline(self.clock.as_ref(), deadline_ms, FILE_POLL_INTERVAL, || {
            fs::metadata(&path)
                .ok()
                .filter(|metadata| metadata.len() >= required)
        })
        .ok_or_else(|| CncError::FileNotFound { path: path.clone() })?;
        self.log(|| format!("cnc file exists: {}", path.display()));

        let mapping =
            MmapFileMut::open_rw(&path).map_err(|source| CncError::io("map cnc file", &path, source))?;
        let region = Region::owned(mapping);
        self.layout.check(region.buffer())?;

        let fields = ControlFields::new(region.buffer(), self.layout);
        let version = self.await_version(fields, deadline_ms)?;
        self.version_check.check(version)?;
        let timestamp = self.await_timestamp(fields, deadline_ms)?;
        tracing::debug!(path = %path.display(), version, timestamp, "attached to cnc file");

        CncFile::new(region, self.layout, Some(directory.to_path_buf()), Some(path))
    }

    fn ensure_directory_exists(
        &self,
        directory: &Path,
        filename: &str,
        dir_delete_on_start: bool,
    ) -> Result<(), CncError> {
        if directory.is_dir() {
            if self.warn_if_directory_exists {
                tracing::warn!(directory = %directory.display(), "cnc directory already exists");
                self.log(|| format!("WARNING: {} already exists", directory.display()));
            }

            if !dir_delete_on_start {
                let path = directory.join(filename);
                if let Some(span) = self.map_control_span(&path) {
                    let layout = self.layout.rebased();
                    layout.check(span.buffer())?;
                    if self.is_active_with(span.buffer(), layout)? {
                        return Err(CncError::ActiveOwner { path });
                    }
                }
            }

            delete_directory(directory, false)?;
        }

        fs::create_dir_all(directory)
            .map_err(|source| CncError::io("create cnc directory", directory, source))
    }

    /// Maps just the bytes holding the two control fields of an existing file.
    /// `None` when there is no file or it cannot be mapped; either way there
    /// is no live owner to protect.
    fn map_control_span(&self, path: &Path) -> Option<Region> {
        if !path.exists() {
            return None;
        }
        self.log(|| format!("cnc file exists: {}", path.display()));

        let (offset, len) = self.layout.control_span();
        match MmapFileMut::open_span_rw(path, offset as u64, len) {
            Ok(mapping) => Some(Region::owned(mapping)),
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "cannot map cnc control fields");
                None
            }
        }
    }
}

/// Recursively deletes `directory`. A missing directory is not an error.
pub(crate) fn delete_directory(directory: &Path, ignore_failures: bool) -> Result<(), CncError> {
    match fs::remove_dir_all(directory) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) if ignore_failures => {
            tracing::debug!(directory = %directory.display(), %error, "ignoring failed delete");
            Ok(())
        }
        Err(source) => Err(CncError::io(
            "delete cnc directory",
            PathBuf::from(directory),
            source,
        )),
    }
}
