use memmap2::{MmapMut, MmapOptions};
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// A file-backed, shared, read-write memory mapping.
///
/// Dropping the value unmaps the region and closes the file.
pub struct MmapFileMut {
    _file: File,
    mmap: MmapMut,
}

impl MmapFileMut {
    /// Create a new file of `size_bytes` and map it read-write.
    ///
    /// An existing file at `path` is truncated first, so every byte of the
    /// mapping starts out zeroed.
    pub fn create_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        ensure_non_empty(size_bytes)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size_bytes)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Open `path`, creating it if missing, and map the first `size_bytes`
    /// read-write.
    ///
    /// Existing content is preserved. A shorter file is extended with
    /// `set_len`, which leaves the new tail sparse on filesystems that
    /// support it.
    pub fn create_or_open_rw<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        ensure_non_empty(size_bytes)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        if file.metadata()?.len() < size_bytes {
            file.set_len(size_bytes)?;
        }

        let mmap = unsafe { MmapOptions::new().len(size_bytes as usize).map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Open an existing file and map all of it read-write.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self { _file: file, mmap })
    }

    /// Open an existing file and map only `len` bytes starting at `offset`.
    ///
    /// The offset does not need to be page aligned. Fails with
    /// [`io::ErrorKind::UnexpectedEof`] when the file is too short to cover
    /// the span, since touching a page past the end of a file faults.
    pub fn open_span_rw<P: AsRef<Path>>(path: P, offset: u64, len: usize) -> io::Result<Self> {
        ensure_non_empty(len as u64)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < offset + len as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file is {file_len} bytes, span ends at {}", offset + len as u64),
            ));
        }

        let mmap = unsafe { MmapOptions::new().offset(offset).len(len).map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Return raw pointer to start of memory mapped file data
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    /// Return a read-only pointer to the start of the mapped data.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Flush dirty pages back to the file.
    pub fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}

// Zero-length mappings are rejected by the OS with an unhelpful error.
fn ensure_non_empty(size_bytes: u64) -> io::Result<()> {
    if size_bytes == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot map a zero-length region",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rw_zeroes_and_sizes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");

        let mm = MmapFileMut::create_rw(&path, 4096).unwrap();
        assert_eq!(mm.len(), 4096);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        let bytes = unsafe { std::slice::from_raw_parts(mm.as_ptr(), mm.len()) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn create_or_open_rw_preserves_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");

        let mut first = MmapFileMut::create_rw(&path, 64).unwrap();
        unsafe { first.as_mut_ptr().add(10).write(0xAB) };
        first.flush().unwrap();
        drop(first);

        let second = MmapFileMut::create_or_open_rw(&path, 128).unwrap();
        assert_eq!(second.len(), 128);
        assert_eq!(unsafe { second.as_ptr().add(10).read() }, 0xAB);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
    }

    #[test]
    fn open_span_rw_maps_unaligned_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");

        let mut whole = MmapFileMut::create_rw(&path, 8192).unwrap();
        unsafe { whole.as_mut_ptr().add(4100).write(7) };

        let span = MmapFileMut::open_span_rw(&path, 4100, 12).unwrap();
        assert_eq!(span.len(), 12);
        assert_eq!(unsafe { span.as_ptr().read() }, 7);
    }

    #[test]
    fn open_span_rw_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");
        MmapFileMut::create_rw(&path, 8).unwrap();

        let err = MmapFileMut::open_span_rw(&path, 0, 16).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn zero_length_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = MmapFileMut::create_rw(dir.path().join("region"), 0).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
