//! Binary layout of the two control fields inside a CnC region.
//!
//! # Memory Layout
//!
//! ```text
//! 0         V          V+4        T          T+8                  len
//! ┌─────────┬──────────┬──────────┬──────────┬────────────────────┐
//! │ payload │ version  │ payload  │timestamp │ payload            │
//! │  (any)  │ (i32)    │  (any)   │ (i64 ms) │  (owner-defined)   │
//! └─────────┴──────────┴──────────┴──────────┴────────────────────┘
//! ```
//!
//! Only `version` and `timestamp` have meaning to the handshake. The version
//! field must end at or before the start of the timestamp field.

use crate::buffer::AtomicBuffer;
use crate::error::CncError;

/// Size in bytes of the version field.
pub const SIZE_OF_VERSION: usize = size_of::<i32>();

/// Size in bytes of the timestamp field.
pub const SIZE_OF_TIMESTAMP: usize = size_of::<i64>();

/// Byte offsets of the version and timestamp fields.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ControlLayout {
    version_offset: usize,
    timestamp_offset: usize,
}

impl ControlLayout {
    /// Creates a layout, rejecting offsets where the version field would
    /// overlap or follow the timestamp field.
    ///
    /// # Example
    /// ```
    /// use vigil_cnc::ControlLayout;
    /// assert!(ControlLayout::new(0, 8).is_ok());
    /// assert!(ControlLayout::new(8, 8).is_err());
    /// ```
    pub fn new(version_offset: usize, timestamp_offset: usize) -> Result<Self, CncError> {
        match version_offset.checked_add(SIZE_OF_VERSION) {
            Some(end) if end <= timestamp_offset => Ok(Self {
                version_offset,
                timestamp_offset,
            }),
            _ => Err(CncError::InvalidOffsets {
                version_offset,
                timestamp_offset,
            }),
        }
    }

    #[inline]
    pub fn version_offset(&self) -> usize {
        self.version_offset
    }

    #[inline]
    pub fn timestamp_offset(&self) -> usize {
        self.timestamp_offset
    }

    /// Smallest region length that holds both fields.
    #[inline]
    pub fn required_len(&self) -> usize {
        self.timestamp_offset + SIZE_OF_TIMESTAMP
    }

    /// Byte span `(offset, len)` covering both fields and nothing before them.
    pub(crate) fn control_span(&self) -> (usize, usize) {
        (
            self.version_offset,
            self.required_len() - self.version_offset,
        )
    }

    /// The same layout relative to a mapping of [`Self::control_span`].
    pub(crate) fn rebased(&self) -> Self {
        Self {
            version_offset: 0,
            timestamp_offset: self.timestamp_offset - self.version_offset,
        }
    }

    /// Checks that `buffer` is long enough and that both fields land on
    /// naturally aligned addresses, as atomic access requires.
    pub fn check(&self, buffer: &AtomicBuffer) -> Result<(), CncError> {
        self.verify(buffer.capacity(), |offset, align| {
            buffer.is_aligned(offset, align)
        })
    }

    /// Same as [`Self::check`] for a page-aligned mapping of `len` bytes that
    /// does not exist yet.
    pub(crate) fn check_mapped_len(&self, len: usize) -> Result<(), CncError> {
        self.verify(len, |offset, align| offset % align == 0)
    }

    fn verify(
        &self,
        len: usize,
        is_aligned: impl Fn(usize, usize) -> bool,
    ) -> Result<(), CncError> {
        if len < self.required_len() {
            return Err(CncError::RegionTooSmall {
                len,
                required: self.required_len(),
            });
        }
        if !is_aligned(self.version_offset, SIZE_OF_VERSION) {
            return Err(CncError::Misaligned {
                field: "version",
                offset: self.version_offset,
                align: SIZE_OF_VERSION,
            });
        }
        if !is_aligned(self.timestamp_offset, SIZE_OF_TIMESTAMP) {
            return Err(CncError::Misaligned {
                field: "timestamp",
                offset: self.timestamp_offset,
                align: SIZE_OF_TIMESTAMP,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_fields_are_valid() {
        let layout = ControlLayout::new(4, 8).unwrap();
        assert_eq!(layout.required_len(), 16);
        assert_eq!(layout.control_span(), (4, 12));
        assert_eq!(layout.rebased(), ControlLayout::new(0, 4).unwrap());
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let err = ControlLayout::new(6, 8).unwrap_err();
        assert!(err.is_configuration());
        assert!(ControlLayout::new(16, 0).is_err());
    }

    #[test]
    fn offset_overflow_is_rejected() {
        assert!(ControlLayout::new(usize::MAX - 1, usize::MAX).is_err());
    }

    #[test]
    fn check_reports_short_and_misaligned_regions() {
        let mut words = [0u64; 4];
        let buffer = unsafe { AtomicBuffer::from_raw_parts(words.as_mut_ptr().cast(), 32) };

        assert!(ControlLayout::new(0, 8).unwrap().check(&buffer).is_ok());
        assert!(matches!(
            ControlLayout::new(0, 28).unwrap().check(&buffer),
            Err(CncError::RegionTooSmall { required: 36, .. })
        ));
        assert!(matches!(
            ControlLayout::new(2, 8).unwrap().check(&buffer),
            Err(CncError::Misaligned { field: "version", .. })
        ));
        assert!(matches!(
            ControlLayout::new(0, 12).unwrap().check(&buffer),
            Err(CncError::Misaligned { field: "timestamp", .. })
        ));
    }

    #[test]
    fn mapped_len_check_uses_offsets() {
        let layout = ControlLayout::new(4, 16).unwrap();
        assert!(layout.check_mapped_len(24).is_ok());
        assert!(layout.check_mapped_len(23).is_err());
        assert!(ControlLayout::new(4, 12).unwrap().check_mapped_len(4096).is_err());
    }
}
