//! Typed access to the version and timestamp control fields.
//!
//! # Protocol
//!
//! **Owner:**
//! 1. Write the payload
//! 2. `write_version_ordered(v)` (release) → publishes everything above
//! 3. Repeatedly `write_timestamp_ordered(now)` (release) as the heartbeat
//!
//! **Watcher:**
//! 1. `read_version_acquire()`; zero means the owner has not published yet
//! 2. `read_timestamp_acquire()`; the age of this value decides liveness

use crate::buffer::AtomicBuffer;
use crate::layout::ControlLayout;

/// The two control fields of a region, bound to a layout.
///
/// Construct through [`ControlFields::new`] after the layout has been checked
/// against the buffer; the accessors panic otherwise.
#[derive(Debug, Copy, Clone)]
pub struct ControlFields<'a> {
    buffer: &'a AtomicBuffer,
    layout: ControlLayout,
}

impl<'a> ControlFields<'a> {
    #[inline]
    pub fn new(buffer: &'a AtomicBuffer, layout: ControlLayout) -> Self {
        Self { buffer, layout }
    }

    /// Publishes `version`. Must be the last step of owner initialization.
    #[inline]
    pub fn write_version_ordered(&self, version: i32) {
        self.buffer
            .put_i32_ordered(self.layout.version_offset(), version);
    }

    #[inline]
    pub fn read_version_acquire(&self) -> i32 {
        self.buffer.get_i32_volatile(self.layout.version_offset())
    }

    #[inline]
    pub fn read_version_plain(&self) -> i32 {
        self.buffer.get_i32(self.layout.version_offset())
    }

    /// Stores a heartbeat in epoch milliseconds.
    #[inline]
    pub fn write_timestamp_ordered(&self, timestamp_ms: i64) {
        self.buffer
            .put_i64_ordered(self.layout.timestamp_offset(), timestamp_ms);
    }

    #[inline]
    pub fn read_timestamp_acquire(&self) -> i64 {
        self.buffer.get_i64_volatile(self.layout.timestamp_offset())
    }

    #[inline]
    pub fn read_timestamp_plain(&self) -> i64 {
        self.buffer.get_i64(self.layout.timestamp_offset())
    }
}
