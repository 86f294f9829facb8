//! Atomic word access over a raw, shared byte region.
//!
//! The region usually lives in a memory-mapped file that other processes map
//! at the same time, so every access goes through an atomic type:
//!
//! - **ordered** stores use `Release`: everything the writer stored before
//!   becomes visible to a reader that observes the new value.
//! - **volatile** loads use `Acquire`: pairs with an ordered store.
//! - **plain** (weak) loads and stores use `Relaxed`: no ordering, but never
//!   torn.
//!
//! Payload bytes are copied one `AtomicU8` at a time so that a concurrent
//! writer in another thread is a benign race rather than undefined behaviour.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU8, Ordering};

/// A view over `capacity` bytes of shared memory.
///
/// The view does not own the memory. Whoever builds it guarantees the memory
/// outlives every use of the view.
#[derive(Debug)]
pub struct AtomicBuffer {
    base: NonNull<u8>,
    capacity: usize,
}

// SAFETY: all access to the region goes through atomics.
unsafe impl Send for AtomicBuffer {}
unsafe impl Sync for AtomicBuffer {}

impl AtomicBuffer {
    /// Wraps `capacity` bytes starting at `base`.
    ///
    /// # Safety
    /// `base` must be non-null and valid for reads and writes of `capacity`
    /// bytes for as long as the returned buffer (or anything holding it) is
    /// used. The memory must not be accessed non-atomically by other threads
    /// of this process while the buffer is in use.
    pub unsafe fn from_raw_parts(base: *mut u8, capacity: usize) -> Self {
        Self {
            // SAFETY: non-null is part of the caller's contract.
            base: unsafe { NonNull::new_unchecked(base) },
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the address at `offset` is a multiple of `align`.
    #[inline]
    pub fn is_aligned(&self, offset: usize, align: usize) -> bool {
        (self.base.as_ptr() as usize).wrapping_add(offset) % align == 0
    }

    #[inline(always)]
    fn bounds_check(&self, offset: usize, len: usize, align: usize) {
        assert!(
            offset
                .checked_add(len)
                .is_some_and(|end| end <= self.capacity),
            "access of {len} bytes at offset {offset} exceeds capacity {}",
            self.capacity
        );
        assert!(
            self.is_aligned(offset, align),
            "offset {offset} is not {align}-byte aligned"
        );
    }

    #[inline(always)]
    fn i32_at(&self, offset: usize) -> &AtomicI32 {
        self.bounds_check(offset, size_of::<i32>(), align_of::<AtomicI32>());
        // SAFETY: in bounds and aligned (checked above); the region is valid
        // for the lifetime of `self` per the constructor contract.
        unsafe { AtomicI32::from_ptr(self.base.as_ptr().add(offset).cast()) }
    }

    #[inline(always)]
    fn i64_at(&self, offset: usize) -> &AtomicI64 {
        self.bounds_check(offset, size_of::<i64>(), align_of::<AtomicI64>());
        // SAFETY: as for `i32_at`.
        unsafe { AtomicI64::from_ptr(self.base.as_ptr().add(offset).cast()) }
    }

    /// Relaxed load of an `i32`.
    ///
    /// # Panics
    /// Panics if the field is out of bounds or misaligned; the same holds for
    /// every typed accessor.
    #[inline]
    pub fn get_i32(&self, offset: usize) -> i32 {
        self.i32_at(offset).load(Ordering::Relaxed)
    }

    /// Acquire load of an `i32`.
    #[inline]
    pub fn get_i32_volatile(&self, offset: usize) -> i32 {
        self.i32_at(offset).load(Ordering::Acquire)
    }

    /// Relaxed store of an `i32`.
    #[inline]
    pub fn put_i32(&self, offset: usize, value: i32) {
        self.i32_at(offset).store(value, Ordering::Relaxed);
    }

    /// Release store of an `i32`.
    #[inline]
    pub fn put_i32_ordered(&self, offset: usize, value: i32) {
        self.i32_at(offset).store(value, Ordering::Release);
    }

    #[inline]
    pub fn get_i64(&self, offset: usize) -> i64 {
        self.i64_at(offset).load(Ordering::Relaxed)
    }

    #[inline]
    pub fn get_i64_volatile(&self, offset: usize) -> i64 {
        self.i64_at(offset).load(Ordering::Acquire)
    }

    #[inline]
    pub fn put_i64(&self, offset: usize, value: i64) {
        self.i64_at(offset).store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn put_i64_ordered(&self, offset: usize, value: i64) {
        self.i64_at(offset).store(value, Ordering::Release);
    }

    /// Copies `src` into the region at `offset`.
    pub fn put_bytes(&self, offset: usize, src: &[u8]) {
        self.bounds_check(offset, src.len(), 1);
        for (i, byte) in src.iter().enumerate() {
            // SAFETY: `offset + i` is in bounds (checked above).
            let cell = unsafe { AtomicU8::from_ptr(self.base.as_ptr().add(offset + i)) };
            cell.store(*byte, Ordering::Relaxed);
        }
    }

    /// Copies `dst.len()` bytes at `offset` out of the region.
    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.bounds_check(offset, dst.len(), 1);
        for (i, byte) in dst.iter_mut().enumerate() {
            // SAFETY: `offset + i` is in bounds (checked above).
            let cell = unsafe { AtomicU8::from_ptr(self.base.as_ptr().add(offset + i)) };
            *byte = cell.load(Ordering::Relaxed);
        }
    }
}
