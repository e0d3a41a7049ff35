//! The heap-extender collaborator (spec.md §6).
//!
//! The core allocator never owns memory directly; it grows a single
//! contiguous arena by asking a [`HeapExtender`] for more bytes at its high
//! end. Production embedders back this with whatever grows their process
//! heap (a kernel's page allocator, `sbrk`, a `mmap`'d region, ...); this
//! crate ships [`StaticExtender`], a fixed-capacity backing buffer, as the
//! reference implementation used by the test suite and by callers who don't
//! need anything fancier.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use super::error::ExtendError;

/// Grows a contiguous arena and reports its current bounds.
///
/// # Safety
///
/// Implementors must uphold two contracts the allocator core relies on
/// without re-checking:
///
/// - Successive calls to `extend` return disjoint, contiguous regions that
///   immediately follow the previously returned region (the arena only
///   grows at its high end, per spec.md §3).
/// - `heap_lo()` and `heap_hi()` always bound every byte ever handed out by
///   `extend`.
pub unsafe trait HeapExtender {
    /// Grows the arena by `bytes` and returns a pointer to the start of the
    /// newly appended region.
    fn extend(&mut self, bytes: usize) -> Result<NonNull<u8>, ExtendError>;

    /// Lowest address in the current arena.
    fn heap_lo(&self) -> *const u8;

    /// Highest address in the current arena (one past the last valid byte).
    fn heap_hi(&self) -> *const u8;
}

/// A [`HeapExtender`] backed by a fixed-size buffer owned by the struct
/// itself.
///
/// `extend` hands out successive slices of `storage` until `CAP` bytes have
/// been claimed, then reports [`ExtendError::Exhausted`] forever after —
/// this crate's non-goal list excludes returning memory to the operating
/// system, so there is never a reason to reclaim past the high-water mark.
pub struct StaticExtender<const CAP: usize> {
    storage: UnsafeCell<[MaybeUninit<u8>; CAP]>,
    used: usize,
}

impl<const CAP: usize> StaticExtender<CAP> {
    /// Creates an extender with no bytes handed out yet.
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new([MaybeUninit::uninit(); CAP]),
            used: 0,
        }
    }
}

impl<const CAP: usize> Default for StaticExtender<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `storage` never moves once the extender is created (callers must
// pin or simply not relocate a live `StaticExtender`), and `extend` only
// ever grows `used` monotonically over disjoint, contiguous ranges.
unsafe impl<const CAP: usize> HeapExtender for StaticExtender<CAP> {
    fn extend(&mut self, bytes: usize) -> Result<NonNull<u8>, ExtendError> {
        let new_used = self.used.checked_add(bytes).ok_or(ExtendError::Exhausted)?;
        if new_used > CAP {
            return Err(ExtendError::Exhausted);
        }

        let base = self.storage.get() as *mut u8;
        // SAFETY: `self.used` is in bounds of `storage` by the invariant
        // maintained below.
        let region = unsafe { base.add(self.used) };
        self.used = new_used;

        NonNull::new(region).ok_or(ExtendError::Exhausted)
    }

    fn heap_lo(&self) -> *const u8 {
        self.storage.get() as *const u8
    }

    fn heap_hi(&self) -> *const u8 {
        // SAFETY: offsetting to one-past-the-end of `storage` is in bounds
        // for a pointer computation (never dereferenced at that address).
        unsafe { (self.storage.get() as *const u8).add(CAP) }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn hands_out_contiguous_growing_regions() {
        let mut ext = StaticExtender::<4096>::new();
        let a = ext.extend(256).unwrap();
        let b = ext.extend(256).unwrap();
        // SAFETY: both regions are within the 4096-byte backing buffer.
        unsafe {
            assert_eq!(a.as_ptr().add(256), b.as_ptr());
        }
    }

    #[test]
    fn reports_exhaustion_past_capacity() {
        let mut ext = StaticExtender::<64>::new();
        assert!(ext.extend(32).is_ok());
        assert_eq!(ext.extend(64), Err(ExtendError::Exhausted));
    }

    #[test]
    fn bounds_contain_every_handed_out_byte() {
        let mut ext = StaticExtender::<1024>::new();
        let p = ext.extend(128).unwrap();
        assert!(p.as_ptr() as *const u8 >= ext.heap_lo());
        // SAFETY: pointer arithmetic only, never dereferenced past bounds.
        unsafe {
            assert!(p.as_ptr().add(128) as *const u8 <= ext.heap_hi());
        }
    }
}
