//! Optional [`GlobalAlloc`] wrapper, gated behind the `global` feature.
//!
//! Grounded on the teacher's `mem::vmalloc::mod`'s `KERNEL_HEAP_ALLOCATOR`
//! static plus `SyncKernelHeapAllocator`, and on `mem::bmalloc::heap`'s
//! `LockedBuddyAllocator`: a lazily-initialized, `spin`-locked allocator
//! behind a `conquer_once` cell, so the allocator itself stays free of any
//! synchronization concern (spec.md §5 keeps thread safety external).

use core::alloc::{GlobalAlloc, Layout};

use conquer_once::spin::OnceCell;
use spin::Mutex;

use super::error::InitError;
use super::extender::HeapExtender;
use super::heap::Allocator;

/// A [`GlobalAlloc`]-compatible allocator, usable as `#[global_allocator]`.
///
/// Must be initialized with [`GlobalTagAllocator::init`] before any
/// allocation request reaches it; every method panics otherwise, the same
/// contract the teacher's `SyncKernelHeapAllocator` places on
/// `KERNEL_HEAP_ALLOCATOR`.
pub struct GlobalTagAllocator<E: HeapExtender> {
    inner: OnceCell<Mutex<Allocator<E>>>,
}

impl<E: HeapExtender> GlobalTagAllocator<E> {
    /// Creates an uninitialized global allocator. Safe to use in a
    /// `static` initializer.
    pub const fn uninit() -> Self {
        Self {
            inner: OnceCell::uninit(),
        }
    }

    /// Initializes the underlying allocator over `extender`. Calling this
    /// more than once is a no-op after the first successful call.
    pub fn init(&self, extender: E) -> Result<(), InitError> {
        let mut alloc = Allocator::new(extender);
        alloc.init()?;
        // A second caller racing `init` simply loses; the first one's
        // allocator wins and the second's is dropped.
        let _ = self.inner.try_init_once(|| Mutex::new(alloc));
        Ok(())
    }

    fn locked(&self) -> &Mutex<Allocator<E>> {
        self.inner
            .get()
            .expect("GlobalTagAllocator::init was not called before first use")
    }
}

// SAFETY: every operation takes the inner `spin::Mutex` before touching the
// allocator, and `Allocator::malloc`/`free`/`realloc` uphold `GlobalAlloc`'s
// contract (a returned pointer is either null or valid for `layout`, freeing
// a pointer not previously returned is undefined behavior on either side).
unsafe impl<E: HeapExtender> GlobalAlloc for GlobalTagAllocator<E> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.locked().lock().malloc(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.locked().lock().free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        self.locked().lock().realloc(ptr, new_size as isize)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::alloc::extender::StaticExtender;

    #[test]
    fn allocates_and_frees_through_the_global_alloc_trait() {
        let global = GlobalTagAllocator::<StaticExtender<65536>>::uninit();
        global.init(StaticExtender::new()).unwrap();

        let layout = Layout::from_size_align(64, 8).unwrap();
        // SAFETY: `layout` is well-formed and `global` was just initialized.
        unsafe {
            let p = global.alloc(layout);
            assert!(!p.is_null());
            global.dealloc(p, layout);
        }
    }

    #[test]
    #[should_panic(expected = "init was not called")]
    fn panics_on_use_before_init() {
        let global = GlobalTagAllocator::<StaticExtender<4096>>::uninit();
        let layout = Layout::from_size_align(8, 8).unwrap();
        // SAFETY: deliberately exercising the uninitialized-use panic path.
        unsafe {
            global.alloc(layout);
        }
    }
}
