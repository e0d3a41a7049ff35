//! The core allocator: initialization, placement, extension, coalescing,
//! and realloc (spec.md §4.1, §4.3–§4.7).
//!
//! This is the Rust port of `original_source/mm.c`'s `mm_init`/`mm_malloc`/
//! `mm_free`/`mm_realloc`, structured the way the teacher's
//! `KernelHeapAllocator` in `mem::vmalloc::kheap` splits its own
//! boundary-tagged allocator into small single-purpose `unsafe fn`s on one
//! owning struct, rather than the free functions over `static mut` globals
//! that `mm.c` uses.

use core::cmp::max;
use core::ptr::{self, NonNull};

use log::{debug, warn};

use super::block::{adjust_size, BlockPtr, D, MIN_BLOCK_SIZE, W};
use super::error::InitError;
use super::extender::HeapExtender;
use super::free_list::{self, FreeListIter};

/// Extend the heap by this many bytes when no free block fits (spec.md
/// §4.1). Overridable per instance via [`Allocator::with_chunk_size`].
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A boundary-tagged, explicit-free-list allocator over an arena supplied
/// by a [`HeapExtender`].
///
/// Holds no internal synchronization (spec.md §5 — thread safety is a
/// non-goal); wrap in [`crate::alloc::global::GlobalTagAllocator`] for a
/// `GlobalAlloc`-compatible, lock-protected version.
pub struct Allocator<E: HeapExtender> {
    extender: E,
    chunk_size: usize,
    /// Payload pointer of the prologue: start of physical block traversal,
    /// and the free list's permanent tail terminator.
    prologue: Option<BlockPtr>,
    /// Head of the LIFO free list. Equals `prologue` whenever the list is
    /// empty.
    free_list_head: Option<BlockPtr>,
}

impl<E: HeapExtender> Allocator<E> {
    /// Creates an allocator over `extender`, using [`DEFAULT_CHUNK_SIZE`].
    /// Call [`Allocator::init`] before any other operation.
    pub const fn new(extender: E) -> Self {
        Self {
            extender,
            chunk_size: DEFAULT_CHUNK_SIZE,
            prologue: None,
            free_list_head: None,
        }
    }

    /// Creates an allocator that extends the heap by `chunk_size` bytes
    /// (rounded up to a multiple of [`D`]) whenever no free block fits a
    /// request, instead of [`DEFAULT_CHUNK_SIZE`].
    pub const fn with_chunk_size(extender: E, chunk_size: usize) -> Self {
        Self {
            extender,
            chunk_size,
            prologue: None,
            free_list_head: None,
        }
    }

    fn prologue(&self) -> BlockPtr {
        self.prologue.expect("Allocator::init was not called")
    }

    fn free_list_head(&self) -> BlockPtr {
        self.free_list_head.expect("Allocator::init was not called")
    }

    /// Prepares the arena (spec.md §4.1).
    ///
    /// Lays out the padding word, the prologue (header, two null links,
    /// footer), and the epilogue header, then extends the heap once by
    /// `chunk_size` bytes.
    pub fn init(&mut self) -> Result<(), InitError> {
        // 6 words: padding, prologue header, prologue prev, prologue next,
        // prologue footer, epilogue header.
        let base = self
            .extender
            .extend(6 * W)
            .map_err(|_| InitError::ExtenderExhausted)?;

        // SAFETY: `base` is a fresh, exclusively-owned region of at least
        // 6 * W bytes, just handed over by the extender.
        unsafe {
            let base = base.as_ptr();
            ptr::write(base as *mut usize, 0); // alignment padding

            let prologue_payload = base.add(2 * W);
            let prologue = BlockPtr::new(NonNull::new_unchecked(prologue_payload));
            prologue.set_tags(2 * D, true);
            // Prologue prev/next links double as the free-list tail; both
            // start null since the list starts empty.
            ptr::write(prologue_payload as *mut *mut u8, ptr::null_mut());
            ptr::write(prologue_payload.add(W) as *mut *mut u8, ptr::null_mut());

            let epilogue = prologue.next();
            epilogue.set_header_only(0, true);

            self.prologue = Some(prologue);
            self.free_list_head = Some(prologue);
        }

        self.extend_heap(self.chunk_size)
            .ok_or(InitError::ExtenderExhausted)?;
        Ok(())
    }

    /// Allocates a block with at least `size` bytes of payload (spec.md
    /// §4.6). Returns null if `size` is zero or the heap cannot grow
    /// enough to satisfy the request.
    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }

        let asize = adjust_size(size);

        if let Some(bp) = self.find_fit(asize) {
            self.place(bp, asize);
            return bp.as_ptr();
        }

        let extend_size = max(asize, self.chunk_size);
        match self.extend_heap(extend_size) {
            Some(bp) => {
                self.place(bp, asize);
                bp.as_ptr()
            }
            None => ptr::null_mut(),
        }
    }

    /// Frees a previously allocated block and coalesces it with free
    /// neighbors (spec.md §4.5). No-op on a null pointer.
    pub fn free(&mut self, ptr: *mut u8) {
        let Some(ptr) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: caller contract (spec.md §7.3): `ptr` must be a pointer
        // previously returned by `malloc`/`realloc` and not yet freed.
        let bp = unsafe { BlockPtr::new(ptr) };
        let size = bp.size();
        // SAFETY: `size` is the block's own recorded size.
        unsafe { bp.set_tags(size, false) };
        self.coalesce(bp);
    }

    /// Reallocates `ptr` to hold at least `size` bytes of payload
    /// (spec.md §4.7).
    ///
    /// `size` is a signed quantity: the spec's source treats an incoming
    /// size as if it could be negative (a cast from `size_t` to `int` in
    /// the original C), and this port keeps that observable behavior
    /// behind an explicit `isize` parameter rather than silently
    /// reinterpreting an unsigned one (spec.md §9 Design Notes).
    pub fn realloc(&mut self, ptr: *mut u8, size: isize) -> *mut u8 {
        if size < 0 {
            return ptr::null_mut();
        }
        if size == 0 {
            self.free(ptr);
            return ptr::null_mut();
        }
        let size = size as usize;

        let Some(nn) = NonNull::new(ptr) else {
            return self.malloc(size);
        };
        // SAFETY: caller contract, as in `free`.
        let bp = unsafe { BlockPtr::new(nn) };

        let asize = adjust_size(size);
        let oldsize = bp.size();

        if asize <= oldsize {
            return bp.as_ptr();
        }

        // SAFETY: `bp` is allocated, so it has a valid physical next block.
        let next = unsafe { bp.next() };
        if !next.is_alloc() && oldsize + next.size() >= asize {
            let mut head = self.free_list_head();
            // SAFETY: `next` is free and linked into `head`.
            unsafe { free_list::remove(&mut head, next) };
            self.free_list_head = Some(head);

            let combined = oldsize + next.size();
            // SAFETY: `combined` is exactly the sum of two physically
            // adjacent blocks' recorded sizes.
            unsafe { bp.set_tags(combined, true) };
            return bp.as_ptr();
        }

        let new_ptr = self.malloc(size);
        if new_ptr.is_null() {
            // The original block must remain valid; spec.md §4.7.
            return ptr::null_mut();
        }
        // SAFETY: both `bp.as_ptr()` and `new_ptr` address `oldsize`
        // initialized, non-overlapping bytes (mirrors
        // `original_source/mm.c`'s `memcpy(new_ptr, bp, oldsize)`, which
        // copies the full old block size rather than just its payload).
        unsafe {
            ptr::copy_nonoverlapping(bp.as_ptr(), new_ptr, oldsize);
        }
        self.free(bp.as_ptr());
        new_ptr
    }

    /// First-fit linear scan of the free list (spec.md §4.3).
    fn find_fit(&self, asize: usize) -> Option<BlockPtr> {
        FreeListIter::new(self.free_list_head()).find(|bp| bp.size() >= asize)
    }

    /// Splits or consumes a free block to satisfy `asize` bytes, removing
    /// it from the free list (spec.md §4.3).
    fn place(&mut self, bp: BlockPtr, asize: usize) {
        let csize = bp.size();
        let mut head = self.free_list_head();

        if csize - asize >= MIN_BLOCK_SIZE {
            // SAFETY: `asize` fits inside `bp`'s current size with room
            // for a valid remainder block.
            unsafe { bp.set_tags(asize, true) };
            // SAFETY: `bp` is currently linked into `head`.
            unsafe { free_list::remove(&mut head, bp) };
            self.free_list_head = Some(head);

            // SAFETY: `bp` was just resized to `asize`, so its physical
            // next block starts exactly at the remainder.
            let remainder = unsafe { bp.next() };
            // SAFETY: `csize - asize` is the remainder's true size.
            unsafe { remainder.set_tags(csize - asize, false) };
            self.coalesce(remainder);
        } else {
            // SAFETY: `csize` is `bp`'s own recorded size.
            unsafe { bp.set_tags(csize, true) };
            // SAFETY: `bp` is currently linked into `head`.
            unsafe { free_list::remove(&mut head, bp) };
            self.free_list_head = Some(head);
        }
    }

    /// Grows the arena by at least `bytes`, rounded up to a multiple of
    /// [`D`] to preserve alignment, and folds the new free block into the
    /// heap (spec.md §4.4).
    fn extend_heap(&mut self, bytes: usize) -> Option<BlockPtr> {
        let size = (bytes + D - 1) / D * D;

        debug!("extending heap by {size} bytes");
        let region = match self.extender.extend(size) {
            Ok(region) => region,
            Err(_) => {
                warn!("heap extender exhausted while requesting {size} bytes");
                return None;
            }
        };

        // `region` starts exactly one word past the stale epilogue header
        // left by the previous `init`/`extend_heap` call (the extender
        // grows contiguously at the high end), so that slot becomes this
        // block's header — the same reuse `original_source/mm.c`'s
        // `extend_heap` gets for free from `mem_sbrk` returning the old
        // break. Using `region` itself as the payload pointer, rather than
        // one word into it, is what makes that reuse land correctly: the
        // new block's header overwrites the old epilogue in place instead
        // of leaving a stray zero-size block between the two that would
        // break boundary-tag traversal.
        //
        // SAFETY: `region` is `size` fresh bytes; the block spans
        // `region - W` (the reused header slot) through `region + size - W`
        // (payload and footer, within `size`), and the new epilogue header
        // occupies the last word of `size`, at `region + size - W`.
        unsafe {
            let bp = BlockPtr::new(region);
            bp.set_tags(size, false);

            let epilogue = bp.next();
            epilogue.set_header_only(0, true);

            Some(self.coalesce(bp))
        }
    }

    /// Boundary-tag coalescing with both physical neighbors (spec.md
    /// §4.5). Inserts the resulting block into the free list and returns
    /// it.
    fn coalesce(&mut self, bp: BlockPtr) -> BlockPtr {
        // SAFETY: `bp` is never the prologue (which is always allocated
        // and therefore never coalesced), so it has a valid previous block.
        let prev = unsafe { bp.prev() };
        // SAFETY: `bp` is never the epilogue, so it has a valid next block.
        let next = unsafe { bp.next() };

        let prev_alloc = prev.is_alloc();
        let next_alloc = next.is_alloc();
        let mut head = self.free_list_head();
        let mut size = bp.size();
        let mut merged = bp;

        match (prev_alloc, next_alloc) {
            (true, true) => {
                // SAFETY: `bp` is free and not yet linked anywhere.
                unsafe { free_list::insert(&mut head, bp) };
                self.free_list_head = Some(head);
                return bp;
            }
            (true, false) => {
                size += next.size();
                // SAFETY: `next` is free and linked into `head`.
                unsafe { free_list::remove(&mut head, next) };
            }
            (false, true) => {
                size += prev.size();
                merged = prev;
                // SAFETY: `prev` is free and linked into `head`.
                unsafe { free_list::remove(&mut head, prev) };
            }
            (false, false) => {
                size += prev.size() + next.size();
                merged = prev;
                // SAFETY: both `prev` and `next` are free and linked into
                // `head`.
                unsafe {
                    free_list::remove(&mut head, prev);
                    free_list::remove(&mut head, next);
                }
            }
        }

        // SAFETY: `size` is exactly the sum of the recorded sizes of the
        // physically contiguous blocks being merged.
        unsafe { merged.set_tags(size, false) };
        // SAFETY: `merged` is free and not currently linked.
        unsafe { free_list::insert(&mut head, merged) };
        self.free_list_head = Some(head);
        merged
    }

    /// The prologue's payload pointer: the start of physical block
    /// traversal, used by the consistency checker.
    pub(crate) fn heap_start(&self) -> BlockPtr {
        self.prologue()
    }

    /// The current free-list head, used by the consistency checker.
    pub(crate) fn free_list(&self) -> BlockPtr {
        self.free_list_head()
    }

    /// Bounds of the live arena, as reported by the heap extender.
    pub(crate) fn bounds(&self) -> (*const u8, *const u8) {
        (self.extender.heap_lo(), self.extender.heap_hi())
    }
}
