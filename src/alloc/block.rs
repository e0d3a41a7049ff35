//! Block layout, boundary tags, and physical-neighbor navigation
//! (spec.md §3, §4.2).
//!
//! Every block sits inline in the arena as `header | payload | footer`.
//! The header and footer are identical words packing the block's total size
//! (a multiple of [`D`], so the low bits are free) with a one-bit allocated
//! flag. A [`BlockPtr`] always points at the start of the payload, one word
//! past the header — the same convention as `original_source/mm.c`'s `bp`
//! and the teacher's `kheap::AllocHeader`-addressed nodes.

use bytemuck::{Pod, Zeroable};
use core::ptr::NonNull;

/// Word size: the width of a machine pointer.
pub const W: usize = core::mem::size_of::<usize>();

/// Double-word size: the allocator's alignment granularity.
pub const D: usize = 2 * W;

/// Smallest legal block size: header, two free-list link words, footer.
pub const MIN_BLOCK_SIZE: usize = 4 * W;

/// A boundary-tag word: block size packed with the allocated bit.
///
/// The size occupies all but the low bit, which doubles as the alloc flag
/// because every block size is a multiple of [`D`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(transparent)]
pub struct Tag(usize);

impl Tag {
    const ALLOC_BIT: usize = 0b1;

    /// Packs a `size`/`alloc` pair into a tag word.
    pub const fn pack(size: usize, alloc: bool) -> Self {
        Self(size | (alloc as usize))
    }

    pub const fn size(self) -> usize {
        self.0 & !(D - 1)
    }

    pub const fn is_alloc(self) -> bool {
        self.0 & Self::ALLOC_BIT != 0
    }
}

/// Adjusts a requested payload size to a legal block size (spec.md §4.2):
/// at least [`MIN_BLOCK_SIZE`], always a multiple of [`D`].
pub const fn adjust_size(payload: usize) -> usize {
    if payload <= D {
        2 * D
    } else {
        D * ((payload + D + (D - 1)) / D)
    }
}

/// A pointer to a block's payload start (one word past its header).
///
/// Thin wrapper around the raw address to keep the header/footer/adjacency
/// arithmetic in one place, the way the teacher's `NodeLink` wraps a raw
/// node pointer for its red-black tree.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockPtr(NonNull<u8>);

impl BlockPtr {
    /// Wraps a raw payload pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be `D`-aligned and point at the payload of a block laid
    /// out as described above, with a valid header at `ptr - W`.
    pub unsafe fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    pub fn as_non_null(self) -> NonNull<u8> {
        self.0
    }

    fn header_ptr(self) -> *mut Tag {
        // SAFETY: every `BlockPtr` points one word past a valid header.
        unsafe { self.as_ptr().sub(W) as *mut Tag }
    }

    /// Reads this block's header tag.
    pub fn header(self) -> Tag {
        // SAFETY: `header_ptr` always addresses a live `Tag` word.
        unsafe { self.header_ptr().read() }
    }

    fn footer_ptr(self, size: usize) -> *mut Tag {
        // SAFETY: `size` is the block's own total size, so `bp + size - D`
        // is the footer slot reserved within the block.
        unsafe { self.as_ptr().add(size - D) as *mut Tag }
    }

    /// Reads this block's footer tag, for the size recorded in its header.
    pub fn footer(self) -> Tag {
        let size = self.header().size();
        // SAFETY: see `footer_ptr`.
        unsafe { self.footer_ptr(size).read() }
    }

    /// This block's total size, in bytes, as recorded in its header.
    pub fn size(self) -> usize {
        self.header().size()
    }

    /// Whether this block is currently marked allocated.
    pub fn is_alloc(self) -> bool {
        self.header().is_alloc()
    }

    /// Writes matching header and footer tags for this block.
    ///
    /// # Safety
    ///
    /// `size` must be the block's true total size: both the header slot at
    /// `bp - W` and the footer slot at `bp + size - D` must lie within the
    /// arena and not overlap a neighboring block's payload.
    pub unsafe fn set_tags(self, size: usize, alloc: bool) {
        let tag = Tag::pack(size, alloc);
        self.header_ptr().write(tag);
        self.footer_ptr(size).write(tag);
    }

    /// Writes only the header tag, leaving no room for a footer.
    ///
    /// Used exclusively for the epilogue, whose size is always zero and
    /// which therefore has no footer slot to write.
    ///
    /// # Safety
    /// `self` must address the epilogue sentinel at the arena's high end.
    pub(crate) unsafe fn set_header_only(self, size: usize, alloc: bool) {
        self.header_ptr().write(Tag::pack(size, alloc));
    }

    /// The physically next block: `bp + size`.
    ///
    /// # Safety
    ///
    /// Always valid to call as long as this block is not the epilogue —
    /// the epilogue's zero size makes this a no-op that returns itself.
    pub unsafe fn next(self) -> BlockPtr {
        let size = self.size();
        // SAFETY: the epilogue sentinel bounds every arena (spec.md §3), so
        // `bp + size` never leaves it as long as `self` isn't the epilogue.
        BlockPtr(NonNull::new_unchecked(self.as_ptr().add(size)))
    }

    /// The physically previous block, found via the previous block's
    /// footer at `bp - D`.
    ///
    /// # Safety
    ///
    /// Must not be called on the prologue: it has no previous block.
    pub unsafe fn prev(self) -> BlockPtr {
        // SAFETY: caller guarantees `self` is not the prologue, so a footer
        // belonging to a real previous block lives at `bp - D`.
        let prev_footer = (self.as_ptr().sub(D)) as *const Tag;
        let prev_size = (*prev_footer).size();
        BlockPtr(NonNull::new_unchecked(self.as_ptr().sub(prev_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrips_size_and_alloc_bit() {
        let t = Tag::pack(48, true);
        assert_eq!(t.size(), 48);
        assert!(t.is_alloc());

        let f = Tag::pack(96, false);
        assert_eq!(f.size(), 96);
        assert!(!f.is_alloc());
    }

    #[test]
    fn adjust_size_matches_spec_examples() {
        // W=8, D=16 on every 64-bit host this crate targets.
        assert_eq!(adjust_size(1), 32);
        assert_eq!(adjust_size(D), 32);
        assert_eq!(adjust_size(24), 48);
        assert_eq!(adjust_size(D + 1), 48);
    }

    #[test]
    fn block_header_footer_and_adjacency() {
        let mut buf = [0u8; 256];
        let bp = unsafe {
            let payload = buf.as_mut_ptr().add(W);
            BlockPtr::new(NonNull::new_unchecked(payload))
        };

        unsafe { bp.set_tags(64, true) };
        assert_eq!(bp.size(), 64);
        assert!(bp.is_alloc());
        assert_eq!(bp.header(), bp.footer());

        let next = unsafe { bp.next() };
        unsafe { next.set_tags(32, false) };
        assert_eq!(unsafe { next.prev() }, bp);
    }
}
