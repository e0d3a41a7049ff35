//! The doubly linked, LIFO, explicit free list (spec.md §3, §4.8).
//!
//! Links live inside the first two words of a free block's payload — the
//! same storage the block uses for user data once allocated, which is why
//! the minimum block size must fit a header, two link words, and a footer.
//! The free-list head is owned by [`super::heap::Allocator`]; this module
//! only knows how to read and rewrite links given a block pointer, the way
//! `original_source/mm.c`'s `insert_in_free_list`/`remove_from_free_list`
//! operate on whatever `free_listp` the caller passes through the global.

use core::ptr::NonNull;

use super::block::{BlockPtr, W};

/// Reads the previous-free-block link, `None` if this is the list head.
///
/// # Safety
/// `bp` must be a free block with an initialized prev link.
pub(crate) unsafe fn get_prev(bp: BlockPtr) -> Option<BlockPtr> {
    let slot = bp.as_ptr() as *const *mut u8;
    NonNull::new(slot.read()).map(|p| BlockPtr::new(p))
}

/// Writes the previous-free-block link.
///
/// # Safety
/// `bp` must be a free block with room for the prev link word.
unsafe fn set_prev(bp: BlockPtr, prev: Option<BlockPtr>) {
    let slot = bp.as_ptr() as *mut *mut u8;
    slot.write(prev.map_or(core::ptr::null_mut(), |p| p.as_ptr()));
}

/// Reads the next-free-block link. Never null for any block reachable from
/// the free-list head, because the prologue always terminates the list.
///
/// # Safety
/// `bp` must be a free block with an initialized next link.
unsafe fn get_next(bp: BlockPtr) -> BlockPtr {
    let slot = bp.as_ptr().add(W) as *const *mut u8;
    BlockPtr::new(NonNull::new_unchecked(slot.read()))
}

/// Writes the next-free-block link.
///
/// # Safety
/// `bp` must be a free block with room for the next link word.
unsafe fn set_next(bp: BlockPtr, next: BlockPtr) {
    let slot = bp.as_ptr().add(W) as *mut *mut u8;
    slot.write(next.as_ptr());
}

/// Inserts `bp` at the head of the free list (spec.md §4.8).
///
/// # Safety
/// `bp` must be a free block, distinct from every block already linked
/// from `*head`, with its tags already set to `alloc=0`.
pub(crate) unsafe fn insert(head: &mut BlockPtr, bp: BlockPtr) {
    set_next(bp, *head);
    set_prev(*head, Some(bp));
    set_prev(bp, None);
    *head = bp;
}

/// Removes `bp` from the free list it is linked into via `*head`
/// (spec.md §4.8).
///
/// # Safety
/// `bp` must currently be linked into the list rooted at `*head`.
pub(crate) unsafe fn remove(head: &mut BlockPtr, bp: BlockPtr) {
    match get_prev(bp) {
        Some(prev) => set_next(prev, get_next(bp)),
        None => *head = get_next(bp),
    }
    set_prev(get_next(bp), get_prev(bp));
}

/// Walks the free list starting at `head`, stopping at the first allocated
/// block encountered (the prologue sentinel, spec.md §4.3).
pub(crate) struct FreeListIter {
    current: BlockPtr,
}

impl FreeListIter {
    pub(crate) fn new(head: BlockPtr) -> Self {
        Self { current: head }
    }
}

impl Iterator for FreeListIter {
    type Item = BlockPtr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_alloc() {
            return None;
        }
        let bp = self.current;
        // SAFETY: `bp` is free (checked above), so it has a valid next link.
        self.current = unsafe { get_next(bp) };
        Some(bp)
    }
}
