//! A boundary-tagged, explicit free-list allocator with first-fit
//! placement, over an arena grown on demand by a caller-supplied
//! [`HeapExtender`].
//!
//! The allocator itself (this module's [`Allocator`]) holds no locks and
//! assumes single-threaded access, the same split the teacher's kernel
//! keeps between `KernelHeapAllocator` and its `Mutex`-wrapped global
//! singleton: build one directly for exclusive use, or enable the
//! `global` feature for a lock-protected `GlobalAlloc` wrapper.

pub mod block;
pub mod check;
pub mod error;
pub mod extender;
mod free_list;
pub mod heap;

#[cfg(feature = "global")]
pub mod global;

pub use check::check_heap;
pub use error::{ExtendError, InitError};
pub use extender::{HeapExtender, StaticExtender};
pub use heap::{Allocator, DEFAULT_CHUNK_SIZE};

#[cfg(feature = "global")]
pub use global::GlobalTagAllocator;
