//! Error types for the allocator and its heap-extender collaborator.

use core::fmt::{self, Display, Formatter};

/// Failure reason for [`crate::alloc::Allocator::init`].
///
/// Initialization can only fail for one reason: the heap-extender could not
/// hand over the initial arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitError {
    /// The heap extender returned failure on the initial `extend` call.
    ExtenderExhausted,
}

impl Display for InitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtenderExhausted => {
                f.write_str("heap extender could not provide the initial arena")
            }
        }
    }
}

/// Failure reason for [`crate::alloc::HeapExtender::extend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtendError {
    /// The extender has no more memory to hand out.
    Exhausted,
}

impl Display for ExtendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("heap extender is exhausted"),
        }
    }
}
