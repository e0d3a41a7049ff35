//! A boundary-tagged, explicit free-list dynamic memory allocator, ported
//! from a first-fit `sbrk`-style design onto a caller-supplied heap
//! extender abstraction instead of a hardwired syscall.
#![no_std]

pub mod alloc;
