//! Storage allocator in the style of The C Programming Language, §8.7,
//! modernized. A single circular singly linked free list threaded through
//! block headers serves variable sized requests with first-fit search,
//! splits oversized blocks at the tail and coalesces address-adjacent
//! neighbors when blocks come back, so the list neither fragments
//! unboundedly nor needs compaction. Backing memory comes from the
//! platform through a small aligned allocation facade.
//!
//! The crate is meant for embedding in larger systems that prefer a
//! predictable, inspectable allocator over the platform one. It is
//! deliberately single threaded; callers that need concurrency must
//! serialize externally.
//!
//! # Examples
//!
//! ```
//! use knalloc::FreeListAllocator;
//!
//! let mut allocator = FreeListAllocator::new();
//! allocator.initialize().unwrap();
//!
//! let address = allocator.malloc(64).unwrap();
//! unsafe {
//!     address.as_ptr().write_bytes(0, 64);
//!     allocator.free(Some(address));
//! }
//!
//! allocator.terminate().unwrap();
//! ```
//!
//! A process-wide instance with the classic C shape lives in [`global`].

use std::{error, fmt, ptr::NonNull};

pub mod align;
mod block;
mod freelist;
pub mod global;
pub mod memory;
mod platform;
pub mod ram;

/// Non-null pointer to `T`. We use this in most cases instead of `*mut T`
/// because the compiler will yell at us if we don't write code for the
/// `None` case, and because "accepts null" contracts map onto it
/// directly.
pub(crate) type Pointer<T> = Option<NonNull<T>>;

pub use block::{ALIGNMENT, UNIT};
pub use freelist::{BlockRecord, FreeListAllocator};

/// Failure kinds reported by the allocator.
///
/// Allocation operations report failure as `None`; lifecycle operations
/// return one of these. The allocator never panics, never aborts the
/// process and never retries internally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Zero sized request, or an alignment that is not a power of two.
    InvalidArgument,
    /// Request exceeds the allocation ceiling. See [`ram::max`].
    OutOfRange,
    /// The platform allocator refused to hand out more memory.
    OutOfMemory,
    /// Lifecycle operation on an allocator that was never initialized.
    Uninitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidArgument => "invalid argument",
            Error::OutOfRange => "request exceeds the allocation ceiling",
            Error::OutOfMemory => "platform allocator exhausted",
            Error::Uninitialized => "allocator is not initialized",
        })
    }
}

impl error::Error for Error {}
