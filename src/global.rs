//! Process-wide allocator instance behind the classic C shaped API. The
//! singleton handle idea: all the allocator logic lives in
//! [`FreeListAllocator`], and these free functions are a thin wrapper
//! over one shared instance.
//!
//! The instance sits behind a [`Mutex`] purely so the statics are sound
//! to hand out; the allocator itself makes no concurrency promises and
//! callers that mix threads must impose their own ordering.
//!
//! # Examples
//!
//! ```
//! knalloc::global::initialize().unwrap();
//!
//! let address = knalloc::global::malloc(64);
//! assert!(!address.is_null());
//!
//! unsafe {
//!     address.write_bytes(0, 64);
//!     knalloc::global::free(address);
//! }
//!
//! knalloc::global::terminate().unwrap();
//! ```

use std::{
    ptr::{self, NonNull},
    sync::{Mutex, MutexGuard},
};

use crate::{freelist::FreeListAllocator, Error};

static ALLOCATOR: Mutex<FreeListAllocator> = Mutex::new(FreeListAllocator::new());

fn lock() -> MutexGuard<'static, FreeListAllocator> {
    // The allocator never panics while the lock is held, so a poisoned
    // lock still guards a consistent instance.
    ALLOCATOR.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// [`FreeListAllocator::initialize`] on the process-wide instance.
pub fn initialize() -> Result<(), Error> {
    lock().initialize()
}

/// [`FreeListAllocator::terminate`] on the process-wide instance.
pub fn terminate() -> Result<(), Error> {
    lock().terminate()
}

/// [`FreeListAllocator::malloc`] on the process-wide instance. Returns
/// null on failure, like its namesake.
pub fn malloc(size: usize) -> *mut u8 {
    lock()
        .malloc(size)
        .map_or(ptr::null_mut(), |address| address.as_ptr())
}

/// [`FreeListAllocator::free`] on the process-wide instance. Accepts
/// null as a no-op.
///
/// # Safety
///
/// A non-null `address` must have been obtained from [`malloc`] and not
/// freed since.
pub unsafe fn free(address: *mut u8) {
    lock().free(NonNull::new(address));
}

/// [`FreeListAllocator::dump`] on the process-wide instance.
pub fn dump() {
    lock().dump();
}
