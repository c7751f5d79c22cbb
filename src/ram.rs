//! Physical RAM inspection and the allocation ceiling derived from it.
//! The ceiling is what keeps a runaway request from asking the platform
//! for more memory than the machine could ever provide.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::platform;

/// Memory held back when computing the ceiling. 1 GiB.
pub const RESERVE: u64 = 1 << 30;

/// Lower bound of the ceiling, so tiny machines still get a usable
/// allocator. 16 MiB.
pub const FLOOR: u64 = 16 << 20;

/// Assumed total RAM when the platform cannot report it. 4 GiB.
pub const FALLBACK_TOTAL: u64 = 1 << 32;

/// The ceiling is queried on every allocation, so compute it once and
/// cache it like the page size.
static RAM_MAX: AtomicUsize = AtomicUsize::new(0);

/// Total physical RAM in bytes, or [`FALLBACK_TOTAL`] when the platform
/// cannot report it.
pub fn total() -> usize {
    match platform::total_ram() {
        Some(bytes) => bytes,
        None => {
            log::warn!("platform cannot report total RAM, assuming {FALLBACK_TOTAL} bytes");
            saturate(FALLBACK_TOTAL)
        }
    }
}

/// Currently free physical RAM in bytes. Falls back to [`total`] when
/// the platform cannot report it.
pub fn free() -> usize {
    match platform::free_ram() {
        Some(bytes) => bytes,
        None => {
            log::debug!("platform cannot report free RAM, reporting the total instead");
            total()
        }
    }
}

/// Maximum size a single allocation request is allowed to have:
/// [`total`] minus [`RESERVE`], but never below [`FLOOR`].
pub fn max() -> usize {
    let mut ceiling = RAM_MAX.load(Ordering::Relaxed);
    if ceiling == 0 {
        ceiling = saturate((total() as u64).saturating_sub(RESERVE).max(FLOOR));
        RAM_MAX.store(ceiling, Ordering::Relaxed);
    }

    ceiling
}

fn saturate(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
