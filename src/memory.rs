//! Aligned allocation facade. A thin layer over the platform allocator
//! and the only interface the free list uses to obtain raw memory, so
//! swapping the memory source means touching exactly one seam.

use std::{mem, ptr};

use crate::{align, platform, Pointer};

/// Alignments below this are raised to it. The platform allocators
/// reject anything smaller than a pointer.
pub const MIN_ALIGNMENT: usize = mem::size_of::<*const ()>();

/// Returns an `alignment` aligned pointer to `size` fresh bytes, or
/// `None` on failure. `alignment` is raised to [`MIN_ALIGNMENT`] if
/// smaller and must otherwise be a power of two.
pub fn alloc(size: usize, alignment: usize) -> Pointer<u8> {
    let alignment = alignment.max(MIN_ALIGNMENT);

    if size == 0 || !align::is_power_of_two(alignment) {
        log::debug!("rejecting aligned allocation: size={size} alignment={alignment}");
        return None;
    }

    let address = unsafe { platform::request_memory(size, alignment) };
    if address.is_none() {
        log::error!("platform refused an aligned allocation of {size} bytes");
    }

    address
}

/// As [`alloc`] for `count * size` bytes, zeroed. `None` on failure or
/// when the byte count overflows.
pub fn calloc(count: usize, size: usize, alignment: usize) -> Pointer<u8> {
    let Some(total) = count.checked_mul(size) else {
        log::debug!("zeroed allocation overflows: count={count} size={size}");
        return None;
    };

    let address = alloc(total, alignment)?;
    unsafe { ptr::write_bytes(address.as_ptr(), 0, total) };

    Some(address)
}

/// Moves an allocation to a fresh block of `new_size` bytes, copying
/// `min(old_size, new_size)` bytes over. With no pointer this is
/// [`alloc`]; with `new_size` 0 it frees the pointer and returns `None`.
/// On allocation failure the original block is left untouched and `None`
/// is returned.
///
/// # Safety
///
/// `ptr`, if present, must have been obtained from this facade with a
/// usable size of at least `old_size` bytes.
pub unsafe fn realloc(
    ptr: Pointer<u8>,
    old_size: usize,
    new_size: usize,
    alignment: usize,
) -> Pointer<u8> {
    let Some(old) = ptr else {
        return alloc(new_size, alignment);
    };

    if new_size == 0 {
        free(Some(old));
        return None;
    }

    let new = alloc(new_size, alignment)?;
    ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size.min(new_size));
    free(Some(old));

    Some(new)
}

/// Returns a block to the platform. Accepts `None` as a no-op.
///
/// # Safety
///
/// A present pointer must have been obtained from this facade and not
/// freed since.
pub unsafe fn free(ptr: Pointer<u8>) {
    if let Some(address) = ptr {
        platform::return_memory(address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_aligned() {
        // (size, alignment)
        let cases = [(8, 8), (64, 16), (128, 256), (1, 4096), (4096, 4096), (96, 1)];

        for (size, alignment) in cases {
            let address = alloc(size, alignment).unwrap();
            let effective = alignment.max(MIN_ALIGNMENT);

            assert!(align::is_aligned(address.as_ptr() as usize, effective));

            unsafe {
                address.as_ptr().write_bytes(0xEE, size);
                assert_eq!(*address.as_ptr().add(size - 1), 0xEE);
                free(Some(address));
            }
        }
    }

    #[test]
    fn invalid_requests_are_rejected() {
        assert_eq!(alloc(0, 8), None);
        assert_eq!(alloc(64, 24), None);
        assert_eq!(calloc(usize::MAX, 2, 8), None);
    }

    #[test]
    fn calloc_zeroes_every_byte() {
        let address = calloc(16, 32, 64).unwrap();

        unsafe {
            for i in 0..16 * 32 {
                assert_eq!(*address.as_ptr().add(i), 0);
            }
            free(Some(address));
        }
    }

    #[test]
    fn realloc_preserves_contents() {
        unsafe {
            let address = alloc(32, 16).unwrap();
            for i in 0..32 {
                *address.as_ptr().add(i) = i as u8;
            }

            let grown = realloc(Some(address), 32, 64, 16).unwrap();
            for i in 0..32 {
                assert_eq!(*grown.as_ptr().add(i), i as u8);
            }

            let shrunk = realloc(Some(grown), 64, 16, 16).unwrap();
            for i in 0..16 {
                assert_eq!(*shrunk.as_ptr().add(i), i as u8);
            }

            free(Some(shrunk));
        }
    }

    #[test]
    fn realloc_edge_cases() {
        unsafe {
            // No pointer behaves like a plain allocation.
            let address = realloc(None, 0, 64, 8).unwrap();

            // Zero size frees and reports no block.
            assert_eq!(realloc(Some(address), 64, 0, 8), None);

            // Freeing nothing is fine.
            free(None);
        }
    }
}
