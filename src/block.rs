use std::{mem, ptr::NonNull};

use crate::Pointer;

/// Header preceding every block's payload. Here's how a block looks like
/// in memory:
///
/// ```text
/// +--------------------------+
/// | pointer to next block    |  <---+
/// +--------------------------+      | Header (exactly one unit)
/// | size in units            |  <---+
/// +--------------------------+
/// |         Payload          |  <---+
/// |           ...            |      | size - 1 units. This is where
/// |           ...            |      | the caller writes stuff.
/// |           ...            |  <---+
/// +--------------------------+
/// ```
///
/// A *unit* is the size of this struct, and every block size is a whole
/// number of units. Since the struct is also aligned to [`ALIGNMENT`],
/// writing a header at an aligned address makes the payload address
/// aligned for free, and carving units off a block can never shear a
/// payload off its boundary. Sizing blocks in bytes instead would force
/// padding arithmetic into every split.
#[repr(C, align(16))]
pub(crate) struct Header {
    /// Successor on the circular free list. Only meaningful while the
    /// block sits on the list; junk while the block is handed out.
    pub next: Pointer<Header>,
    /// Total block size in units, this header included. The base
    /// sentinel is the only header with size 0.
    pub size: usize,
}

/// The allocator's size quantum in bytes.
pub const UNIT: usize = mem::size_of::<Header>();

/// Every header and payload address is a multiple of this. Matches the
/// strictest alignment any fundamental type requires on mainstream
/// platforms.
pub const ALIGNMENT: usize = mem::align_of::<Header>();

// A unit must cover whole alignment boundaries, otherwise splitting in
// units could produce misaligned headers.
const _: () = assert!(UNIT % ALIGNMENT == 0);

impl Header {
    /// Returns the header owning the given payload address.
    ///
    /// ```text
    /// +-------------+
    /// |   Header    | <- Returned pointer points here.
    /// +-------------+
    /// |   Payload   | <- Given address should point here.
    /// +-------------+
    /// |     ...     |
    /// +-------------+
    /// ```
    ///
    /// # Safety
    ///
    /// This conversion is the one place where a caller supplied address
    /// is turned back into allocator metadata. The address must be
    /// exactly one that [`Header::payload_address_of`] produced for a
    /// live block; anything else is undefined behaviour.
    #[inline]
    pub unsafe fn from_payload_address(address: NonNull<u8>) -> NonNull<Self> {
        NonNull::new_unchecked(address.as_ptr().cast::<Self>().offset(-1))
    }

    /// Returns the payload address of the given header, one unit past it.
    ///
    /// # Safety
    ///
    /// `header` must point to a valid [`Header`]. The returned address is
    /// safe to use for up to `size - 1` units of the owning block.
    ///
    /// # Notes
    ///
    /// Written as `Header::payload_address_of(header)` instead of a
    /// method on `&self` to avoid creating intermediary references that
    /// upset Miri's Stacked Borrows checks.
    #[inline]
    pub unsafe fn payload_address_of(header: NonNull<Self>) -> NonNull<u8> {
        NonNull::new_unchecked(header.as_ptr().offset(1)).cast()
    }

    /// First address past the block, `size` units from its header. Two
    /// blocks are address-adjacent exactly when one's end is the other's
    /// header.
    ///
    /// # Safety
    ///
    /// `header` must point to a valid [`Header`] with a trustworthy
    /// `size`.
    #[inline]
    pub unsafe fn end_address_of(header: NonNull<Self>) -> NonNull<Self> {
        NonNull::new_unchecked(header.as_ptr().add(header.as_ref().size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_a_whole_number_of_alignments() {
        assert!(UNIT >= mem::size_of::<usize>() * 2);
        assert_eq!(UNIT % ALIGNMENT, 0);
    }

    #[test]
    fn payload_conversions_are_inverses() {
        let mut header = Header {
            next: None,
            size: 1,
        };
        let address = NonNull::from(&mut header);

        unsafe {
            let payload = Header::payload_address_of(address);
            assert_eq!(
                payload.as_ptr() as usize - address.as_ptr() as usize,
                UNIT
            );
            assert_eq!(Header::from_payload_address(payload), address);
        }
    }

    #[test]
    fn end_address_walks_whole_units() {
        // A block of 3 units laid out for real, so the end address stays
        // inside the allocation.
        let mut blocks = [
            Header {
                next: None,
                size: 3,
            },
            Header {
                next: None,
                size: 0,
            },
            Header {
                next: None,
                size: 0,
            },
        ];
        let address = NonNull::from(&mut blocks[0]);

        unsafe {
            let end = Header::end_address_of(address);
            assert_eq!(end.as_ptr() as usize - address.as_ptr() as usize, 3 * UNIT);
        }
    }
}
