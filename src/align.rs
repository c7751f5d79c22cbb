//! Alignment arithmetic. Pure functions on machine word integers, no I/O
//! and no allocation. Everything here works with bit masks instead of
//! division, which is possible because alignments are required to be
//! powers of two:
//!
//! ```text
//! 2 ---> 0010
//! 4 ---> 0100
//! 8 ---> 1000
//! ```
//!
//! Subtracting 1 from a power of two sets every bit below its single one
//! bit, so `value & (alignment - 1)` is `value % alignment` and
//! `value & !(alignment - 1)` chops `value` down to the previous
//! multiple. Passing an alignment that is not a power of two is a
//! programmer error; these functions assume the precondition and assert
//! it in debug builds.

use crate::platform;

/// Whether `value` is a non-zero power of two.
#[inline]
pub fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

/// Offset of `value` within its alignment boundary, that is
/// `value % alignment`. For alignment 8 and value 14 this returns 6.
#[inline]
pub fn align_offset(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    value & (alignment - 1)
}

/// Whether `value` is a multiple of `alignment`.
#[inline]
pub fn is_aligned(value: usize, alignment: usize) -> bool {
    align_offset(value, alignment) == 0
}

/// Smallest multiple of `alignment` greater than or equal to `value`.
///
/// If rounding up would overflow the machine word, the result saturates
/// to the greatest representable multiple of `alignment`.
#[inline]
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    let mask = !(alignment - 1);
    match value.checked_add(alignment - 1) {
        Some(padded) => padded & mask,
        None => usize::MAX & mask,
    }
}

/// Greatest multiple of `alignment` less than or equal to `value`.
#[inline]
pub fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment));
    value & !(alignment - 1)
}

/// Bytes that must be added to `value` to reach the next alignment
/// boundary. Zero if `value` is already aligned.
#[inline]
pub fn padding_needed(value: usize, alignment: usize) -> usize {
    let offset = align_offset(value, alignment);
    if offset == 0 {
        0
    } else {
        alignment - offset
    }
}

/// Number of objects of `size` bytes needed to cover `value` bytes once
/// `value` has been rounded up to `alignment`. `size` must not be zero.
#[inline]
pub fn unit_count(value: usize, size: usize, alignment: usize) -> usize {
    debug_assert!(size > 0);
    align_up(value, alignment).div_ceil(size)
}

/// [`align_up`] to the system page size.
#[inline]
pub fn align_up_pagesize(value: usize) -> usize {
    align_up(value, platform::page_size())
}

#[cfg(test)]
mod tests {
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn power_of_two() {
        // (value, expected)
        let cases = [
            (0, false),
            (1, true),
            (2, true),
            (3, false),
            (4, true),
            (7, false),
            (8, true),
            (15, false),
            (16, true),
            (1023, false),
            (1024, true),
            (usize::MAX, false),
        ];

        for (value, expected) in cases {
            assert_eq!(is_power_of_two(value), expected, "value={value}");
        }
    }

    #[test]
    fn offset_within_boundary() {
        // (value, alignment, expected)
        let cases = [
            (0x00, 8, 0),
            (0x01, 8, 1),
            (0x07, 8, 7),
            (0x08, 8, 0),
            (0x0F, 8, 7),
            (0x11, 8, 1),
            (0x1003, 8, 3),
            (0x1234, 16, 4),
            (0x1234, 64, 52),
        ];

        for (value, alignment, expected) in cases {
            assert_eq!(align_offset(value, alignment), expected);
            assert_eq!(is_aligned(value, alignment), expected == 0);
        }
    }

    #[test]
    fn round_up() {
        // (value, alignment, expected)
        let cases = [
            (0x00, 8, 0x00),
            (0x01, 8, 0x08),
            (0x07, 8, 0x08),
            (0x08, 8, 0x08),
            (0x09, 8, 0x10),
            (0x11, 8, 0x18),
            (0x1234, 16, 0x1240),
            (0x1234, 64, 0x1240),
            // Already aligned, no room to overflow.
            (usize::MAX - 7, 8, usize::MAX - 7),
            // Would overflow; saturates to the last aligned value.
            (usize::MAX - 6, 8, usize::MAX - 7),
            (usize::MAX, 4096, usize::MAX & !4095),
        ];

        for (value, alignment, expected) in cases {
            assert_eq!(align_up(value, alignment), expected);
        }
    }

    #[test]
    fn round_down() {
        // (value, alignment, expected)
        let cases = [
            (0x00, 8, 0x00),
            (0x01, 8, 0x00),
            (0x07, 8, 0x00),
            (0x08, 8, 0x08),
            (0x09, 8, 0x08),
            (0x1234, 16, 0x1230),
            (0x1234, 64, 0x1200),
            (usize::MAX, 8, usize::MAX & !7),
        ];

        for (value, alignment, expected) in cases {
            assert_eq!(align_down(value, alignment), expected);
        }
    }

    #[test]
    fn padding() {
        // (value, alignment, expected)
        let cases = [
            (0x00, 8, 0),
            (0x01, 8, 7),
            (0x07, 8, 1),
            (0x08, 8, 0),
            (0x09, 8, 7),
            (0x1234, 16, 12),
            (0x1234, 64, 12),
            (0x1234, 128, 76),
            (0x1234, 1, 0),
        ];

        for (value, alignment, expected) in cases {
            assert_eq!(padding_needed(value, alignment), expected);
        }
    }

    #[test]
    fn object_counts() {
        // (value, size, alignment, expected)
        let cases = [
            (0, 4, 4, 0),
            (1, 4, 4, 1),
            (4, 4, 4, 1),
            (5, 4, 4, 2),
            (8, 4, 4, 2),
            (9, 4, 4, 3),
            (10, 4, 8, 4),
            (15, 4, 8, 4),
            (17, 4, 8, 6),
            (64, 16, 32, 4),
            (65, 16, 64, 8),
            (1, 1, 8, 8),
        ];

        for (value, size, alignment, expected) in cases {
            assert_eq!(unit_count(value, size, alignment), expected);
        }
    }

    #[test]
    fn page_rounding() {
        let page = crate::platform::page_size();
        assert_eq!(align_up_pagesize(0), 0);
        assert_eq!(align_up_pagesize(1), page);
        assert_eq!(align_up_pagesize(page), page);
        assert_eq!(align_up_pagesize(page + 1), 2 * page);
    }

    fn arbitrary_alignment(shift: u8) -> usize {
        1 << (shift % 16)
    }

    #[quickcheck]
    fn rounding_round_trips(value: usize, shift: u8) -> bool {
        let alignment = arbitrary_alignment(shift);
        let down = align_down(value, alignment);
        let up = align_up(value, alignment);

        align_up(down, alignment) == down && align_down(up, alignment) == up
    }

    #[quickcheck]
    fn padding_reaches_the_next_boundary(value: usize, shift: u8) -> TestResult {
        let alignment = arbitrary_alignment(shift);
        if value > usize::MAX - alignment {
            return TestResult::discard();
        }

        TestResult::from_bool(align_up(value, alignment) == value + padding_needed(value, alignment))
    }

    #[quickcheck]
    fn power_of_two_matches_std(value: usize) -> bool {
        is_power_of_two(value) == value.is_power_of_two()
    }
}
