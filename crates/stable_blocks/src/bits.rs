//! ## Bit Position Addressing
//! Finding the most significant set bit of an index, used to map a logical
//! index onto the block that contains it.
//!
//! Two implementations are kept side by side:
//! - [`most_significant_active_bit_const`] is a shift loop, usable in `const`
//!   contexts (e.g. sizing a block directory from a const generic).
//! - [`most_significant_active_bit`] is the hot path, using [`usize::leading_zeros`]
//!   (a single `lzcnt`/`bsr` on most targets). With the `portable-msb` feature
//!   it falls back to the loop.
//!
//! Both return identical results for every non-zero input.

/// Index of the highest set bit of `num`, e.g. `33 = 0b100001` gives `5`.
///
/// `num` must be non-zero. For zero this returns `0`, which is
/// indistinguishable from `num == 1`.
///
/// ```
/// use stable_blocks::bits::most_significant_active_bit_const;
/// const BLOCKS: usize = most_significant_active_bit_const(1 << 20);
/// assert_eq!(BLOCKS, 20);
/// ```
pub const fn most_significant_active_bit_const(mut num: usize) -> usize {
    let mut result = 0;
    num >>= 1;
    while num != 0 {
        result += 1;
        num >>= 1;
    }
    result
}

/// Index of the highest set bit of `num`, e.g. `33 = 0b100001` gives `5`.
///
/// `num` must be non-zero (checked only in debug builds).
///
/// ```
/// use stable_blocks::bits::most_significant_active_bit;
/// assert_eq!(most_significant_active_bit(33), 5);
/// assert_eq!(most_significant_active_bit(1), 0);
/// assert_eq!(most_significant_active_bit(8), 3);
/// ```
#[inline(always)]
pub fn most_significant_active_bit(num: usize) -> usize {
    debug_assert_ne!(num, 0, "the most significant bit of zero is undefined");

    if cfg!(feature = "portable-msb") {
        most_significant_active_bit_const(num)
    } else {
        leading_zeros_msb(num)
    }
}

// Compiled regardless of features so the equivalence with the loop can always be checked.
#[inline(always)]
fn leading_zeros_msb(num: usize) -> usize {
    (usize::BITS - 1 - num.leading_zeros()) as usize
}

/// The number of bits needed to address `count` distinct values, i.e. `ceil(log2(count))`.
/// - `0` and `1` need no bits.
pub(crate) const fn ceil_log2(count: usize) -> usize {
    if count <= 1 {
        0
    } else {
        most_significant_active_bit_const(count - 1) + 1
    }
}


#[cfg(kani)]
mod kani_verif {
    use super::*;

    #[kani::proof]
    #[kani::unwind(65)]
    fn check_msb_agree() {
        let num: usize = kani::any();
        kani::assume(num != 0);
        assert_eq!(most_significant_active_bit_const(num), leading_zeros_msb(num));
    }
}
