//! Bit-field helpers shared by both decoders.
//!
//! Bit positions are inclusive and counted from the least significant bit.
//! Callers pass constant, in-range positions; out-of-range positions are a
//! programming error, not a runtime condition.

/// Bits `lo..=hi` of `word`, right-justified.
#[inline]
pub const fn bit_range(word: u32, lo: u32, hi: u32) -> u32 {
    debug_assert!(lo <= hi && hi < 32);
    let width = hi - lo + 1;
    if width == 32 {
        word
    } else {
        (word >> lo) & ((1 << width) - 1)
    }
}

#[inline]
pub const fn bit_at(word: u32, n: u32) -> u32 {
    bit_range(word, n, n)
}

#[inline]
pub const fn bit_set(word: u32, n: u32) -> bool {
    bit_at(word, n) == 1
}

/// Rotate `value` right by `amount` within a `width`-bit field.
#[inline]
pub const fn rotate_right(value: u32, width: u32, amount: u32) -> u32 {
    debug_assert!(width > 0 && width <= 32);
    let mask = if width == 32 { u32::MAX } else { (1 << width) - 1 };
    let value = value & mask;
    let amount = amount % width;
    if amount == 0 {
        return value;
    }
    ((value >> amount) | (value << (width - amount))) & mask
}

/// Left shift truncated to 32 bits.
#[inline]
pub const fn left_shift(value: u32, n: u32) -> u32 {
    value.wrapping_shl(n)
}

/// Sign-extend the low `bits` bits of `v`.
#[inline]
pub const fn sign_extend(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    ((v << s) as i32) >> s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_extracts_inclusive_fields() {
        assert_eq!(bit_range(0xE12F_FF1E, 8, 27), 0x12FFF);
        assert_eq!(bit_range(0xE12F_FF1E, 0, 3), 0xE);
        assert_eq!(bit_range(0xE12F_FF1E, 28, 31), 0xE);
        assert_eq!(bit_range(0xDEAD_BEEF, 0, 31), 0xDEAD_BEEF);
        assert_eq!(bit_at(0x8000_0000, 31), 1);
        assert!(!bit_set(0x8000_0000, 30));
    }

    #[test]
    fn rotate_wraps_low_bits_to_top() {
        assert_eq!(rotate_right(0xFF, 32, 8), 0xFF00_0000);
        assert_eq!(rotate_right(0x3F, 32, 30), 0xFC);
        assert_eq!(rotate_right(0x1, 32, 2), 0x4000_0000);
        assert_eq!(rotate_right(0xAB, 32, 0), 0xAB);
        // narrower field
        assert_eq!(rotate_right(0b0001, 4, 1), 0b1000);
    }

    #[test]
    fn shift_and_sign_extension() {
        assert_eq!(left_shift(0x7FF, 12), 0x7F_F000);
        assert_eq!(left_shift(1, 31), 0x8000_0000);
        assert_eq!(sign_extend(0xFF_FFFF, 24), -1);
        assert_eq!(sign_extend(0x7F_FFFF, 24), 0x7F_FFFF);
        assert_eq!(sign_extend(0x80, 8), -128);
    }
}
