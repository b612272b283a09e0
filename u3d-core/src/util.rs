// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `util` module provides a repository of commonly used utility functions.

pub mod bits {
    //! Utilities for bit manipulation.

    /// Bit-reversal look-up table. `BIT_REVERSE[b]` is `b` with bit 7 swapped with bit 0, bit 6
    /// swapped with bit 1, and so on.
    pub static BIT_REVERSE: [u8; 256] = build_bit_reverse_table();

    const fn build_bit_reverse_table() -> [u8; 256] {
        let mut table = [0u8; 256];
        let mut i = 0;

        while i < 256 {
            table[i] = (i as u8).reverse_bits();
            i += 1;
        }

        table
    }

    /// Reverses the bits of a byte.
    #[inline(always)]
    pub fn reverse_u8(value: u8) -> u8 {
        BIT_REVERSE[usize::from(value)]
    }

    /// Reverses the low 15 bits of `value`, using the byte table on each half.
    ///
    /// Bit 0 of the input lands in bit 14 of the output, and bit 14 lands in bit 0. Bits above
    /// bit 14 are ignored.
    #[inline(always)]
    pub fn reverse_u15(value: u32) -> u32 {
        let lo = reverse_u8((value & 0xff) as u8);
        let hi = reverse_u8(((value >> 8) & 0x7f) as u8);

        (u32::from(lo) << 7) | (u32::from(hi) >> 1)
    }

    /// Masks the lower `n` bits of a 64-bit value. `n` may be in the range [0, 64].
    #[inline(always)]
    pub fn mask_lower_u64(n: u32) -> u64 {
        debug_assert!(n <= u64::BITS);
        if n == u64::BITS {
            u64::MAX
        }
        else {
            (1 << n) - 1
        }
    }
}
