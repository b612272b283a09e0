// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::errors::{symbol_lookup_error, Result};

/// The most-significant bit of the 16-bit coding interval.
pub(crate) const HALF: u16 = 0x8000;
/// The second most-significant bit of the 16-bit coding interval.
pub(crate) const QUARTER: u16 = 0x4000;

/// `RangeState` is the running coding interval `[low, high]` of the arithmetic decoder, with
/// 16 bits of precision, and the count of pending underflow (carry straddle) steps.
///
/// After every call to [`RangeState::renormalize`] the top bits of `low` and `high` differ and
/// the interval does not straddle the midpoint, so `high - low + 1` is always greater than
/// `0x4000`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RangeState {
    low: u16,
    high: u16,
    underflow: u32,
}

impl Default for RangeState {
    fn default() -> Self {
        RangeState { low: 0, high: 0xffff, underflow: 0 }
    }
}

impl RangeState {
    /// Instantiate the full coding interval.
    pub fn new() -> Self {
        Default::default()
    }

    /// Instantiate a `RangeState` from raw parts. Requires `low <= high`.
    pub fn from_parts(low: u16, high: u16, underflow: u32) -> Self {
        debug_assert!(low <= high);
        RangeState { low, high, underflow }
    }

    /// Gets the lower bound of the interval.
    pub fn low(&self) -> u16 {
        self.low
    }

    /// Gets the upper bound of the interval (inclusive).
    pub fn high(&self) -> u16 {
        self.high
    }

    /// Gets the number of pending underflow steps.
    pub fn underflow(&self) -> u32 {
        self.underflow
    }

    /// Gets the width of the interval, `high - low + 1`, in the range [1, 0x10000].
    #[inline(always)]
    pub fn range(&self) -> u32 {
        u32::from(self.high) - u32::from(self.low) + 1
    }

    /// Maps a code value onto the cumulative frequency scale of a model with total frequency
    /// `total`: `floor((total * (1 + code - low) - 1) / range)`.
    ///
    /// The code must lie within the interval. A code outside it can only come from a corrupt
    /// stream and fails the lookup.
    #[inline(always)]
    pub fn cum_freq(&self, code: u16, total: u32) -> Result<u32> {
        debug_assert!(total > 0);

        if code < self.low || code > self.high {
            return symbol_lookup_error("code value lies outside the coding interval");
        }

        let offset = u64::from(code - self.low) + 1;
        let cum_freq = (u64::from(total) * offset - 1) / u64::from(self.range());

        // The offset is at most the range, so the result is always less than total.
        Ok(cum_freq as u32)
    }

    /// Narrows the interval to the sub-interval `[cumulative, cumulative + freq)` of a model with
    /// total frequency `total`.
    ///
    /// Requires `freq > 0` and `cumulative + freq <= total`, and `total` small enough that the
    /// sub-interval is not empty (see [`super::MAX_STATIC_TOTAL`]).
    #[inline(always)]
    pub fn narrow(&mut self, cumulative: u32, freq: u32, total: u32) {
        debug_assert!(freq > 0);
        debug_assert!(cumulative + freq <= total);

        let range = u64::from(self.range());
        let low = u64::from(self.low);

        let high = low + range * u64::from(cumulative + freq) / u64::from(total) - 1;
        let low = low + range * u64::from(cumulative) / u64::from(total);

        debug_assert!(low <= high && high <= 0xffff);

        self.high = high as u16;
        self.low = low as u16;
    }

    /// Renormalizes the interval after it was narrowed, and returns the number of bits the bit
    /// cursor must advance.
    ///
    /// While the top bits of `low` and `high` agree, that bit is settled and is shifted out. Once
    /// any bit is shifted out, the pending underflow bits are settled along with it. Then, while
    /// the interval straddles the midpoint with `low` in the second quarter and `high` in the
    /// third, the second bit is removed and counted as a pending underflow step.
    pub fn renormalize(&mut self) -> u32 {
        let mut low = self.low;
        let mut high = self.high;

        let mut bit_count = 0;

        while (low & HALF) == (high & HALF) {
            low = (low & 0x7fff) << 1;
            high = ((high & 0x7fff) << 1) | 1;
            bit_count += 1;
        }

        if bit_count > 0 {
            bit_count += self.underflow;
            self.underflow = 0;
        }

        while (low & QUARTER) != 0 && (high & QUARTER) == 0 {
            low = (low & 0x3fff) << 1;
            high = ((high & 0x3fff) << 1) | 0x8001;
            self.underflow += 1;
        }

        self.low = low;
        self.high = high;

        bit_count
    }
}
