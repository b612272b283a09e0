// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use crate::util::bits::mask_lower_u64;

/// Rounds a payload size up to the 4-byte boundary it is padded to on disk.
#[inline(always)]
pub(crate) fn padded_len(size: u32) -> usize {
    ((u64::from(size) + 3) & !3) as usize
}

/// The size of the zeroed word appended after a payload so reads slightly past its end are
/// served zeros.
pub(crate) const SENTINEL_LEN: usize = 4;

/// `BitSource` provides random access, at bit granularity, to one payload of a block.
///
/// A payload is a sequence of little-endian 32-bit words whose bits are consumed from
/// least-significant to most-significant. Stated another way, stream bit `i` is bit `i % 8` of
/// byte `i / 8`.
///
/// The payload buffer is padded to a multiple of 4 bytes, followed by one zeroed sentinel word.
/// Reads beyond the end of the buffer return zero bits. Whether the cursor has reached or passed
/// the declared size is reported by [`BitSource::is_exhausted`] and [`BitSource::is_overrun`], not
/// by the reads themselves.
#[derive(Clone, Debug, Default)]
pub struct BitSource {
    buf: Box<[u8]>,
    byte_len: u32,
    bit_position: u64,
}

impl BitSource {
    /// Instantiate a `BitSource` over a copy of `data`, which is treated as the declared payload.
    pub fn new(data: &[u8]) -> Self {
        let byte_len = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let mut buf = vec![0u8; padded_len(byte_len) + SENTINEL_LEN];

        let len = min(data.len(), byte_len as usize);
        buf[..len].copy_from_slice(&data[..len]);

        BitSource { buf: buf.into_boxed_slice(), byte_len, bit_position: 0 }
    }

    /// Instantiate a `BitSource` that takes ownership of an already padded buffer. `buf` must be
    /// at least `padded_len(byte_len) + SENTINEL_LEN` bytes long with the trailing sentinel word
    /// zeroed.
    pub(crate) fn from_padded(buf: Vec<u8>, byte_len: u32) -> Self {
        debug_assert!(buf.len() >= padded_len(byte_len) + SENTINEL_LEN);
        debug_assert!(buf[buf.len() - SENTINEL_LEN..].iter().all(|&b| b == 0));

        BitSource { buf: buf.into_boxed_slice(), byte_len, bit_position: 0 }
    }

    /// Gets the declared length of the payload in bytes.
    pub fn byte_len(&self) -> u32 {
        self.byte_len
    }

    /// Gets the declared length of the payload in bits.
    pub fn bit_len(&self) -> u64 {
        8 * u64::from(self.byte_len)
    }

    /// Gets the payload bytes, including any padding but excluding the sentinel word.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.buf.len() - SENTINEL_LEN]
    }

    /// Gets the absolute position of the bit cursor.
    #[inline(always)]
    pub fn bit_position(&self) -> u64 {
        self.bit_position
    }

    /// Moves the bit cursor to an absolute bit position.
    #[inline(always)]
    pub fn seek_bits(&mut self, bit_position: u64) {
        self.bit_position = bit_position;
    }

    /// Advances the bit cursor without reading.
    #[inline(always)]
    pub fn ignore_bits(&mut self, num_bits: u64) {
        self.bit_position = self.bit_position.saturating_add(num_bits);
    }

    /// Returns true if the bit cursor is at or beyond the declared payload length.
    #[inline(always)]
    pub fn is_exhausted(&self) -> bool {
        self.bit_position >= self.bit_len()
    }

    /// Returns true if the bit cursor is strictly beyond the declared payload length, meaning
    /// bits that were never declared have been consumed.
    #[inline(always)]
    pub fn is_overrun(&self) -> bool {
        self.bit_position > self.bit_len()
    }

    /// Reads a single bit and advances the cursor by one.
    #[inline(always)]
    pub fn read_bit(&mut self) -> u32 {
        let byte = self.byte_at(self.bit_position >> 3);
        let bit = (byte >> (self.bit_position & 0x7)) & 1;

        self.bit_position = self.bit_position.saturating_add(1);
        u32::from(bit)
    }

    /// Reads up-to 32 bits and advances the cursor by `bit_width`. The first bit read is bit 0 of
    /// the returned value.
    ///
    /// The result is identical to composing `bit_width` calls of [`BitSource::read_bit`].
    #[inline(always)]
    pub fn read_bits(&mut self, bit_width: u32) -> u32 {
        debug_assert!(bit_width <= u32::BITS);

        // At most 7 bits of the first byte are skipped, so 5 bytes always cover the 32 bits that
        // may be requested. Load 8 for a single little-endian word.
        let first = self.bit_position >> 3;
        let shift = (self.bit_position & 0x7) as u32;

        let mut word = [0u8; 8];
        for (i, byte) in word.iter_mut().enumerate() {
            *byte = self.byte_at(first + i as u64);
        }

        let bits = (u64::from_le_bytes(word) >> shift) & mask_lower_u64(bit_width);

        self.bit_position = self.bit_position.saturating_add(u64::from(bit_width));
        bits as u32
    }

    #[inline(always)]
    fn byte_at(&self, index: u64) -> u8 {
        usize::try_from(index).ok().and_then(|i| self.buf.get(i)).copied().unwrap_or(0)
    }
}
