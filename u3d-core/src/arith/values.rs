// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::{ArithmeticDecoder, Context, ESCAPE_SYMBOL};
use crate::errors::{symbol_lookup_error, Result};
use crate::io::BitSource;
use crate::util::bits::reverse_u8;

/// The static model total used to code an uncompressed byte.
const RAW_BYTE_TOTAL: u32 = 0x100;

/// Converts a decoded symbol to the value it codes, `symbol - 1`, failing if the value does not
/// fit the value type.
fn symbol_value<T: TryFrom<u32>>(symbol: u32) -> Result<T> {
    match T::try_from(symbol - 1) {
        Ok(value) => Ok(value),
        Err(_) => symbol_lookup_error("decoded value exceeds the range of the value type"),
    }
}

macro_rules! read_compressed_impl {
    ($name:ident, $raw:ident, $t:ty) => {
        /// Reads a value coded with the given context.
        ///
        /// With an adaptive context, symbol `n + 1` codes the value `n`. The escape symbol is
        /// followed by the value in its uncompressed form, and the value is then added to the
        /// context. With a static context, symbol `n + 1` codes the value `n`. The raw context
        /// reads the value uncompressed.
        ///
        /// A coded value too large for the value type fails the symbol lookup.
        pub fn $name(&mut self, src: &mut BitSource, context: Context) -> Result<$t> {
            match context {
                Context::Dynamic(slot) => {
                    let symbol = self.read_dynamic_symbol(src, slot)?;

                    if symbol != ESCAPE_SYMBOL {
                        return symbol_value(symbol);
                    }

                    let value = self.$raw(src)?;
                    self.contexts.get_or_create(slot).add_symbol(u32::from(value).wrapping_add(1));
                    Ok(value)
                }
                Context::Static(total) => {
                    let symbol = self.read_static_symbol(src, total)?;
                    symbol_value(symbol)
                }
                Context::Raw => self.$raw(src),
            }
        }
    };
}

impl ArithmeticDecoder {
    /// Reads an uncompressed byte.
    ///
    /// A byte is coded as one symbol of the static model with total `0x100`. The coded symbol is
    /// the byte with its bit order reversed.
    pub fn read_u8(&mut self, src: &mut BitSource) -> Result<u8> {
        let symbol = self.read_static_symbol(src, RAW_BYTE_TOTAL)?;
        Ok(reverse_u8((symbol - 1) as u8))
    }

    /// Reads an uncompressed little-endian `u16`.
    pub fn read_u16(&mut self, src: &mut BitSource) -> Result<u16> {
        let low = self.read_u8(src)?;
        let high = self.read_u8(src)?;
        Ok(u16::from(low) | (u16::from(high) << 8))
    }

    /// Reads an uncompressed little-endian `u32`.
    pub fn read_u32(&mut self, src: &mut BitSource) -> Result<u32> {
        let low = self.read_u16(src)?;
        let high = self.read_u16(src)?;
        Ok(u32::from(low) | (u32::from(high) << 16))
    }

    /// Reads an uncompressed little-endian `u64`.
    pub fn read_u64(&mut self, src: &mut BitSource) -> Result<u64> {
        let low = self.read_u32(src)?;
        let high = self.read_u32(src)?;
        Ok(u64::from(low) | (u64::from(high) << 32))
    }

    pub fn read_i16(&mut self, src: &mut BitSource) -> Result<i16> {
        Ok(self.read_u16(src)? as i16)
    }

    pub fn read_i32(&mut self, src: &mut BitSource) -> Result<i32> {
        Ok(self.read_u32(src)? as i32)
    }

    pub fn read_f32(&mut self, src: &mut BitSource) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32(src)?))
    }

    pub fn read_f64(&mut self, src: &mut BitSource) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64(src)?))
    }

    /// Reads a string: a `u16` byte count followed by that many bytes. Invalid UTF-8 sequences
    /// are replaced.
    pub fn read_string(&mut self, src: &mut BitSource) -> Result<String> {
        let len = self.read_u16(src)?;

        let bytes = (0..len).map(|_| self.read_u8(src)).collect::<Result<Vec<u8>>>()?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    read_compressed_impl!(read_compressed_u8, read_u8, u8);
    read_compressed_impl!(read_compressed_u16, read_u16, u16);
    read_compressed_impl!(read_compressed_u32, read_u32, u32);
}
