// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An arithmetic encoder that produces payloads for the decoder under test. It mirrors the
//! decoder's interval arithmetic exactly.

use super::range::{HALF, QUARTER};
use super::{AdaptiveContext, ContextTable, ESCAPE_SYMBOL};
use crate::util::bits::reverse_u8;

/// Zero bits appended after the flushed interval so that decoding the final symbol never moves the
/// cursor to the end of the payload.
const TAIL_PADDING_BITS: u32 = 32;

pub struct ArithmeticEncoder {
    low: u16,
    high: u16,
    underflow: u32,
    buf: Vec<u8>,
    bit_len: u64,
    contexts: ContextTable,
}

impl ArithmeticEncoder {
    pub fn new() -> Self {
        ArithmeticEncoder {
            low: 0,
            high: 0xffff,
            underflow: 0,
            buf: Vec::new(),
            bit_len: 0,
            contexts: ContextTable::new(),
        }
    }

    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextTable {
        &mut self.contexts
    }

    /// Encodes `value`, in the range `[1, total]`, with a static model.
    pub fn write_static_symbol(&mut self, total: u32, value: u32) {
        assert!(value >= 1 && value <= total);
        self.encode(value - 1, 1, total);
    }

    /// Encodes `symbol` with the adaptive model in `slot`. A symbol absent from the model is
    /// encoded as the escape symbol, and is then added to the model the way a reader of escaped
    /// values does.
    pub fn write_dynamic_symbol(&mut self, slot: u32, symbol: u32) {
        let context = self.contexts.get_or_create(slot);

        let coded = match context.symbol_cumulative_frequency(symbol) {
            Some(_) => symbol,
            None => ESCAPE_SYMBOL,
        };

        let (cumulative, freq, total) = Self::model(context, coded);

        context.add_symbol(coded);

        if coded != symbol {
            context.add_symbol(symbol);
        }

        self.encode(cumulative, freq, total);
    }

    /// Encodes the escape symbol with the adaptive model in `slot`, without introducing a symbol.
    pub fn write_escape(&mut self, slot: u32) {
        let context = self.contexts.get_or_create(slot);
        let (cumulative, freq, total) = Self::model(context, ESCAPE_SYMBOL);
        context.add_symbol(ESCAPE_SYMBOL);
        self.encode(cumulative, freq, total);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_static_symbol(0x100, u32::from(reverse_u8(value)) + 1);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_u8(value as u8);
        self.write_u8((value >> 8) as u8);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_u16(value as u16);
        self.write_u16((value >> 16) as u16);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_u32(value as u32);
        self.write_u32((value >> 32) as u32);
    }

    /// Flushes the interval and returns the payload.
    pub fn finish(mut self) -> Vec<u8> {
        self.underflow += 1;

        if self.low < QUARTER {
            self.emit_with_underflow(0);
        }
        else {
            self.emit_with_underflow(1);
        }

        for _ in 0..TAIL_PADDING_BITS {
            self.emit(0);
        }

        self.buf
    }

    fn model(context: &AdaptiveContext, symbol: u32) -> (u32, u32, u32) {
        let cumulative = context.symbol_cumulative_frequency(symbol).unwrap_or_default();
        (cumulative, context.symbol_frequency(symbol), context.total_symbol_frequency())
    }

    fn encode(&mut self, cumulative: u32, freq: u32, total: u32) {
        let range = u64::from(self.high) - u64::from(self.low) + 1;
        let low = u64::from(self.low);

        self.high = (low + range * u64::from(cumulative + freq) / u64::from(total) - 1) as u16;
        self.low = (low + range * u64::from(cumulative) / u64::from(total)) as u16;

        while (self.low & HALF) == (self.high & HALF) {
            self.emit_with_underflow(u8::from(self.low & HALF != 0));
            self.low = (self.low & 0x7fff) << 1;
            self.high = ((self.high & 0x7fff) << 1) | 1;
        }

        while (self.low & QUARTER) != 0 && (self.high & QUARTER) == 0 {
            self.low = (self.low & 0x3fff) << 1;
            self.high = ((self.high & 0x3fff) << 1) | 0x8001;
            self.underflow += 1;
        }
    }

    fn emit_with_underflow(&mut self, bit: u8) {
        self.emit(bit);

        for _ in 0..self.underflow {
            self.emit(bit ^ 1);
        }

        self.underflow = 0;
    }

    fn emit(&mut self, bit: u8) {
        let shift = (self.bit_len & 0x7) as u32;

        if shift == 0 {
            self.buf.push(0);
        }

        if let Some(last) = self.buf.last_mut() {
            *last |= bit << shift;
        }

        self.bit_len += 1;
    }
}
