// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `arith` module implements the context-adaptive binary arithmetic decoder used by U3D
//! block payloads.
//!
//! The decoder is a classic range decoder with 16 bits of precision. The code value is never
//! held as state. Instead, it is reconstructed from the payload before every symbol: the bit at
//! the cursor, then the 15 bits that follow the pending underflow bits. The cursor only moves by
//! the number of bits renormalization settles.
//!
//! Two kinds of model are supported. A static model is a uniform distribution whose total is
//! supplied by the caller. A dynamic model is an [`AdaptiveContext`] from the decoder's
//! [`ContextTable`] that is reinforced after every symbol decoded with it.

use log::warn;

use crate::errors::{invalid_context_error, overrun_error, Overrun, Result};
use crate::io::BitSource;
use crate::util::bits::reverse_u15;

mod context;
#[cfg(test)]
mod encoder;
mod range;
mod values;

pub use context::*;
pub use range::RangeState;

/// `DecoderOptions` is a common set of options that the arithmetic decoder uses.
#[derive(Copy, Clone, Debug, Default)]
pub struct DecoderOptions {
    /// Fail with [`crate::errors::Error::BufferOverrun`] when a symbol moves the bit cursor past
    /// the declared data size. When `false`, the overrun is logged and recorded, and decoding
    /// continues.
    pub fail_on_overrun: bool,
}

/// `ArithmeticDecoder` holds the state of one decoding session: the coding interval, the adaptive
/// contexts, and any overrun observed.
///
/// The payload being decoded is passed to each call. The coding interval belongs to one payload
/// and must be [reset](ArithmeticDecoder::reset) when a new payload begins. The adaptive contexts
/// persist until [`ArithmeticDecoder::reset_contexts`] is called.
#[derive(Clone, Debug, Default)]
pub struct ArithmeticDecoder {
    range: RangeState,
    contexts: ContextTable,
    overrun: Option<Overrun>,
    opts: DecoderOptions,
}

impl ArithmeticDecoder {
    /// Instantiate a new decoding session.
    pub fn new(opts: DecoderOptions) -> Self {
        ArithmeticDecoder { opts, ..Default::default() }
    }

    /// Resets the coding interval and the overrun record to begin decoding a new payload.
    pub fn reset(&mut self) {
        self.range = RangeState::new();
        self.overrun = None;
    }

    /// Removes all adaptive contexts.
    pub fn reset_contexts(&mut self) {
        self.contexts.clear();
    }

    /// Gets the coding interval.
    pub fn range(&self) -> &RangeState {
        &self.range
    }

    /// Gets the adaptive context table.
    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    /// Gets the adaptive context table mutably, for example to register initial models.
    pub fn contexts_mut(&mut self) -> &mut ContextTable {
        &mut self.contexts
    }

    /// Gets the first overrun observed since the last reset, if any.
    pub fn overrun(&self) -> Option<Overrun> {
        self.overrun
    }

    /// Decodes one symbol using a static model with total frequency `context`, and returns the
    /// decoded cumulative frequency plus one. The result is in the range `[1, context]`.
    pub fn read_static_symbol(&mut self, src: &mut BitSource, context: u32) -> Result<u32> {
        if context == 0 || context > MAX_STATIC_TOTAL {
            return invalid_context_error(context);
        }

        let code = self.peek_code(src);

        let cum_freq = self.range.cum_freq(code, context)?;

        self.range.narrow(cum_freq, 1, context);

        self.advance(src)?;

        Ok(cum_freq + 1)
    }

    /// Decodes one symbol using the adaptive model in context slot `slot`, then reinforces the
    /// decoded symbol in that model.
    pub fn read_dynamic_symbol(&mut self, src: &mut BitSource, slot: u32) -> Result<u32> {
        let code = self.peek_code(src);

        let context = self.contexts.get_or_create(slot);

        let total = context.total_symbol_frequency();

        if total == 0 || total > MAX_STATIC_TOTAL {
            return invalid_context_error(slot);
        }

        let cum_freq = self.range.cum_freq(code, total)?;

        let (symbol, cumulative) = context.symbol_from_frequency(cum_freq)?;
        let freq = context.symbol_frequency(symbol);

        self.range.narrow(cumulative, freq, total);

        context.add_symbol(symbol);

        self.advance(src)?;

        Ok(symbol)
    }

    /// Decodes one symbol with the given context.
    ///
    /// The raw context does not model symbols and is rejected as an invalid context.
    pub fn read_symbol(&mut self, src: &mut BitSource, context: Context) -> Result<u32> {
        match context {
            Context::Static(total) => self.read_static_symbol(src, total),
            Context::Dynamic(slot) => self.read_dynamic_symbol(src, slot),
            Context::Raw => invalid_context_error(0),
        }
    }

    /// Reconstructs the 16-bit code value at the bit cursor without moving it.
    ///
    /// The bit at the cursor is the most-significant bit of the code. The pending underflow bits
    /// that follow it were removed from the interval by renormalization, so they are skipped. The
    /// next 15 bits are read with the first bit read in bit 0, and are reversed so that it becomes
    /// bit 14 of the code.
    fn peek_code(&self, src: &mut BitSource) -> u16 {
        let checkpoint = src.bit_position();

        let mut code = src.read_bit() << 15;

        src.ignore_bits(u64::from(self.range.underflow()));

        code |= reverse_u15(src.read_bits(15));

        src.seek_bits(checkpoint);

        code as u16
    }

    /// Renormalizes the interval after a symbol was decoded, moves the bit cursor past the settled
    /// bits, and checks for an overrun.
    fn advance(&mut self, src: &mut BitSource) -> Result<()> {
        let bit_count = self.range.renormalize();

        src.ignore_bits(u64::from(bit_count));

        if src.is_overrun() {
            let overrun = Overrun { bit_position: src.bit_position(), bit_len: src.bit_len() };

            if self.opts.fail_on_overrun {
                return overrun_error(overrun);
            }

            if self.overrun.is_none() {
                warn!("data buffer overrun: {}", overrun);
                self.overrun = Some(overrun);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::encoder::ArithmeticEncoder;
    use super::*;
    use crate::errors::Error;

    #[test]
    fn verify_static_symbol_quartiles() {
        // With the full interval, the code value alone selects the quartile of a static model of
        // total 4. The code is the first bit followed by the next 15 in stream order, and the
        // stream is consumed least-significant bit first.
        //
        // Code 0b01xx_xxxx_xxxx_xxxx: first bit 0, second bit 1.
        let mut src = BitSource::new(&[0b0000_0010, 0, 0, 0]);
        let mut dec = ArithmeticDecoder::new(Default::default());

        assert_eq!(dec.read_static_symbol(&mut src, 4).unwrap(), 2);

        // The interval narrowed to the second quartile [0x4000, 0x7fff], and both of its bits
        // settled.
        assert_eq!(src.bit_position(), 2);
        assert_eq!(*dec.range(), RangeState::new());

        for (byte, value) in [(0b00u8, 1), (0b10, 2), (0b01, 3), (0b11, 4)] {
            let mut src = BitSource::new(&[byte, 0, 0, 0]);
            let mut dec = ArithmeticDecoder::new(Default::default());
            assert_eq!(dec.read_static_symbol(&mut src, 4).unwrap(), value);
        }
    }

    #[test]
    fn verify_invalid_contexts() {
        let mut src = BitSource::new(&[0xff; 8]);
        let mut dec = ArithmeticDecoder::new(Default::default());

        assert!(matches!(dec.read_static_symbol(&mut src, 0), Err(Error::InvalidContext(0))));
        assert!(matches!(
            dec.read_static_symbol(&mut src, MAX_STATIC_TOTAL + 1),
            Err(Error::InvalidContext(_))
        ));
        assert!(matches!(dec.read_symbol(&mut src, Context::Raw), Err(Error::InvalidContext(0))));

        dec.contexts_mut().insert(5, AdaptiveContext::with_frequencies(Vec::<(u32, u32)>::new()));
        assert!(matches!(dec.read_dynamic_symbol(&mut src, 5), Err(Error::InvalidContext(5))));

        // Nothing was consumed.
        assert_eq!(src.bit_position(), 0);
    }

    #[test]
    fn verify_peek_code_restores_cursor() {
        let mut src = BitSource::new(&[0xa5, 0x5a, 0xc3, 0x3c]);
        let mut dec = ArithmeticDecoder::new(Default::default());

        dec.range = RangeState::from_parts(0x4000, 0xbfff, 0);
        src.seek_bits(3);

        let code = dec.peek_code(&mut src);
        assert_eq!(src.bit_position(), 3);

        // Bits 3.. of the stream in order are the code's bits from 15 downwards.
        let mut expected = 0u16;
        let mut probe = BitSource::new(&[0xa5, 0x5a, 0xc3, 0x3c]);
        probe.seek_bits(3);
        for _ in 0..16 {
            expected = (expected << 1) | probe.read_bit() as u16;
        }
        assert_eq!(code, expected);
    }

    #[test]
    fn verify_dynamic_symbols_round_trip() {
        let mut rng = SmallRng::seed_from_u64(0x0044_3355);

        let alphabet = [(0, 1), (1, 1), (2, 1), (3, 1)];
        let symbols: Vec<u32> = (0..4000).map(|_| rng.random_range(0..4)).collect();

        let mut enc = ArithmeticEncoder::new();
        enc.contexts_mut().insert(1, AdaptiveContext::with_frequencies(alphabet));
        for &symbol in &symbols {
            enc.write_dynamic_symbol(1, symbol);
        }
        let enc_context = enc.contexts().get(1).cloned();
        let data = enc.finish();

        let mut src = BitSource::new(&data);
        let mut dec = ArithmeticDecoder::new(DecoderOptions { fail_on_overrun: true });
        dec.contexts_mut().insert(1, AdaptiveContext::with_frequencies(alphabet));

        for &symbol in &symbols {
            assert_eq!(dec.read_dynamic_symbol(&mut src, 1).unwrap(), symbol);
        }

        assert!(dec.overrun().is_none());
        assert_eq!(dec.contexts().get(1), enc_context.as_ref());
    }

    #[test]
    fn verify_skewed_symbols_round_trip() {
        // Heavily skewed sources drive long runs of settled bits and underflow steps, and push
        // the context past the rescale threshold.
        let mut rng = SmallRng::seed_from_u64(7);

        let symbols: Vec<u32> =
            (0..20_000).map(|_| if rng.random_range(0..100) < 97 { 1 } else { 2 }).collect();

        let mut enc = ArithmeticEncoder::new();
        enc.contexts_mut().insert(9, AdaptiveContext::with_frequencies([(1, 1), (2, 1)]));
        for &symbol in &symbols {
            enc.write_dynamic_symbol(9, symbol);
        }
        let data = enc.finish();

        let mut src = BitSource::new(&data);
        let mut dec = ArithmeticDecoder::new(DecoderOptions { fail_on_overrun: true });
        dec.contexts_mut().insert(9, AdaptiveContext::with_frequencies([(1, 1), (2, 1)]));

        for &symbol in &symbols {
            assert_eq!(dec.read_dynamic_symbol(&mut src, 9).unwrap(), symbol);
        }
    }

    #[test]
    fn verify_mixed_models_round_trip() {
        let mut rng = SmallRng::seed_from_u64(0xdead_beef);

        enum Op {
            Static(u32, u32),
            Dynamic(u32, u32),
        }

        let ops: Vec<Op> = (0..5000)
            .map(|_| {
                if rng.random_bool(0.5) {
                    let total = rng.random_range(1..=MAX_STATIC_TOTAL);
                    Op::Static(total, rng.random_range(1..=total))
                }
                else {
                    Op::Dynamic(rng.random_range(1..4), rng.random_range(1..40))
                }
            })
            .collect();

        let mut enc = ArithmeticEncoder::new();
        for op in &ops {
            match *op {
                Op::Static(total, value) => enc.write_static_symbol(total, value),
                Op::Dynamic(slot, symbol) => enc.write_dynamic_symbol(slot, symbol),
            }
        }
        let data = enc.finish();

        let mut src = BitSource::new(&data);
        let mut dec = ArithmeticDecoder::new(DecoderOptions { fail_on_overrun: true });

        for op in &ops {
            match *op {
                Op::Static(total, value) => {
                    assert_eq!(dec.read_static_symbol(&mut src, total).unwrap(), value);
                }
                Op::Dynamic(slot, symbol) => {
                    let decoded = dec.read_dynamic_symbol(&mut src, slot).unwrap();
                    if decoded == ESCAPE_SYMBOL {
                        // The escape symbol was decoded. The encoder then introduced the symbol.
                        dec.contexts_mut().get_or_create(slot).add_symbol(symbol);
                    }
                    else {
                        assert_eq!(decoded, symbol);
                    }
                }
            }
        }
    }

    #[test]
    fn verify_decoding_is_deterministic() {
        let data: Vec<u8> = (0..256u32).map(|i| (i.wrapping_mul(0x6b) >> 1) as u8).collect();

        let decode = || {
            let mut src = BitSource::new(&data);
            let mut dec = ArithmeticDecoder::new(Default::default());
            dec.contexts_mut().insert(2, AdaptiveContext::with_frequencies([(0, 3), (1, 2), (5, 1)]));

            (0..300).map(|_| dec.read_dynamic_symbol(&mut src, 2).unwrap()).collect::<Vec<u32>>()
        };

        assert_eq!(decode(), decode());
    }

    #[test]
    fn verify_overrun() {
        // An empty payload is exhausted from the first symbol, but reads are still served zeros.
        let mut src = BitSource::new(&[]);
        let mut dec = ArithmeticDecoder::new(Default::default());

        assert_eq!(dec.read_static_symbol(&mut src, 4).unwrap(), 1);
        assert_eq!(dec.overrun(), Some(Overrun { bit_position: 2, bit_len: 0 }));

        // Only the first overrun is recorded.
        assert_eq!(dec.read_dynamic_symbol(&mut src, 1).unwrap(), ESCAPE_SYMBOL);
        assert_eq!(dec.overrun().unwrap().bit_position, 2);

        dec.reset();
        assert!(dec.overrun().is_none());

        // A strict decoder fails instead, but only once the cursor passes the declared length.
        let mut src = BitSource::new(&[0x00]);
        let mut dec = ArithmeticDecoder::new(DecoderOptions { fail_on_overrun: true });

        for _ in 0..8 {
            assert_eq!(dec.read_static_symbol(&mut src, 2).unwrap(), 1);
        }
        assert_eq!(src.bit_position(), 8);
        assert!(dec.overrun().is_none());

        assert!(matches!(
            dec.read_static_symbol(&mut src, 2),
            Err(Error::BufferOverrun(Overrun { bit_position: 9, bit_len: 8 }))
        ));
    }

    #[test]
    fn verify_exact_payload_is_not_overrun() {
        // Each byte decoded from the full interval settles exactly 8 bits, so this payload ends
        // on the last bit of the last value.
        let data = [0x55, 0x33, 0x44, 0x00];

        let mut src = BitSource::new(&data);
        let mut dec = ArithmeticDecoder::new(DecoderOptions { fail_on_overrun: true });

        for _ in 0..data.len() {
            dec.read_static_symbol(&mut src, 0x100).unwrap();
        }

        assert_eq!(src.bit_position(), src.bit_len());
        assert!(dec.overrun().is_none());

        let mut src = BitSource::new(&data);
        let mut dec = ArithmeticDecoder::new(Default::default());

        for _ in 0..data.len() {
            dec.read_static_symbol(&mut src, 0x100).unwrap();
        }
        assert!(dec.overrun().is_none());

        // One more symbol consumes undeclared bits.
        dec.read_static_symbol(&mut src, 0x100).unwrap();
        assert_eq!(dec.overrun(), Some(Overrun { bit_position: 40, bit_len: 32 }));
    }

    #[test]
    fn verify_contexts_persist_across_reset() {
        let mut src = BitSource::new(&[0u8; 16]);
        let mut dec = ArithmeticDecoder::new(Default::default());

        dec.read_dynamic_symbol(&mut src, 3).unwrap();
        assert_eq!(dec.contexts().get(3).unwrap().symbol_frequency(ESCAPE_SYMBOL), 2);

        dec.reset();
        assert_eq!(*dec.range(), RangeState::new());
        assert_eq!(dec.contexts().get(3).unwrap().symbol_frequency(ESCAPE_SYMBOL), 2);

        dec.reset_contexts();
        assert!(dec.contexts().is_empty());
    }
}
