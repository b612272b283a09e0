// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use hashbrown::HashMap;
use log::debug;

use crate::errors::{symbol_lookup_error, Result};

/// The escape symbol. A fresh dynamic context contains only this symbol.
pub const ESCAPE_SYMBOL: u32 = 0;

/// The largest total frequency a static context may have.
pub const MAX_STATIC_TOTAL: u32 = 0x3fff;

/// An adaptive context is rescaled once its total frequency exceeds this value.
pub const RESCALE_THRESHOLD: u32 = 0x1fff;

/// The frequency added to a symbol each time it is decoded.
pub const SYMBOL_INCREMENT: u32 = 1;

/// Context identifiers below this value (and above 0) address dynamic contexts. At and above it,
/// the identifier addresses a static context with total `id - STATIC_CONTEXT_BASE`.
pub const STATIC_CONTEXT_BASE: u32 = 0x400;

/// Context identifiers at or above this value are raw.
pub const MAX_CONTEXT_ID: u32 = STATIC_CONTEXT_BASE + MAX_STATIC_TOTAL;

/// `Context` selects the probability model used to decode a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Context {
    /// The value is not modelled, and is read using the full-range static model.
    Raw,
    /// A fixed, uniform model with the given total frequency.
    Static(u32),
    /// The adaptive model in the given slot of the decoder's context table.
    Dynamic(u32),
}

impl Context {
    /// Maps a context identifier, as used by the file format, to a `Context`.
    pub fn from_id(id: u32) -> Context {
        match id {
            0 => Context::Raw,
            id if id < STATIC_CONTEXT_BASE => Context::Dynamic(id),
            id if id < MAX_CONTEXT_ID => Context::Static(id - STATIC_CONTEXT_BASE),
            _ => Context::Raw,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SymbolEntry {
    symbol: u32,
    cumulative: u32,
    freq: u32,
}

impl SymbolEntry {
    #[inline(always)]
    fn end(&self) -> u32 {
        self.cumulative + self.freq
    }
}

/// `AdaptiveContext` is a frequency table that adapts to the symbols decoded with it.
///
/// Symbols are kept in ascending order. Each symbol owns the half-open interval
/// `[cumulative, cumulative + freq)` of the cumulative frequency scale, and the intervals are
/// contiguous from 0 to the total frequency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdaptiveContext {
    entries: Vec<SymbolEntry>,
    total: u32,
}

impl Default for AdaptiveContext {
    fn default() -> Self {
        AdaptiveContext::new()
    }
}

impl AdaptiveContext {
    /// Instantiate a context containing only the escape symbol with a frequency of 1.
    pub fn new() -> Self {
        AdaptiveContext {
            entries: vec![SymbolEntry { symbol: ESCAPE_SYMBOL, cumulative: 0, freq: 1 }],
            total: 1,
        }
    }

    /// Instantiate a context from `(symbol, frequency)` pairs. Pairs with a zero frequency are
    /// ignored, and repeated symbols have their frequencies summed.
    pub fn with_frequencies<I>(frequencies: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut pairs: Vec<(u32, u32)> =
            frequencies.into_iter().filter(|&(_, freq)| freq > 0).collect();

        pairs.sort_unstable_by_key(|&(symbol, _)| symbol);

        let mut entries: Vec<SymbolEntry> = Vec::with_capacity(pairs.len());

        for (symbol, freq) in pairs {
            match entries.last_mut() {
                Some(last) if last.symbol == symbol => last.freq += freq,
                _ => entries.push(SymbolEntry { symbol, cumulative: 0, freq }),
            }
        }

        let mut ctx = AdaptiveContext { entries, total: 0 };
        ctx.accumulate();
        ctx
    }

    /// Gets the total frequency of all symbols.
    #[inline(always)]
    pub fn total_symbol_frequency(&self) -> u32 {
        self.total
    }

    /// Gets the number of symbols in the context.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the context contains no symbols.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets an iterator over the `(symbol, frequency)` pairs of the context in ascending symbol
    /// order.
    pub fn symbols(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.iter().map(|entry| (entry.symbol, entry.freq))
    }

    /// Finds the symbol whose interval `[cumulative, cumulative + freq)` contains `cum_freq`, and
    /// returns the symbol and its cumulative frequency.
    pub fn symbol_from_frequency(&self, cum_freq: u32) -> Result<(u32, u32)> {
        if cum_freq >= self.total {
            return symbol_lookup_error("cumulative frequency exceeds the context total");
        }

        let idx = self.entries.partition_point(|entry| entry.end() <= cum_freq);

        let entry = &self.entries[idx];
        debug_assert!(entry.cumulative <= cum_freq && cum_freq < entry.end());

        Ok((entry.symbol, entry.cumulative))
    }

    /// Gets the frequency of a symbol, or 0 if the symbol is not in the context.
    pub fn symbol_frequency(&self, symbol: u32) -> u32 {
        self.find(symbol).map_or(0, |idx| self.entries[idx].freq)
    }

    /// Gets the cumulative frequency of a symbol, or `None` if the symbol is not in the context.
    pub fn symbol_cumulative_frequency(&self, symbol: u32) -> Option<u32> {
        self.find(symbol).map(|idx| self.entries[idx].cumulative)
    }

    /// Reinforces a symbol. The symbol's frequency, the cumulative frequency of every later
    /// symbol, and the total frequency all increase by [`SYMBOL_INCREMENT`]. A symbol not yet in
    /// the context is inserted with that frequency.
    ///
    /// Once the total frequency exceeds [`RESCALE_THRESHOLD`], all frequencies are halved.
    pub fn add_symbol(&mut self, symbol: u32) {
        let idx = match self.entries.binary_search_by_key(&symbol, |entry| entry.symbol) {
            Ok(idx) => {
                self.entries[idx].freq += SYMBOL_INCREMENT;
                idx
            }
            Err(idx) => {
                let cumulative = idx.checked_sub(1).map_or(0, |prev| self.entries[prev].end());
                let entry = SymbolEntry { symbol, cumulative, freq: SYMBOL_INCREMENT };
                self.entries.insert(idx, entry);
                idx
            }
        };

        for entry in &mut self.entries[idx + 1..] {
            entry.cumulative += SYMBOL_INCREMENT;
        }

        self.total += SYMBOL_INCREMENT;

        if self.total > RESCALE_THRESHOLD {
            self.rescale();
        }
    }

    /// Halves every frequency, rounding up so no symbol's frequency reaches 0.
    fn rescale(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.freq = (entry.freq + 1) / 2;
        }

        self.accumulate();

        debug!("rescaled adaptive context to total frequency {}", self.total);
    }

    fn accumulate(&mut self) {
        let mut cumulative = 0;

        for entry in self.entries.iter_mut() {
            entry.cumulative = cumulative;
            cumulative += entry.freq;
        }

        self.total = cumulative;
    }

    fn find(&self, symbol: u32) -> Option<usize> {
        self.entries.binary_search_by_key(&symbol, |entry| entry.symbol).ok()
    }
}

/// `ContextTable` holds the adaptive contexts of a decoding session, keyed by slot.
///
/// Slots not explicitly registered are created, on first use, with a fresh escape-only
/// [`AdaptiveContext`].
#[derive(Clone, Debug, Default)]
pub struct ContextTable {
    contexts: HashMap<u32, AdaptiveContext>,
}

impl ContextTable {
    /// Instantiate an empty table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a context in a slot, replacing and returning any context already there.
    pub fn insert(&mut self, slot: u32, context: AdaptiveContext) -> Option<AdaptiveContext> {
        self.contexts.insert(slot, context)
    }

    /// Gets the context in a slot, if it was created.
    pub fn get(&self, slot: u32) -> Option<&AdaptiveContext> {
        self.contexts.get(&slot)
    }

    /// Gets the context in a slot, creating it if necessary.
    pub fn get_or_create(&mut self, slot: u32) -> &mut AdaptiveContext {
        self.contexts.entry(slot).or_insert_with(|| {
            debug!("created adaptive context in slot {}", slot);
            AdaptiveContext::new()
        })
    }

    /// Gets the number of contexts created.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns true if no contexts were created.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Removes all contexts.
    pub fn clear(&mut self) {
        self.contexts.clear();
    }
}
