// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::mem;

use log::debug;

use super::bit_source::{padded_len, SENTINEL_LEN};
use super::{BitSource, ReadBytes};
use crate::errors::{end_of_stream_error, limit_error, truncated_block_error, Error, Result};

/// The fixed header preceding every block.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// The block type.
    pub block_type: u32,
    /// The declared size of the data payload in bytes, excluding padding.
    pub data_size: u32,
    /// The declared size of the metadata payload in bytes, excluding padding.
    pub metadata_size: u32,
    /// The byte offset of the header within the stream.
    pub offset: u64,
}

impl BlockHeader {
    /// The size of the header on disk in bytes.
    pub const SIZE: u64 = 12;

    /// Gets the total size of the block on disk in bytes, including the header and padding.
    pub fn total_len(&self) -> u64 {
        Self::SIZE + padded_len(self.data_size) as u64 + padded_len(self.metadata_size) as u64
    }
}

/// A block read from the stream. The block exclusively owns its data and metadata payloads.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// The block header.
    pub header: BlockHeader,
    /// The data payload.
    pub data: BitSource,
    /// The metadata payload.
    pub metadata: BitSource,
}

/// `BlockReaderOptions` is a common set of options that the block reader uses.
#[derive(Copy, Clone, Debug)]
pub struct BlockReaderOptions {
    /// The largest payload, in bytes, a block may declare for its data or metadata. Larger
    /// declarations fail with a limit error instead of being allocated.
    pub max_payload_len: u32,
}

impl Default for BlockReaderOptions {
    fn default() -> Self {
        BlockReaderOptions { max_payload_len: 256 * 1024 * 1024 }
    }
}

/// `BlockReader` reads the length-prefixed blocks of a U3D stream.
///
/// Each block is laid out as:
///
/// ```text
/// u32 type                (little-endian)
/// u32 data_size           (little-endian)
/// u32 metadata_size       (little-endian)
/// u8  data[ceil(data_size / 4) * 4]
/// u8  metadata[ceil(metadata_size / 4) * 4]
/// ```
///
/// Only the most recently opened block is held. Opening a new block releases the previous one.
pub struct BlockReader<B: ReadBytes> {
    reader: B,
    block: Block,
    opts: BlockReaderOptions,
}

impl<B: ReadBytes> BlockReader<B> {
    /// Instantiate a new `BlockReader` over the given byte source.
    pub fn new(reader: B, opts: BlockReaderOptions) -> Self {
        BlockReader { reader, block: Default::default(), opts }
    }

    /// Reads the next 4 bytes of the underlying stream as a little-endian word, independently of
    /// any bit cursor.
    ///
    /// Returns [`Error::EndOfStream`] if the stream is exhausted before the first byte, and a
    /// truncated block error if it ends part way through the word.
    pub fn read_word_direct(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];

        match self.reader.read_buf_available(&mut bytes)? {
            0 => end_of_stream_error(),
            4 => Ok(u32::from_le_bytes(bytes)),
            _ => truncated_block_error("stream ended within a header word"),
        }
    }

    /// Reads the next block from the stream and returns its header.
    ///
    /// Returns [`Error::EndOfStream`] if the stream is positioned exactly at its end, the natural
    /// termination of the block list. A stream that ends anywhere within a block fails with a
    /// truncated block error.
    pub fn open_block(&mut self) -> Result<BlockHeader> {
        let offset = self.reader.pos();

        // Release the previous block before reading the next one.
        self.block = Default::default();

        debug!("reading block at offset {:#06x}", offset);

        let block_type = self.read_word_direct()?;
        let data_size = self.read_header_word()?;
        let metadata_size = self.read_header_word()?;

        let header = BlockHeader { block_type, data_size, metadata_size, offset };

        debug!(
            "block type={:#010x}, data_size={}, metadata_size={}",
            block_type, data_size, metadata_size
        );

        let data = self.read_payload(data_size, "data payload is incomplete")?;
        let metadata = self.read_payload(metadata_size, "metadata payload is incomplete")?;

        self.block = Block { header, data, metadata };

        Ok(header)
    }

    /// Gets the most recently opened block.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Gets the most recently opened block mutably.
    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    /// Takes ownership of the most recently opened block, leaving an empty block in its place.
    pub fn take_block(&mut self) -> Block {
        mem::take(&mut self.block)
    }

    /// Gets the data payload of the most recently opened block.
    pub fn data_mut(&mut self) -> &mut BitSource {
        &mut self.block.data
    }

    /// Gets the metadata payload of the most recently opened block.
    pub fn metadata_mut(&mut self) -> &mut BitSource {
        &mut self.block.metadata
    }

    /// Unwraps this `BlockReader`, returning the underlying byte source.
    pub fn into_inner(self) -> B {
        self.reader
    }

    fn read_header_word(&mut self) -> Result<u32> {
        match self.read_word_direct() {
            Err(Error::EndOfStream) => truncated_block_error("block header is incomplete"),
            res => res,
        }
    }

    fn read_payload(&mut self, size: u32, truncated: &'static str) -> Result<BitSource> {
        if size > self.opts.max_payload_len {
            return limit_error("block payload exceeds the maximum payload length");
        }

        let len = padded_len(size);

        // The sentinel word stays zeroed.
        let mut buf = vec![0u8; len + SENTINEL_LEN];

        match self.reader.read_buf_exact(&mut buf[..len]) {
            Ok(()) => Ok(BitSource::from_padded(buf, size)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                truncated_block_error(truncated)
            }
            Err(err) => Err(err.into()),
        }
    }
}
