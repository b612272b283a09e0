// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module implements the byte- and bit-level I/O used to read U3D blocks.
//!
//! The following nomenclature is used to denote where the data being read is sourced from:
//!  * A `Stream` consumes any source implementing [`std::io::Read`].
//!  * A `Reader` consumes a `&[u8]`.
//!
//! Both implement the [`ReadBytes`] trait, which is all a [`BlockReader`] needs to pull block
//! headers and payloads. Once a block is read, its payloads are exposed as [`BitSource`]s that
//! provide random access at bit granularity.

use std::io;

mod bit_source;
mod block;
mod buf_reader;
mod source_stream;

pub use bit_source::BitSource;
pub use block::{Block, BlockHeader, BlockReader, BlockReaderOptions};
pub use buf_reader::BufReader;
pub use source_stream::SourceStream;

/// `ReadBytes` provides methods to read bytes and interpret them as little-endian unsigned
/// integers.
pub trait ReadBytes {
    /// Reads a single byte from the stream and returns it or an error.
    fn read_byte(&mut self) -> io::Result<u8>;

    /// Reads up-to the number of bytes required to fill buf or returns an error. Returns 0 only
    /// if the stream is exhausted or `buf` is empty.
    fn read_buf(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Ignores the specified number of bytes from the stream or returns an error.
    fn ignore_bytes(&mut self, count: u64) -> io::Result<()>;

    /// Gets the position of the stream.
    fn pos(&self) -> u64;

    /// Reads exactly the number of bytes required to fill be provided buffer or returns an error.
    fn read_buf_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_buf(buf)? {
                0 => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
                }
                count => buf = &mut buf[count..],
            }
        }
        Ok(())
    }

    /// Reads as many bytes as are available, up-to the length of `buf`, and returns the number of
    /// bytes read. Unlike [`ReadBytes::read_buf`], a short count is only returned at the end of
    /// the stream.
    fn read_buf_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;

        while total < buf.len() {
            match self.read_buf(&mut buf[total..])? {
                0 => break,
                count => total += count,
            }
        }

        Ok(total)
    }

    /// Reads four bytes from the stream and returns them in read-order or an error.
    #[inline(always)]
    fn read_quad_bytes(&mut self) -> io::Result<[u8; 4]> {
        let mut bytes = [0u8; 4];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a single unsigned byte from the stream and returns it or an error.
    #[inline(always)]
    fn read_u8(&mut self) -> io::Result<u8> {
        self.read_byte()
    }

    /// Reads four bytes from the stream and interprets them as an unsigned 32-bit little-endian
    /// integer or returns an error.
    #[inline(always)]
    fn read_u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_quad_bytes()?))
    }
}

impl<R: ReadBytes> ReadBytes for &mut R {
    #[inline(always)]
    fn read_byte(&mut self) -> io::Result<u8> {
        (*self).read_byte()
    }

    #[inline(always)]
    fn read_buf(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (*self).read_buf(buf)
    }

    #[inline(always)]
    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        (*self).ignore_bytes(count)
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        (**self).pos()
    }
}
