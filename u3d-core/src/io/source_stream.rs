// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;

use log::info;

use super::ReadBytes;
use crate::errors::{Error, Result};

/// `SourceStream` is the [`ReadBytes`] adapter for any source implementing [`std::io::Read`].
///
/// The stream tracks the absolute number of bytes consumed so block offsets can be reported. It
/// performs no buffering of its own, so wrap unbuffered sources in a [`std::io::BufReader`].
pub struct SourceStream<R: Read> {
    inner: R,
    pos: u64,
}

impl SourceStream<io::BufReader<File>> {
    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(Error::StreamOpenFailed)?;

        info!("{} opened", path.display());

        Ok(SourceStream::new(io::BufReader::new(file)))
    }
}

impl<R: Read> SourceStream<R> {
    /// Instantiates a new `SourceStream` by taking ownership and wrapping the provided reader.
    pub fn new(inner: R) -> Self {
        SourceStream { inner, pos: 0 }
    }

    /// Gets a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwraps this `SourceStream`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadBytes for SourceStream<R> {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_buf_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(count) => {
                    self.pos += count as u64;
                    return Ok(count);
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn ignore_bytes(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())?;
        self.pos += skipped;

        if skipped < count {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of stream"));
        }

        Ok(())
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        self.pos
    }
}
