// U3D
// Copyright (c) 2024 The U3D Project Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Overrun` records where the bit cursor of a block's data was found beyond the declared data
/// size after a symbol was decoded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Overrun {
    /// The bit cursor position after the symbol was decoded.
    pub bit_position: u64,
    /// The declared length of the data in bits.
    pub bit_len: u64,
}

impl fmt::Display for Overrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bit position {} is beyond data length of {} bits",
            self.bit_position, self.bit_len
        )
    }
}

/// `Error` provides an enumeration of all possible errors reported by the U3D decoder.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading the stream.
    IoError(io::Error),
    /// The input could not be opened.
    StreamOpenFailed(io::Error),
    /// The stream ended cleanly before another block header. This is the natural end of the block
    /// list and not a failure.
    EndOfStream,
    /// A block header or payload was cut short by the end of the stream.
    TruncatedBlock(&'static str),
    /// A decode was requested with an unusable context: a zero (or out-of-range) static total, or
    /// an adaptive context with no symbols.
    InvalidContext(u32),
    /// The decoded cumulative frequency did not map to any symbol of the context.
    SymbolLookupFailed(&'static str),
    /// The bit cursor advanced past the declared data size.
    BufferOverrun(Overrun),
    /// A default or user-defined limit was reached while reading the stream. Limits are used to
    /// prevent denial-of-service attacks from malicious streams.
    LimitError(&'static str),
}

impl Error {
    /// Returns true if the error signals the natural end of the block list.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(*self, Error::EndOfStream)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::StreamOpenFailed(ref err) => {
                write!(f, "failed to open stream: {}", err)
            }
            Error::EndOfStream => {
                write!(f, "end of stream")
            }
            Error::TruncatedBlock(msg) => {
                write!(f, "truncated block: {}", msg)
            }
            Error::InvalidContext(context) => {
                write!(f, "invalid context: {:#x}", context)
            }
            Error::SymbolLookupFailed(msg) => {
                write!(f, "symbol lookup failed: {}", msg)
            }
            Error::BufferOverrun(ref overrun) => {
                write!(f, "data buffer overrun: {}", overrun)
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            Error::StreamOpenFailed(ref err) => Some(err),
            Error::EndOfStream => None,
            Error::TruncatedBlock(_) => None,
            Error::InvalidContext(_) => None,
            Error::SymbolLookupFailed(_) => None,
            Error::BufferOverrun(_) => None,
            Error::LimitError(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::EndOfStream)
}

/// Convenience function to create a truncated block error.
pub fn truncated_block_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::TruncatedBlock(desc))
}

/// Convenience function to create an invalid context error.
pub fn invalid_context_error<T>(context: u32) -> Result<T> {
    Err(Error::InvalidContext(context))
}

/// Convenience function to create a symbol lookup error.
pub fn symbol_lookup_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::SymbolLookupFailed(desc))
}

/// Convenience function to create a buffer overrun error.
pub fn overrun_error<T>(overrun: Overrun) -> Result<T> {
    Err(Error::BufferOverrun(overrun))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}
