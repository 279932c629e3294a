// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Voxverify.
///
/// Every error is fatal to the stream being verified. There is no partial result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The byte source was exhausted before a requested field could be read.
    UnexpectedEndOfStream,
    /// A byte-aligned read was attempted while the bit cursor was in the middle of a byte.
    MisalignedRead,
    /// The stream violates a structural rule of the FLAC format.
    InvalidFlacStream(&'static str),
    /// A field of the STREAMINFO metadata block is out of range.
    InvalidStreamInfo(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::UnexpectedEndOfStream => {
                write!(f, "unexpected end of stream")
            }
            Error::MisalignedRead => {
                write!(f, "aligned read while not on a byte boundary")
            }
            Error::InvalidFlacStream(msg) => {
                write!(f, "invalid flac stream: {}", msg)
            }
            Error::InvalidStreamInfo(msg) => {
                write!(f, "invalid stream info: {}", msg)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::UnexpectedEndOfStream)
}

/// Convenience function to create a misaligned read error.
pub fn misaligned_read_error<T>() -> Result<T> {
    Err(Error::MisalignedRead)
}

/// Convenience function to create an invalid stream error.
pub fn invalid_stream_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidFlacStream(desc))
}

/// Convenience function to create an invalid stream info error.
pub fn invalid_stream_info_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidStreamInfo(desc))
}
