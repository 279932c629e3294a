// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use voxverify_core::errors::{invalid_stream_error, Result};
use voxverify_core::io::{BufReader, FiniteStream};
use voxverify_flac::{DecoderOptions, FlacDecoder, FLAC_STREAM_MARKER};
use voxverify_wav::{WaveExpectations, WaveHeader, RIFF_STREAM_MARKER};

use log::debug;

/// The audio file formats that can be validated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Flac,
    Wav,
}

impl Format {
    /// Detects the format of a buffer from its leading magic bytes.
    pub fn detect(buf: &[u8]) -> Option<Format> {
        match buf.get(..4) {
            Some(magic) if magic == FLAC_STREAM_MARKER => Some(Format::Flac),
            Some(magic) if magic == RIFF_STREAM_MARKER => Some(Format::Wav),
            _ => None,
        }
    }

    /// Gets the format for a file extension. The extension is matched case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "flac" => Some(Format::Flac),
            "wav" | "wave" => Some(Format::Wav),
            _ => None,
        }
    }

    /// Gets a short name for the format.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Flac => "flac",
            Format::Wav => "wav",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `VerifyOptions` sets the stream properties a recording is expected to have.
#[derive(Copy, Clone, Debug)]
pub struct VerifyOptions {
    /// The expected number of channels. Default: `1`.
    pub expected_channels: u32,
    /// The expected sample width. Default: `16`.
    pub expected_bits_per_sample: u32,
    /// Require the chunk sizes of a Wave header to be 0, as left by a streaming recorder.
    /// Default: `true`.
    pub require_zero_wav_sizes: bool,
    /// The options used to walk a FLAC stream.
    pub decoder: DecoderOptions,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        VerifyOptions {
            expected_channels: 1,
            expected_bits_per_sample: 16,
            require_zero_wav_sizes: true,
            decoder: Default::default(),
        }
    }
}

/// The outcome of validating a structurally sound file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub format: Format,
    /// True if the stream properties match the expectations.
    pub valid: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    /// The number of samples per channel.
    pub n_samples: u64,
    /// A coarse length figure. For FLAC it is `n_samples / bits_per_sample / 1000`, for Wave it is
    /// the number of bytes after the header divided by twice the sample rate. Neither is a time in
    /// seconds for every stream.
    pub duration: u64,
}

/// Validates a complete file held in `buf` as the given format.
///
/// An error is returned if the file is corrupt. A file that is sound, but whose properties differ
/// from the expectations in `options`, returns a `Verdict` with `valid` set to false.
pub fn validate(format: Format, buf: &[u8], options: &VerifyOptions) -> Result<Verdict> {
    let verdict = match format {
        Format::Flac => validate_flac(buf, options)?,
        Format::Wav => validate_wav(buf, options)?,
    };

    debug!("{} verdict: {:?}", format, verdict);

    Ok(verdict)
}

/// Detects the format of `buf` and validates it.
pub fn verify(buf: &[u8], options: &VerifyOptions) -> Result<Verdict> {
    match Format::detect(buf) {
        Some(format) => validate(format, buf, options),
        None => invalid_stream_error("unrecognized format"),
    }
}

fn validate_flac(buf: &[u8], options: &VerifyOptions) -> Result<Verdict> {
    let summary = FlacDecoder::try_new(buf, options.decoder)?.decode()?;

    let info = summary.stream_info;

    let valid = info.channels == options.expected_channels
        && info.bits_per_sample == options.expected_bits_per_sample;

    Ok(Verdict {
        format: Format::Flac,
        valid,
        sample_rate: info.sample_rate,
        channels: info.channels,
        bits_per_sample: info.bits_per_sample,
        n_samples: info.n_samples,
        duration: info.n_samples / u64::from(info.bits_per_sample) / 1000,
    })
}

fn validate_wav(buf: &[u8], options: &VerifyOptions) -> Result<Verdict> {
    let mut reader = BufReader::new(buf);

    let header = WaveHeader::read(&mut reader)?;

    // Expectations wider than a header field can never be met.
    let valid = match (
        u16::try_from(options.expected_channels),
        u16::try_from(options.expected_bits_per_sample),
    ) {
        (Ok(n_channels), Ok(bits_per_sample)) => header.is_valid(&WaveExpectations {
            n_channels,
            bits_per_sample,
            require_zero_sizes: options.require_zero_wav_sizes,
        }),
        _ => false,
    };

    // Everything after the header is sample data.
    let n_samples = match header.block_align {
        0 => 0,
        block_align => reader.bytes_available() / u64::from(block_align),
    };

    Ok(Verdict {
        format: Format::Wav,
        valid,
        sample_rate: header.sample_rate,
        channels: u32::from(header.n_channels),
        bits_per_sample: u32::from(header.bits_per_sample),
        n_samples,
        duration: header.duration(buf.len()),
    })
}
