// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use voxverify_core::errors::Result;
use voxverify_core::io::ReadBytes;

use log::debug;

/// The size of the canonical WAVE header in bytes.
pub const WAVE_HEADER_SIZE: usize = 44;

const WAVE_FORM_ID: [u8; 4] = *b"WAVE";
const FMT_CHUNK_ID: [u8; 4] = *b"fmt ";
const DATA_CHUNK_ID: [u8; 4] = *b"data";

/// The length of a `fmt ` chunk without any extension.
const FMT_PCM_CHUNK_LEN: u32 = 16;

/// The format tag of integer PCM.
const WAVE_FORMAT_PCM: u16 = 1;

/// The properties a WAVE header is checked against.
#[derive(Copy, Clone, Debug)]
pub struct WaveExpectations {
    /// The expected number of channels. Default: `1`.
    pub n_channels: u16,
    /// The expected sample width. Default: `16`.
    pub bits_per_sample: u16,
    /// Require the RIFF and data chunk sizes to be 0, as left by a streaming recorder.
    /// Default: `true`.
    pub require_zero_sizes: bool,
}

impl Default for WaveExpectations {
    fn default() -> Self {
        WaveExpectations { n_channels: 1, bits_per_sample: 16, require_zero_sizes: true }
    }
}

/// The canonical WAVE header: a RIFF chunk header, a PCM `fmt ` chunk, and a data chunk header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff_id: [u8; 4],
    pub riff_len: u32,
    pub form_id: [u8; 4],
    pub fmt_id: [u8; 4],
    pub fmt_len: u32,
    /// The format tag. `1` for integer PCM.
    pub audio_format: u16,
    pub n_channels: u16,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The average data rate in bytes/second.
    pub byte_rate: u32,
    /// The byte alignment of one audio frame.
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_id: [u8; 4],
    pub data_len: u32,
}

impl WaveHeader {
    /// Reads the 44-byte header. All fields are little-endian.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<WaveHeader> {
        let header = WaveHeader {
            riff_id: reader.read_quad_bytes()?,
            riff_len: reader.read_u32()?,
            form_id: reader.read_quad_bytes()?,
            fmt_id: reader.read_quad_bytes()?,
            fmt_len: reader.read_u32()?,
            audio_format: reader.read_u16()?,
            n_channels: reader.read_u16()?,
            sample_rate: reader.read_u32()?,
            byte_rate: reader.read_u32()?,
            block_align: reader.read_u16()?,
            bits_per_sample: reader.read_u16()?,
            data_id: reader.read_quad_bytes()?,
            data_len: reader.read_u32()?,
        };

        debug!(
            "wave header: format={}, sample_rate={}, channels={}, bits_per_sample={}",
            header.audio_format, header.sample_rate, header.n_channels, header.bits_per_sample
        );

        Ok(header)
    }

    /// Checks the header describes a PCM stream with the expected properties.
    pub fn is_valid(&self, expect: &WaveExpectations) -> bool {
        // The width of a sample in whole bytes.
        let sample_bytes = u64::from(self.bits_per_sample / 8);

        let byte_rate = u64::from(self.sample_rate) * u64::from(self.n_channels) * sample_bytes;
        let block_align = u64::from(self.n_channels) * sample_bytes;

        let is_sizes_ok = !expect.require_zero_sizes || (self.riff_len == 0 && self.data_len == 0);

        self.riff_id == crate::RIFF_STREAM_MARKER
            && self.form_id == WAVE_FORM_ID
            && self.fmt_id == FMT_CHUNK_ID
            && self.fmt_len == FMT_PCM_CHUNK_LEN
            && self.audio_format == WAVE_FORMAT_PCM
            && self.n_channels == expect.n_channels
            && self.bits_per_sample == expect.bits_per_sample
            && u64::from(self.byte_rate) == byte_rate
            && u64::from(self.block_align) == block_align
            && self.data_id == DATA_CHUNK_ID
            && is_sizes_ok
    }

    /// Gets the duration of a file of `buf_len` bytes, counting everything after the header as
    /// 2-byte samples. Returns 0 if the sample rate is 0.
    pub fn duration(&self, buf_len: usize) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }

        let data_len = buf_len.saturating_sub(WAVE_HEADER_SIZE) as u64;

        data_len / (u64::from(self.sample_rate) * 2)
    }
}
