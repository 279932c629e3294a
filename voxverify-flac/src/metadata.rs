// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use voxverify_core::errors::{invalid_stream_info_error, Result};
use voxverify_core::io::{BufReader, ReadBytes};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    Cuesheet,
    Picture,
    Unknown(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetadataBlockHeader {
    pub is_last: bool,
    pub block_type: MetadataBlockType,
    pub block_len: u32,
}

impl MetadataBlockHeader {
    /// Read a metadata block header.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<MetadataBlockHeader> {
        let header_enc = reader.read_u8()?;

        // First bit of the header indicates if this is the last metadata block.
        let is_last = (header_enc & 0x80) == 0x80;

        // The next 7 bits of the header indicates the block type.
        let block_type_id = header_enc & 0x7f;

        let block_type = match block_type_id {
            0 => MetadataBlockType::StreamInfo,
            1 => MetadataBlockType::Padding,
            2 => MetadataBlockType::Application,
            3 => MetadataBlockType::SeekTable,
            4 => MetadataBlockType::VorbisComment,
            5 => MetadataBlockType::Cuesheet,
            6 => MetadataBlockType::Picture,
            _ => MetadataBlockType::Unknown(block_type_id),
        };

        let block_len = reader.read_be_u24()?;

        Ok(MetadataBlockHeader { is_last, block_type, block_len })
    }
}

/// The stream information block. Always the first metadata block of a FLAC stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    /// The minimum and maximum number of decoded samples per block of audio.
    pub block_len_min: u16,
    pub block_len_max: u16,
    /// The minimum and maximum byte length of an encoded block (frame) of audio. Either value may
    /// be 0 if unknown.
    pub frame_byte_len_min: u32,
    pub frame_byte_len_max: u32,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of channels.
    pub channels: u32,
    /// The number of bits per sample of the stream.
    pub bits_per_sample: u32,
    /// The total number of samples per channel in the stream. 0 if unknown.
    pub n_samples: u64,
    /// The MD5 hash value of the decoded audio. Never verified.
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// The size of a stream information block in bytes.
    pub const SIZE: usize = 34;

    /// Parse a stream information block from its payload.
    pub fn read(buf: &[u8]) -> Result<StreamInfo> {
        if !StreamInfo::is_valid_size(buf.len() as u64) {
            return invalid_stream_info_error("stream info block is not 34 bytes");
        }

        let mut reader = BufReader::new(buf);

        // Read the block length bounds in number of samples.
        let block_len_min = reader.read_be_u16()?;
        let block_len_max = reader.read_be_u16()?;

        if block_len_min < 16 {
            return invalid_stream_info_error("minimum block length is 16 samples");
        }

        if block_len_max < block_len_min {
            return invalid_stream_info_error(
                "maximum block length is less than the minimum block length",
            );
        }

        // Read the frame byte length bounds.
        let frame_byte_len_min = reader.read_be_u24()?;
        let frame_byte_len_max = reader.read_be_u24()?;

        // A value of 0 for either bound indicates the respective byte length is unknown.
        if frame_byte_len_min > 0
            && frame_byte_len_max > 0
            && frame_byte_len_max < frame_byte_len_min
        {
            return invalid_stream_info_error(
                "maximum frame length is less than the minimum frame length",
            );
        }

        // The sample rate (20 bits), channels minus 1 (3 bits), bits per sample minus 1 (5 bits),
        // and total sample count (36 bits) are packed into the next 64 bits.
        let packed = u64::from_be_bytes([
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
        ]);

        let sample_rate = (packed >> 44) as u32;

        if sample_rate < 1 || sample_rate > 655_350 {
            return invalid_stream_info_error("stream sample rate out of bounds");
        }

        let channels = ((packed >> 41) & 0x7) as u32 + 1;
        let bits_per_sample = ((packed >> 36) & 0x1f) as u32 + 1;
        let n_samples = packed & 0xf_ffff_ffff;

        let mut md5 = [0; 16];
        reader.read_buf_exact(&mut md5)?;

        Ok(StreamInfo {
            block_len_min,
            block_len_max,
            frame_byte_len_min,
            frame_byte_len_max,
            sample_rate,
            channels,
            bits_per_sample,
            n_samples,
            md5,
        })
    }

    /// Check if the size is valid for a stream information block.
    pub fn is_valid_size(size: u64) -> bool {
        size == StreamInfo::SIZE as u64
    }
}
