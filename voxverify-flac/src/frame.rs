// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use voxverify_core::errors::{invalid_stream_error, Result};
use voxverify_core::io::ReadBytes;

/// The 14-bit frame synchronization code.
pub const FLAC_FRAME_SYNC: u16 = 0x3ffe;

/// The minimum byte length of a complete FLAC frame. The frame header is at least 6 bytes, each
/// subframe at least 1 byte, and the frame footer 2 bytes.
pub const FLAC_MIN_FRAME_SIZE: usize = 10;

#[derive(Debug)]
enum BlockingStrategy {
    Fixed,
    Variable,
}

/// The position of a frame within the stream. Fixed-blocksize streams number frames, while
/// variable-blocksize streams give the offset of the first sample in the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockSequence {
    FixedBlock { frame_index: u32 },
    VariableBlock { sample_offset: u64 },
}

/// `ChannelAssignment` describes the mapping between the subframes of a frame and the channels
/// they encode.
///
/// For LeftSide or RightSide channel assignments, one channel is stored independently while the
/// other stores the difference Left - Right. For the MidSide channel assignment, an average channel
/// and a difference channel are stored. A difference channel is one bit wider than the stream's
/// sample size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelAssignment {
    /// All channels are independently coded.
    Independent(u32),
    /// Channel 0 is the Left channel, and channel 1 is the Difference channel.
    LeftSide,
    /// Channel 0 is the Difference channel, and channel 1 is the Right channel.
    RightSide,
    /// Channel 0 is the Mid channel, and channel 1 is the Difference channel.
    MidSide,
}

impl ChannelAssignment {
    /// Gets the number of subframes in a frame with this channel assignment.
    pub fn n_channels(&self) -> u32 {
        match *self {
            ChannelAssignment::Independent(n) => n,
            _ => 2,
        }
    }

    /// Gets the bits per sample of each subframe given the frame's bits per sample.
    pub fn subframe_bits_per_sample(&self, bps: u32, channel: u32) -> u32 {
        match (*self, channel) {
            (ChannelAssignment::LeftSide, 1) => bps + 1,
            (ChannelAssignment::RightSide, 0) => bps + 1,
            (ChannelAssignment::MidSide, 1) => bps + 1,
            _ => bps,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub block_sequence: BlockSequence,
    pub block_num_samples: u32,
    pub channel_assignment: ChannelAssignment,
    /// The bits per sample, or `None` if the stream information block must be used.
    pub bits_per_sample: Option<u32>,
    /// The sample rate in Hz, or `None` if the stream information block must be used.
    ///
    /// An 8-bit coded rate is stored in kHz and is scaled to Hz here, rather than being reported
    /// as the raw 8-bit value. The rate is informational only and never checked against the
    /// stream information block.
    pub sample_rate: Option<u32>,
    /// The header checksum as stored in the stream. It is not verified.
    pub crc8: u8,
}

/// Reads the remainder of a frame header. `sync` contains the first two bytes of the header: the
/// synchronization code, a reserved bit, and the blocking strategy.
pub fn read_frame_header<B: ReadBytes>(reader: &mut B, sync: u16) -> Result<FrameHeader> {
    if (sync >> 2) != FLAC_FRAME_SYNC {
        return invalid_stream_error("frame sync code not found");
    }

    if (sync & 0x2) != 0 {
        return invalid_stream_error("frame header reserved bit is not set to mandatory value");
    }

    let blocking_strategy = match sync & 0x1 {
        0 => BlockingStrategy::Fixed,
        _ => BlockingStrategy::Variable,
    };

    // Read all the standard frame description fields as one 16-bit value and extract the
    // fields.
    let desc = reader.read_be_u16()?;

    let block_size_enc = u32::from((desc & 0xf000) >> 12);
    let sample_rate_enc = u32::from((desc & 0x0f00) >> 8);
    let channels_enc = u32::from((desc & 0x00f0) >> 4);
    let bits_per_sample_enc = u32::from((desc & 0x000e) >> 1);

    if (desc & 0x0001) == 1 {
        return invalid_stream_error("frame header reserved bit is not set to mandatory value");
    }

    let channel_assignment = match channels_enc {
        0x0..=0x7 => ChannelAssignment::Independent(channels_enc + 1),
        0x8 => ChannelAssignment::LeftSide,
        0x9 => ChannelAssignment::RightSide,
        0xa => ChannelAssignment::MidSide,
        _ => {
            return invalid_stream_error("channel assignment set to reserved value");
        }
    };

    let bits_per_sample = match bits_per_sample_enc {
        0x0 => None, // Get from StreamInfo.
        0x1 => Some(8),
        0x2 => Some(12),
        0x4 => Some(16),
        0x5 => Some(20),
        0x6 => Some(24),
        _ => {
            return invalid_stream_error("bits per sample set to reserved value");
        }
    };

    let block_sequence = match blocking_strategy {
        // Fixed-blocksize stream sequence blocks by a frame number.
        BlockingStrategy::Fixed => {
            let frame = utf8_decode_be_u64(reader)?;

            // The frame number should only be 31-bits.
            if frame > 0x7fff_ffff {
                return invalid_stream_error("frame sequence number exceeds 31-bits");
            }

            BlockSequence::FixedBlock { frame_index: frame as u32 }
        }
        // Variable-blocksize streams sequence blocks by a sample number. At most 7 bytes are
        // decoded so the sample number never exceeds 36-bits.
        BlockingStrategy::Variable => {
            BlockSequence::VariableBlock { sample_offset: utf8_decode_be_u64(reader)? }
        }
    };

    let block_num_samples = match block_size_enc {
        0x1 => 192,
        0x2..=0x5 => 576 * (1 << (block_size_enc - 2)),
        0x6 => u32::from(reader.read_u8()?) + 1,
        0x7 => u32::from(reader.read_be_u16()?) + 1,
        0x8..=0xe => 256 * (1 << (block_size_enc - 8)),
        _ => {
            return invalid_stream_error("block size set to reserved value");
        }
    };

    let sample_rate = match sample_rate_enc {
        0x0 => None, // Get from StreamInfo.
        0x1 => Some(88_200),
        0x2 => Some(176_400),
        0x3 => Some(192_000),
        0x4 => Some(8_000),
        0x5 => Some(16_000),
        0x6 => Some(22_050),
        0x7 => Some(24_000),
        0x8 => Some(32_000),
        0x9 => Some(44_100),
        0xa => Some(48_000),
        0xb => Some(96_000),
        0xc => Some(u32::from(reader.read_u8()?) * 1000),
        0xd => Some(u32::from(reader.read_be_u16()?)),
        0xe => Some(u32::from(reader.read_be_u16()?) * 10),
        _ => {
            return invalid_stream_error("sample rate set to reserved value");
        }
    };

    let crc8 = reader.read_u8()?;

    Ok(FrameHeader {
        block_sequence,
        block_num_samples,
        channel_assignment,
        bits_per_sample,
        sample_rate,
        crc8,
    })
}

/// Decodes a big-endian unsigned integer encoded via extended UTF8. In this context, extended UTF8
/// simply means the encoded UTF8 value may be up to 7 bytes for a maximum integer bit width of
/// 36-bits.
fn utf8_decode_be_u64<B: ReadBytes>(src: &mut B) -> Result<u64> {
    let first = src.read_u8()?;

    // UTF8 prefixes 1s followed by a 0 to indicate the total number of bytes within the multi-byte
    // sequence. A single leading 1 is a continuation byte, and 8 leading 1s has no terminating 0.
    let n_bytes = first.leading_ones();

    let mut state = match n_bytes {
        0 => return Ok(u64::from(first)),
        2..=7 => u64::from(first & (0x7f >> n_bytes)),
        _ => return invalid_stream_error("invalid utf8 encoded integer"),
    };

    for _ in 1..n_bytes {
        let byte = src.read_u8()?;

        // Continuation bytes are 0b10xx_xxxx and carry 6 bits each.
        if byte & 0xc0 != 0x80 {
            return invalid_stream_error("invalid utf8 continuation byte");
        }

        state = (state << 6) | u64::from(byte & 0x3f);
    }

    Ok(state)
}
