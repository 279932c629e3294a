// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use smallvec::SmallVec;

use voxverify_core::errors::{end_of_stream_error, invalid_stream_error, Result};
use voxverify_core::io::{BitReaderLtr, ReadBitsLtr, ReadBytes};

use log::{debug, info, trace};

use crate::frame::{read_frame_header, FrameHeader, FLAC_MIN_FRAME_SIZE};
use crate::metadata::{MetadataBlockHeader, MetadataBlockType, StreamInfo};
use crate::subframe::{read_subframes, Subframe};
use crate::FLAC_STREAM_MARKER;

/// `DecoderOptions` controls the behaviour of a `FlacDecoder`.
#[derive(Copy, Clone, Debug)]
pub struct DecoderOptions {
    /// If the stream information block does not state the total number of samples, replace it with
    /// the number of samples counted while walking the frames. Default: `true`.
    pub backfill_n_samples: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions { backfill_n_samples: true }
    }
}

/// A summary of one walked frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSummary {
    pub header: FrameHeader,
    pub subframes: SmallVec<[Subframe; 2]>,
    /// The byte offset of the frame from the start of the buffer.
    pub byte_offset: usize,
    /// The length of the frame in bytes, including the header and footer.
    pub byte_len: usize,
    /// The frame checksum as stored in the stream. It is not verified.
    pub crc16: u16,
}

/// The result of walking a complete FLAC stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeSummary {
    /// The stream information. If enabled by `DecoderOptions::backfill_n_samples`, and the stream
    /// did not state its length, the total number of samples is the number counted.
    pub stream_info: StreamInfo,
    /// The number of frames in the stream.
    pub n_frames: u64,
    /// The number of samples, per channel, counted over all frames.
    pub n_samples_decoded: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DecoderState {
    ReadMetadata,
    ReadFrames,
    Done,
}

/// `FlacDecoder` walks a complete FLAC stream held in memory.
///
/// The decoder moves through the stream marker, the metadata blocks, and then each frame in turn.
/// Any error is fatal: the stream is rejected as a whole.
pub struct FlacDecoder<'a> {
    buf: &'a [u8],
    reader: BitReaderLtr<'a>,
    options: DecoderOptions,
    state: DecoderState,
    stream_info: Option<StreamInfo>,
    n_frames: u64,
    n_samples_decoded: u64,
}

impl<'a> FlacDecoder<'a> {
    /// Instantiate a new `FlacDecoder` over `buf`. The buffer must start with the FLAC stream
    /// marker.
    pub fn try_new(buf: &'a [u8], options: DecoderOptions) -> Result<Self> {
        let mut reader = BitReaderLtr::new(buf);

        // Read the first 4 bytes of the stream. Ideally this will be the FLAC stream marker.
        let marker = reader.read_quad_bytes()?;

        if marker != FLAC_STREAM_MARKER {
            return invalid_stream_error("missing flac stream marker");
        }

        Ok(FlacDecoder {
            buf,
            reader,
            options,
            state: DecoderState::ReadMetadata,
            stream_info: None,
            n_frames: 0,
            n_samples_decoded: 0,
        })
    }

    /// Gets the stream information, if the metadata blocks have been read.
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// Reads all the metadata blocks and returns the stream information. Does nothing if the
    /// metadata blocks were already read.
    pub fn read_metadata(&mut self) -> Result<&StreamInfo> {
        if self.state == DecoderState::ReadMetadata {
            self.read_all_metadata_blocks()?;
            self.state = DecoderState::ReadFrames;
        }

        match self.stream_info {
            Some(ref info) => Ok(info),
            None => invalid_stream_error("missing stream info block"),
        }
    }

    fn read_all_metadata_blocks(&mut self) -> Result<()> {
        loop {
            let header = MetadataBlockHeader::read(&mut self.reader)?;

            let block_start = self.reader.pos();
            let block_end = block_start + header.block_len as usize;

            // The whole block must be present in the buffer.
            if block_end > self.reader.byte_len() {
                return end_of_stream_error();
            }

            match header.block_type {
                MetadataBlockType::StreamInfo => {
                    // Only a single stream information block is allowed.
                    if self.stream_info.is_some() {
                        return invalid_stream_error("found more than one stream info block");
                    }

                    let info = StreamInfo::read(&self.buf[block_start..block_end])?;

                    debug!(
                        "stream info: rate={}, channels={}, bps={}, n_samples={}",
                        info.sample_rate, info.channels, info.bits_per_sample, info.n_samples
                    );

                    self.stream_info = Some(info);
                }
                // The stream information block must be first.
                _ if self.stream_info.is_none() => {
                    return invalid_stream_error("first metadata block is not stream info");
                }
                block_type => {
                    info!("ignoring {} bytes of block type={:?}.", header.block_len, block_type);
                }
            }

            // Jump to the next block, or to the first frame after the last block.
            self.reader.seek(block_end)?;

            // Exit when the last header is read.
            if header.is_last {
                break;
            }
        }

        Ok(())
    }

    /// Walks the next frame. Returns `None` once the stream ends cleanly on a frame boundary.
    pub fn next_frame(&mut self) -> Result<Option<FrameSummary>> {
        match self.state {
            DecoderState::ReadMetadata => {
                self.read_metadata()?;
            }
            DecoderState::Done => return Ok(None),
            DecoderState::ReadFrames => (),
        }

        let stream_bps = match self.stream_info {
            Some(ref info) => info.bits_per_sample,
            None => return invalid_stream_error("missing stream info block"),
        };

        let byte_offset = self.reader.pos();

        // The stream may only end before the first byte of a frame.
        let sync_hi = match self.reader.try_read_aligned_byte()? {
            Some(byte) => byte,
            None => {
                debug!("end of stream after {} frames", self.n_frames);
                self.state = DecoderState::Done;
                return Ok(None);
            }
        };

        let sync = u16::from_be_bytes([sync_hi, self.reader.read_u8()?]);

        let header = read_frame_header(&mut self.reader, sync)?;

        trace!(
            "frame: offset={}, block_sequence={:?}, block_num_samples={}, channels={:?}",
            byte_offset,
            header.block_sequence,
            header.block_num_samples,
            header.channel_assignment
        );

        if let Some(bps) = header.bits_per_sample {
            if bps != stream_bps {
                return invalid_stream_error("frame bits per sample differs from stream info");
            }
        }

        let subframes = read_subframes(&mut self.reader, &header, stream_bps)?;

        // Subframes are not byte-aligned. The frame is padded with 0 bits up to the footer.
        if self.reader.realign() != 0 {
            return invalid_stream_error("frame padding is not 0");
        }

        let crc16 = self.reader.read_be_u16()?;

        let byte_len = self.reader.pos() - byte_offset;

        if byte_len < FLAC_MIN_FRAME_SIZE {
            return invalid_stream_error("frame is too small");
        }

        self.n_frames += 1;
        self.n_samples_decoded += u64::from(header.block_num_samples);

        Ok(Some(FrameSummary { header, subframes, byte_offset, byte_len, crc16 }))
    }

    /// Walks the remainder of the stream and returns the summary.
    pub fn decode(mut self) -> Result<DecodeSummary> {
        self.read_metadata()?;

        while self.next_frame()?.is_some() {}

        let mut stream_info = match self.stream_info {
            Some(info) => info,
            None => return invalid_stream_error("missing stream info block"),
        };

        if stream_info.n_samples == 0 {
            if self.options.backfill_n_samples {
                stream_info.n_samples = self.n_samples_decoded;
            }
        }
        else if stream_info.n_samples != self.n_samples_decoded {
            return invalid_stream_error("stream length differs from stream info");
        }

        Ok(DecodeSummary {
            stream_info,
            n_frames: self.n_frames,
            n_samples_decoded: self.n_samples_decoded,
        })
    }
}

/// Walks a complete FLAC stream with the default options and returns the stream information.
pub fn decode(buf: &[u8]) -> Result<StreamInfo> {
    let summary = FlacDecoder::try_new(buf, Default::default())?.decode()?;
    Ok(summary.stream_info)
}
