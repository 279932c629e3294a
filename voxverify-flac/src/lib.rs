// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A FLAC stream validator.
//!
//! The validator walks a complete, in-memory FLAC file: the `fLaC` marker, the metadata blocks,
//! and every frame and subframe, checking each structural rule of the format along the way. Audio
//! samples are never reconstructed. Residuals are entropy decoded only to advance the bitstream.
//!
//! ```no_run
//! let buf = std::fs::read("recording.flac").unwrap();
//! let info = voxverify_flac::decode(&buf).unwrap();
//! println!("{} Hz, {} channel(s)", info.sample_rate, info.channels);
//! ```

mod decoder;
mod frame;
mod metadata;
mod subframe;

pub use decoder::{decode, DecodeSummary, DecoderOptions, FlacDecoder, FrameSummary};
pub use frame::{read_frame_header, BlockSequence, ChannelAssignment, FrameHeader};
pub use metadata::{MetadataBlockHeader, MetadataBlockType, StreamInfo};
pub use subframe::{read_subframe, read_subframes, Subframe, SubframeType};

/// The FLAC stream marker, "fLaC" in ASCII.
pub const FLAC_STREAM_MARKER: [u8; 4] = *b"fLaC";
