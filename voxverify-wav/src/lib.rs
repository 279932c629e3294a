// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A validator for the canonical 44-byte WAVE header written by streaming recorders.
//!
//! Streaming recorders write the header before any audio is captured and never seek back to patch
//! the chunk sizes. The header is therefore expected to be the plain `RIFF`, `fmt `, `data`
//! sequence with the sizes left at 0.

mod header;

pub use header::{WaveExpectations, WaveHeader, WAVE_HEADER_SIZE};

/// The RIFF chunk id, "RIFF" in ASCII.
pub const RIFF_STREAM_MARKER: [u8; 4] = *b"RIFF";
