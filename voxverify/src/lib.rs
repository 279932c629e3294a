// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Voxverify
//!
//! Voxverify is a 100% pure Rust validator for recorded speech audio. It confirms that a buffer
//! produced by a recorder is a structurally sound audio file, and recovers its stream properties.
//!
//! # Support
//!
//! | Format   | Validation                                                          |
//! |----------|---------------------------------------------------------------------|
//! | FLAC     | Full walk of the metadata blocks, frames, subframes, and residuals. |
//! | Wave     | The canonical 44-byte streaming header.                             |
//!
//! # Usage
//!
//! 1.  Read the whole file into memory.
//! 2.  Call [`verify`] to detect the format from its magic, or [`validate`] if the format is
//!     already known.
//! 3.  An `Err` means the file is corrupt. An `Ok` [`Verdict`] carries the stream properties, and
//!     whether they match the expectations in [`VerifyOptions`].
//!
//! ```no_run
//! use voxverify::{verify, VerifyOptions};
//!
//! let buf = std::fs::read("recording.flac").unwrap();
//!
//! match verify(&buf, &VerifyOptions::default()) {
//!     Ok(verdict) if verdict.valid => println!("ok: {} Hz", verdict.sample_rate),
//!     Ok(_) => println!("unexpected stream properties"),
//!     Err(err) => println!("corrupt: {}", err),
//! }
//! ```

mod verify;

pub use verify::{validate, verify, Format, Verdict, VerifyOptions};

pub use voxverify_core as core;
pub use voxverify_flac as flac;
pub use voxverify_wav as wav;
