// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers to hand-assemble FLAC streams.

#![allow(dead_code)]

/// Writes bits most-significant bit first.
#[derive(Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    n_bits: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Writes the lower `width` bits of `value`. At most 64 bits may be written at once.
    pub fn put(&mut self, value: u64, width: u32) -> &mut Self {
        assert!(width <= u64::BITS, "cannot write {} bits at once", width);

        for i in (0..width).rev() {
            if self.n_bits % 8 == 0 {
                self.buf.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.buf.len() - 1;
                self.buf[last] |= 0x80 >> (self.n_bits % 8);
            }
            self.n_bits += 1;
        }
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for &byte in bytes {
            self.put(u64::from(byte), 8);
        }
        self
    }

    /// Writes a Rice coded signed value.
    pub fn put_rice(&mut self, value: i64, param: u32) -> &mut Self {
        let folded = ((value << 1) ^ (value >> 63)) as u64;
        for _ in 0..(folded >> param) {
            self.put(0, 1);
        }
        self.put(1, 1);
        self.put(folded & ((1 << param) - 1), param)
    }

    /// Pads with 0 bits to the next byte boundary.
    pub fn align(&mut self) -> &mut Self {
        while self.n_bits % 8 != 0 {
            self.put(0, 1);
        }
        self
    }

    pub fn n_bits(&self) -> u64 {
        self.n_bits
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Fields of a stream information block.
#[derive(Clone, Copy)]
pub struct Info {
    pub block_len_min: u16,
    pub block_len_max: u16,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub n_samples: u64,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            block_len_min: 16,
            block_len_max: 4096,
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
            n_samples: 0,
        }
    }
}

/// Writes the stream marker and a stream information block.
pub fn write_stream_header(w: &mut BitWriter, info: &Info, is_last: bool) {
    w.put_bytes(b"fLaC");
    w.put(u64::from(is_last), 1).put(0, 7).put(34, 24);
    w.put(u64::from(info.block_len_min), 16).put(u64::from(info.block_len_max), 16);
    w.put(0, 24).put(0, 24);
    w.put(u64::from(info.sample_rate), 20);
    w.put(u64::from(info.channels - 1), 3);
    w.put(u64::from(info.bits_per_sample - 1), 5);
    w.put(info.n_samples, 36);
    // MD5 signature.
    w.put(0, 64).put(0, 64);
}

/// Writes a metadata block of an arbitrary type filled with zeros.
pub fn write_metadata_block(w: &mut BitWriter, block_type: u8, len: u32, is_last: bool) {
    w.put(u64::from(is_last), 1).put(u64::from(block_type), 7).put(u64::from(len), 24);
    w.put_bytes(&vec![0u8; len as usize]);
}

/// Extended UTF8 encoding of up to 36 bits.
pub fn utf8_encode(value: u64) -> Vec<u8> {
    if value < 0x80 {
        return vec![value as u8];
    }

    let mut n_bytes = 2;
    while value >= 1 << (5 * n_bytes + 1) && n_bytes < 7 {
        n_bytes += 1;
    }

    let mut out = vec![0u8; n_bytes];
    let mut rest = value;
    for byte in out.iter_mut().skip(1).rev() {
        *byte = 0x80 | (rest & 0x3f) as u8;
        rest >>= 6;
    }
    out[0] = (0xff00u16 >> n_bytes) as u8 | rest as u8;
    out
}

/// Frame header fields.
#[derive(Clone, Copy)]
pub struct Frame {
    pub variable: bool,
    pub number: u64,
    pub block_size_code: u32,
    pub sample_rate_code: u32,
    pub channel_code: u32,
    pub bps_code: u32,
}

impl Default for Frame {
    fn default() -> Self {
        // 192 samples, 16 kHz, mono, 16-bit.
        Frame {
            variable: false,
            number: 0,
            block_size_code: 1,
            sample_rate_code: 5,
            channel_code: 0,
            bps_code: 4,
        }
    }
}

/// Writes a frame header. Escaped block size and sample rate values are written from `extra`.
pub fn write_frame_header(w: &mut BitWriter, frame: &Frame, extra: &[u8]) {
    w.put(0x3ffe, 14).put(0, 1).put(u64::from(frame.variable), 1);
    w.put(u64::from(frame.block_size_code), 4);
    w.put(u64::from(frame.sample_rate_code), 4);
    w.put(u64::from(frame.channel_code), 4);
    w.put(u64::from(frame.bps_code), 3).put(0, 1);
    w.put_bytes(&utf8_encode(frame.number));
    w.put_bytes(extra);
    w.put(0, 8);
}

/// Writes a constant subframe.
pub fn write_constant_subframe(w: &mut BitWriter, bps: u32, value: u64) {
    w.put(0, 1).put(0x00, 6).put(0, 1).put(value, bps);
}

/// Writes a verbatim subframe.
pub fn write_verbatim_subframe(w: &mut BitWriter, bps: u32, samples: &[u64]) {
    w.put(0, 1).put(0x01, 6).put(0, 1);
    for &sample in samples {
        w.put(sample, bps);
    }
}

/// Writes a fixed predictor subframe with one Rice partition holding `residuals`.
pub fn write_fixed_subframe(
    w: &mut BitWriter,
    bps: u32,
    warm_up: &[u64],
    param: u32,
    residuals: &[i64],
) {
    w.put(0, 1).put(0x08 + warm_up.len() as u64, 6).put(0, 1);
    for &sample in warm_up {
        w.put(sample, bps);
    }
    w.put(0, 2).put(0, 4).put(u64::from(param), 4);
    for &residual in residuals {
        w.put_rice(residual, param);
    }
}

/// Writes the frame padding and footer.
pub fn write_frame_footer(w: &mut BitWriter) {
    w.align();
    w.put(0, 16);
}

/// A complete stream with a single 192 sample constant frame.
pub fn minimal_stream() -> Vec<u8> {
    let mut w = BitWriter::new();
    write_stream_header(&mut w, &Info::default(), true);
    write_frame_header(&mut w, &Frame::default(), &[]);
    write_constant_subframe(&mut w, 16, 0x1234);
    write_frame_footer(&mut w);
    w.into_bytes()
}
