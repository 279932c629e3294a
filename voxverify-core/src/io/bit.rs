// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::min;

use log::trace;
use once_cell::sync::Lazy;

use crate::errors::{end_of_stream_error, invalid_stream_error, misaligned_read_error, Result};
use crate::util::bits::{sign_extend_leq32_to_i32, zigzag_to_i64};

use super::ReadBytes;

/// The number of look-ahead bits used to index a Rice lookup table.
const RICE_WINDOW_BITS: u32 = 13;

/// The number of entries in each Rice lookup table.
const RICE_WINDOW_LEN: usize = 1 << RICE_WINDOW_BITS;

/// The largest Rice parameter that has a lookup table. Rice parameters are at most 5 bits wide and
/// the all-ones value is reserved as the escape code.
const RICE_MAX_PARAM: u32 = 30;

/// The number of residuals decoded back-to-back through the lookup table.
const RICE_CHUNK_LEN: usize = 4;

/// The number of cached bits required before a chunk of residuals may be decoded through the
/// lookup table.
const RICE_CHUNK_BITS: u32 = RICE_CHUNK_LEN as u32 * RICE_WINDOW_BITS;

/// Rice lookup tables, one per parameter. An entry maps a window of look-ahead bits to the total
/// number of bits occupied by the residual starting at the window, or 0 if the residual does not
/// fit within the window.
static RICE_TABLES: Lazy<Vec<[u8; RICE_WINDOW_LEN]>> = Lazy::new(build_rice_tables);

fn build_rice_tables() -> Vec<[u8; RICE_WINDOW_LEN]> {
    trace!("building rice tables for parameters 0..={}", RICE_MAX_PARAM);

    (0..=RICE_MAX_PARAM)
        .map(|param| {
            let mut table = [0u8; RICE_WINDOW_LEN];

            // A window of all zeros never resolves.
            for (window, entry) in table.iter_mut().enumerate().skip(1) {
                let quotient = (window as u32).leading_zeros() - (u32::BITS - RICE_WINDOW_BITS);
                let len = quotient + 1 + param;

                if len <= RICE_WINDOW_BITS {
                    *entry = len as u8;
                }
            }

            table
        })
        .collect()
}

mod private {
    use crate::errors::Result;

    pub trait FetchBitsLtr {
        /// Discard any remaining bits in the source and fetch new bits.
        fn fetch_bits(&mut self) -> Result<()>;

        /// Fetch new bits, and append them after the remaining bits.
        fn fetch_bits_partial(&mut self) -> Result<()>;

        /// Get all the bits in the source.
        fn get_bits(&self) -> u64;

        /// Get the number of bits left in the source.
        fn num_bits_left(&self) -> u32;

        /// Consume `num` bits from the source.
        fn consume_bits(&mut self, num: u32);
    }
}

/// A `FiniteBitStream` is a bit stream that has a known length in bits.
pub trait FiniteBitStream {
    /// Gets the number of bits left unread.
    fn bits_left(&self) -> u64;
}

/// `ReadBitsLtr` reads bits from most-significant to least-significant.
///
/// Fixed-width reads check that enough bits remain before consuming anything. On failure the
/// position of the stream is unchanged.
pub trait ReadBitsLtr: private::FetchBitsLtr + FiniteBitStream {
    /// Discards the remaining bits of the current byte and returns them. Returns 0 if the stream
    /// is already byte-aligned.
    #[inline(always)]
    fn realign(&mut self) -> u32 {
        let skip = self.num_bits_left() & 0x7;

        if skip == 0 {
            return 0;
        }

        let bits = (self.get_bits() >> (u64::BITS - skip)) as u32;
        self.consume_bits(skip);
        bits
    }

    /// Ignores the specified number of bits from the stream or returns an error.
    fn ignore_bits(&mut self, mut num_bits: u64) -> Result<()> {
        if num_bits > self.bits_left() {
            return end_of_stream_error();
        }

        while num_bits > u64::from(self.num_bits_left()) {
            num_bits -= u64::from(self.num_bits_left());
            self.fetch_bits()?;
        }

        if num_bits > 0 {
            // Shift out in two parts to prevent panicing when num_bits == 64.
            let num_bits = num_bits as u32;
            self.consume_bits(num_bits - 1);
            self.consume_bits(1);
        }

        Ok(())
    }

    /// Read a single bit as a boolean value or returns an error.
    #[inline(always)]
    fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits_leq32(1)? == 1)
    }

    /// Reads up to 32-bits and interprets them as an unsigned integer or returns an error.
    #[inline(always)]
    fn read_bits_leq32(&mut self, bit_width: u32) -> Result<u32> {
        debug_assert!(bit_width <= u32::BITS);

        if bit_width == 0 {
            return Ok(0);
        }

        if u64::from(bit_width) > self.bits_left() {
            return end_of_stream_error();
        }

        // A partial fetch tops the cache up to at least 57 bits, or all remaining bits, so one
        // fetch is always enough.
        if bit_width > self.num_bits_left() {
            self.fetch_bits_partial()?;
        }

        let bits = self.get_bits() >> (u64::BITS - bit_width);
        self.consume_bits(bit_width);

        Ok(bits as u32)
    }

    /// Reads up to 32-bits and interprets them as a signed two's complement integer or returns an
    /// error.
    #[inline(always)]
    fn read_bits_leq32_signed(&mut self, bit_width: u32) -> Result<i32> {
        let value = self.read_bits_leq32(bit_width)?;
        Ok(sign_extend_leq32_to_i32(value, bit_width))
    }

    /// Reads a unary zeros encoded integer. The run of zeros must be terminated by a one bit
    /// before the run grows longer than `limit`, otherwise an error is returned.
    fn read_unary_zeros(&mut self, limit: u64) -> Result<u64> {
        let mut num = 0;

        loop {
            // Unused bits in the cache are always 0.
            let n_zeros = self.get_bits().leading_zeros();

            if n_zeros >= self.num_bits_left() {
                // All the remaining bits were 0.
                num += u64::from(self.num_bits_left());

                if num > limit {
                    return invalid_stream_error("unary run too long");
                }

                self.fetch_bits()?;
            }
            else {
                num += u64::from(n_zeros);

                if num > limit {
                    return invalid_stream_error("unary run too long");
                }

                // There is at least one more bit, the terminating 1 bit, in the cache.
                self.consume_bits(n_zeros);
                self.consume_bits(1);

                break;
            }
        }

        Ok(num)
    }

    /// Reads one Rice coded signed integer with Rice parameter `param` bit-by-bit.
    ///
    /// The quotient may not exceed `2^(53 - param)` so that the folded value always fits within
    /// 54 bits.
    fn read_rice_signed(&mut self, param: u32) -> Result<i64> {
        debug_assert!(param <= RICE_MAX_PARAM);

        let quotient = self.read_unary_zeros(1 << (53 - param))?;
        let remainder = self.read_bits_leq32(param)?;

        Ok(zigzag_to_i64((quotient << param) | u64::from(remainder)))
    }

    /// Decodes and discards the Rice coded residuals with indicies `start..end` of a partition.
    ///
    /// Residuals are decoded in chunks through a lookup table while enough bits are cached. Any
    /// residual that does not fit within the look-ahead window falls back to `read_rice_signed`.
    fn decode_rice_run(&mut self, param: u32, start: usize, end: usize) -> Result<()> {
        debug_assert!(param <= RICE_MAX_PARAM);
        debug_assert!(start <= end);

        let table = &RICE_TABLES[param as usize];

        let mut i = start;

        while i < end {
            if end - i >= RICE_CHUNK_LEN {
                if self.num_bits_left() < RICE_CHUNK_BITS
                    && self.bits_left() > u64::from(self.num_bits_left())
                {
                    self.fetch_bits_partial()?;
                }

                if self.num_bits_left() >= RICE_CHUNK_BITS {
                    for _ in 0..RICE_CHUNK_LEN {
                        // A slow path decode within the chunk may drain the cache below the
                        // window size, in which case the window would contain padding.
                        let len = if self.num_bits_left() >= RICE_WINDOW_BITS {
                            table[(self.get_bits() >> (u64::BITS - RICE_WINDOW_BITS)) as usize]
                        }
                        else {
                            0
                        };

                        if len > 0 {
                            self.consume_bits(u32::from(len));
                        }
                        else {
                            self.read_rice_signed(param)?;
                        }
                    }

                    i += RICE_CHUNK_LEN;
                    continue;
                }
            }

            self.read_rice_signed(param)?;
            i += 1;
        }

        Ok(())
    }
}

/// `BitReaderLtr` reads bits from most-significant to least-significant from any `&[u8]`.
///
/// Stated another way, if N-bits are read from a `BitReaderLtr` then bit 0, the first bit read,
/// is the most-significant bit, and bit N-1, the last bit read, is the least-significant.
///
/// Unlike a plain bit stream, `BitReaderLtr` keeps the whole buffer so that it can report its
/// byte position and seek to an absolute byte offset.
pub struct BitReaderLtr<'a> {
    buf: &'a [u8],
    /// The index of the next byte to be loaded into the cache.
    next: usize,
    bits: u64,
    n_bits_left: u32,
}

impl<'a> BitReaderLtr<'a> {
    /// Instantiate a new `BitReaderLtr` with the given buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReaderLtr { buf, next: 0, bits: 0, n_bits_left: 0 }
    }

    /// Gets the index of the byte containing the next unread bit.
    #[inline(always)]
    pub fn pos(&self) -> usize {
        self.next - ((self.n_bits_left as usize + 7) >> 3)
    }

    /// Gets the offset of the next unread bit within the byte at `pos()`, counting from the
    /// most-significant bit.
    #[inline(always)]
    pub fn bit_pos(&self) -> u32 {
        self.n_bits_left.wrapping_neg() & 0x7
    }

    /// Returns `true` if the next unread bit is the first bit of a byte.
    #[inline(always)]
    pub fn is_aligned(&self) -> bool {
        self.bit_pos() == 0
    }

    /// Gets the length of the underlying buffer in bytes.
    #[inline(always)]
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// Discards all cached bits and continues reading at the byte offset `pos`.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            return end_of_stream_error();
        }

        trace!("seek: from={}, to={}", self.pos(), pos);

        self.next = pos;
        self.bits = 0;
        self.n_bits_left = 0;

        Ok(())
    }

    /// Reads one whole byte. The stream must be byte-aligned.
    #[inline(always)]
    pub fn read_aligned_byte(&mut self) -> Result<u8> {
        if !self.is_aligned() {
            return misaligned_read_error();
        }

        Ok(self.read_bits_leq32(8)? as u8)
    }

    /// Reads one whole byte, or returns `None` if the stream is exhausted. The stream must be
    /// byte-aligned.
    pub fn try_read_aligned_byte(&mut self) -> Result<Option<u8>> {
        if self.bits_left() == 0 {
            return Ok(None);
        }

        self.read_aligned_byte().map(Some)
    }
}

impl private::FetchBitsLtr for BitReaderLtr<'_> {
    fn fetch_bits_partial(&mut self) -> Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let src = &self.buf[self.next..];
        let read_len = min(src.len(), (u64::BITS - self.n_bits_left) as usize >> 3);

        if read_len == 0 {
            return end_of_stream_error();
        }

        buf[..read_len].copy_from_slice(&src[..read_len]);

        self.next += read_len;

        self.bits |= u64::from_be_bytes(buf) >> self.n_bits_left;
        self.n_bits_left += (read_len as u32) << 3;

        Ok(())
    }

    fn fetch_bits(&mut self) -> Result<()> {
        let mut buf = [0u8; std::mem::size_of::<u64>()];

        let src = &self.buf[self.next..];
        let read_len = min(src.len(), std::mem::size_of::<u64>());

        if read_len == 0 {
            return end_of_stream_error();
        }

        buf[..read_len].copy_from_slice(&src[..read_len]);

        self.next += read_len;

        self.bits = u64::from_be_bytes(buf);
        self.n_bits_left = (read_len as u32) << 3;

        Ok(())
    }

    #[inline(always)]
    fn get_bits(&self) -> u64 {
        self.bits
    }

    #[inline(always)]
    fn num_bits_left(&self) -> u32 {
        self.n_bits_left
    }

    #[inline(always)]
    fn consume_bits(&mut self, num: u32) {
        self.n_bits_left -= num;
        self.bits <<= num;
    }
}

impl ReadBitsLtr for BitReaderLtr<'_> {}

impl FiniteBitStream for BitReaderLtr<'_> {
    fn bits_left(&self) -> u64 {
        (8 * (self.buf.len() - self.next) as u64) + u64::from(self.n_bits_left)
    }
}

impl BitReaderLtr<'_> {
    fn read_aligned_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.read_buf_exact(&mut bytes)?;
        Ok(bytes)
    }
}

/// Byte-oriented reads on a `BitReaderLtr`. Every read requires the stream to be byte-aligned.
impl ReadBytes for BitReaderLtr<'_> {
    #[inline(always)]
    fn read_byte(&mut self) -> Result<u8> {
        self.read_aligned_byte()
    }

    #[inline(always)]
    fn read_double_bytes(&mut self) -> Result<[u8; 2]> {
        self.read_aligned_array()
    }

    #[inline(always)]
    fn read_triple_bytes(&mut self) -> Result<[u8; 3]> {
        self.read_aligned_array()
    }

    #[inline(always)]
    fn read_quad_bytes(&mut self) -> Result<[u8; 4]> {
        self.read_aligned_array()
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.is_aligned() {
            return misaligned_read_error();
        }

        if 8 * buf.len() as u64 > self.bits_left() {
            return end_of_stream_error();
        }

        for byte in buf.iter_mut() {
            *byte = self.read_bits_leq32(8)? as u8;
        }

        Ok(())
    }

    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        if !self.is_aligned() {
            return misaligned_read_error();
        }

        match count.checked_mul(8) {
            Some(num_bits) => self.ignore_bits(num_bits),
            None => end_of_stream_error(),
        }
    }

    #[inline(always)]
    fn pos(&self) -> u64 {
        BitReaderLtr::pos(self) as u64
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::{BitReaderLtr, FiniteBitStream, ReadBitsLtr};
    use crate::errors::Error;
    use crate::io::ReadBytes;

    /// Packs values most-significant bit first.
    #[derive(Default)]
    struct BitPacker {
        buf: Vec<u8>,
        n_bits: u64,
    }

    impl BitPacker {
        fn put(&mut self, value: u64, width: u32) {
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
        }

        fn put_rice(&mut self, value: i64, param: u32) {
            let folded = ((value << 1) ^ (value >> 63)) as u64;
            for _ in 0..(folded >> param) {
                self.put(0, 1);
            }
            self.put(1, 1);
            self.put(folded & ((1 << param) - 1), param);
        }
    }

    #[test]
    fn verify_bitreaderltr_read_bit() {
        let mut bs = BitReaderLtr::new(&[0b1010_1010]);

        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());
        assert!(bs.read_bit().unwrap());
        assert!(!bs.read_bit().unwrap());

        assert_eq!(bs.read_bit(), Err(Error::UnexpectedEndOfStream));

        let mut bs = BitReaderLtr::new(&[]);

        assert!(bs.read_bit().is_err());
    }

    #[test]
    fn verify_bitreaderltr_read_bits_leq32() {
        let mut bs = BitReaderLtr::new(&[0b1010_0101, 0b0111_1110, 0b1101_0011]);

        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0b0000_0000_0000_1010);
        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0b0000_0000_0000_0101);
        assert_eq!(bs.read_bits_leq32(13).unwrap(), 0b0000_1111_1101_1010);
        assert_eq!(bs.read_bits_leq32(3).unwrap(), 0b0000_0000_0000_0011);

        // Lower limit test.
        let mut bs = BitReaderLtr::new(&[0xff, 0xff, 0xff, 0xff]);

        assert_eq!(bs.read_bits_leq32(0).unwrap(), 0);
        assert_eq!(bs.pos(), 0);

        // Upper limit test.
        let mut bs = BitReaderLtr::new(&[0xff, 0xff, 0xff, 0xff, 0x01]);

        assert_eq!(bs.read_bits_leq32(32).unwrap(), u32::MAX);
        assert_eq!(bs.read_bits_leq32(8).unwrap(), 0x01);

        // Cache fetch test.
        let mut bs = BitReaderLtr::new(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);

        assert_eq!(bs.read_bits_leq32(3).unwrap(), 0x7);
        assert_eq!(bs.read_bits_leq32(32).unwrap(), u32::MAX);
        assert_eq!(bs.read_bits_leq32(32).unwrap(), 0xffff_fff8);
        assert_eq!(bs.read_bits_leq32(5).unwrap(), 0x01);
    }

    #[test]
    fn verify_bitreaderltr_read_past_end_does_not_advance() {
        let mut bs = BitReaderLtr::new(&[0xf0, 0x0f]);

        assert_eq!(bs.read_bits_leq32(3).unwrap(), 0x7);
        assert_eq!(bs.read_bits_leq32(14), Err(Error::UnexpectedEndOfStream));
        assert_eq!((bs.pos(), bs.bit_pos()), (0, 3));
        assert_eq!(bs.ignore_bits(14), Err(Error::UnexpectedEndOfStream));
        assert_eq!((bs.pos(), bs.bit_pos()), (0, 3));

        assert_eq!(bs.read_bits_leq32(13).unwrap(), 0b1_0000_0000_1111);
        assert_eq!(bs.bits_left(), 0);
    }

    #[test]
    fn verify_bitreaderltr_read_bits_leq32_signed() {
        let mut bs = BitReaderLtr::new(&[0xff; 80]);

        // An all-ones field is -1 at any width.
        for width in 1..=32 {
            assert_eq!(bs.read_bits_leq32_signed(width).unwrap(), -1);
        }

        let mut bs = BitReaderLtr::new(&[0b0111_1000, 0b0000_0000]);

        assert_eq!(bs.read_bits_leq32_signed(4).unwrap(), 7);
        assert_eq!(bs.read_bits_leq32_signed(4).unwrap(), -8);
        assert_eq!(bs.read_bits_leq32_signed(8).unwrap(), 0);
    }

    #[test]
    fn verify_bitreaderltr_position() {
        let mut bs = BitReaderLtr::new(&[0u8; 20]);

        for i in 0..160u64 {
            assert_eq!(bs.pos() as u64, i / 8);
            assert_eq!(u64::from(bs.bit_pos()), i % 8);
            assert_eq!(bs.bits_left(), 160 - i);
            bs.read_bit().unwrap();
        }

        assert_eq!(bs.pos(), 20);
        assert_eq!(bs.bit_pos(), 0);
    }

    #[test]
    fn verify_bitreaderltr_aligned_reads() {
        let mut bs = BitReaderLtr::new(&[0x12, 0x34, 0b1010_0000, 0x56]);

        assert_eq!(bs.read_aligned_byte().unwrap(), 0x12);
        assert_eq!(bs.read_bits_leq32(4).unwrap(), 0x3);
        assert_eq!(bs.read_aligned_byte(), Err(Error::MisalignedRead));
        assert_eq!(bs.realign(), 0x4);
        assert_eq!(bs.pos(), 2);

        assert_eq!(bs.read_bits_leq32(3).unwrap(), 0b101);
        assert_eq!(bs.realign(), 0);
        assert_eq!(bs.realign(), 0);
        assert_eq!(bs.try_read_aligned_byte().unwrap(), Some(0x56));
        assert_eq!(bs.try_read_aligned_byte().unwrap(), None);
    }

    #[test]
    fn verify_bitreaderltr_read_bytes() {
        let mut bs = BitReaderLtr::new(&[0xff, 0xf8, 0x59, 0x08, 0x00, 0x12, 0x34, 0x56]);

        assert_eq!(bs.read_be_u16().unwrap(), 0xfff8);
        assert_eq!(bs.read_be_u24().unwrap(), 0x590800);
        assert_eq!(ReadBytes::pos(&bs), 5);

        bs.read_bits_leq32(1).unwrap();
        assert_eq!(bs.read_u8(), Err(Error::MisalignedRead));
        assert_eq!(bs.ignore_bytes(1), Err(Error::MisalignedRead));
        bs.realign();

        assert_eq!(bs.read_be_u32(), Err(Error::UnexpectedEndOfStream));
        assert_eq!(bs.pos(), 6);
        assert_eq!(bs.read_be_u16().unwrap(), 0x3456);
    }

    #[test]
    fn verify_bitreaderltr_ignore_bits_and_seek() {
        let buf: Vec<u8> = (0..32).collect();
        let mut bs = BitReaderLtr::new(&buf);

        bs.ignore_bits(3).unwrap();
        bs.ignore_bits(64 + 64 + 5).unwrap();
        assert_eq!(bs.pos(), 17);
        assert_eq!(bs.read_aligned_byte().unwrap(), 17);

        bs.ignore_bits(0).unwrap();
        bs.seek(4).unwrap();
        assert_eq!(bs.read_aligned_byte().unwrap(), 4);

        bs.seek(32).unwrap();
        assert_eq!(bs.bits_left(), 0);
        assert_eq!(bs.seek(33), Err(Error::UnexpectedEndOfStream));
    }

    #[test]
    fn verify_bitreaderltr_read_unary_zeros() {
        let mut bs = BitReaderLtr::new(&[
            0b0000_0001,
            0b0001_0000,
            0b0000_0000,
            0b1000_0000,
            0b1111_1011,
        ]);

        assert_eq!(bs.read_unary_zeros(64).unwrap(), 7);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 3);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 12);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 7);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 0);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 0);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 0);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 0);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 1);
        assert_eq!(bs.read_unary_zeros(64).unwrap(), 0);

        // Run longer than the cache.
        let mut buf = vec![0u8; 12];
        buf.push(0x80);
        let mut bs = BitReaderLtr::new(&buf);

        assert_eq!(bs.read_unary_zeros(96).unwrap(), 96);

        let mut bs = BitReaderLtr::new(&buf);

        assert_eq!(bs.read_unary_zeros(95), Err(Error::InvalidFlacStream("unary run too long")));

        // Unterminated run.
        let mut bs = BitReaderLtr::new(&[0u8; 4]);

        assert_eq!(bs.read_unary_zeros(64), Err(Error::UnexpectedEndOfStream));
    }

    #[test]
    fn verify_bitreaderltr_random_round_trip() {
        let mut rng = SmallRng::seed_from_u64(0x5eed_f1ac);
        let mut packer = BitPacker::default();
        let mut fields = Vec::new();

        for _ in 0..4096 {
            let width = rng.random_range(0..=32u32);
            let value = u64::from(rng.random::<u32>()) & ((1u64 << width) - 1);
            packer.put(value, width);
            fields.push((value as u32, width));
        }

        let mut bs = BitReaderLtr::new(&packer.buf);
        let mut consumed = 0u64;

        for (value, width) in fields {
            assert_eq!(bs.read_bits_leq32(width).unwrap(), value);
            consumed += u64::from(width);
            assert_eq!(bs.pos() as u64, consumed / 8);
            assert_eq!(u64::from(bs.bit_pos()), consumed % 8);
        }
    }

    #[test]
    fn verify_bitreaderltr_read_rice_signed() {
        let mut packer = BitPacker::default();

        let values = [0i64, -1, 1, -2, 2, 1000, -1000, 123_456];

        for &value in values.iter() {
            packer.put_rice(value, 3);
        }
        packer.put(0xff, 8);

        let mut bs = BitReaderLtr::new(&packer.buf);

        for &value in values.iter() {
            assert_eq!(bs.read_rice_signed(3).unwrap(), value);
        }
        assert_eq!(bs.read_bits_leq32(8).unwrap(), 0xff);
    }

    #[test]
    fn verify_bitreaderltr_decode_rice_run_consumes_exact_bits() {
        let mut rng = SmallRng::seed_from_u64(0x0123_4567);

        for param in 0..=30 {
            let mut packer = BitPacker::default();

            // Mostly small residuals that resolve through the lookup table, with the occasional
            // large residual to force the slow path in the middle of a chunk.
            let count = 257;
            for i in 0..count {
                let value = if i % 37 == 5 {
                    rng.random_range(-(1i64 << 10)..(1i64 << 10)) << 4
                }
                else {
                    rng.random_range(-4i64..4) << param
                };
                packer.put_rice(value, param);
            }

            let n_bits = packer.n_bits;
            packer.put(0b1011_0111, 8);

            let mut bs = BitReaderLtr::new(&packer.buf);
            bs.decode_rice_run(param, 0, count).unwrap();

            assert_eq!(bs.pos() as u64, n_bits / 8, "param {}", param);
            assert_eq!(u64::from(bs.bit_pos()), n_bits % 8, "param {}", param);
            assert_eq!(bs.read_bits_leq32(8).unwrap(), 0b1011_0111);
        }
    }

    #[test]
    fn verify_bitreaderltr_decode_rice_run_bounded_on_zeros() {
        // Zeros can never terminate a unary run.
        let buf = vec![0u8; 1 << 21];

        let mut bs = BitReaderLtr::new(&buf);
        assert_eq!(
            bs.decode_rice_run(30, 0, 16),
            Err(Error::InvalidFlacStream("unary run too long"))
        );

        let mut bs = BitReaderLtr::new(&buf);
        assert_eq!(bs.decode_rice_run(0, 0, 16), Err(Error::UnexpectedEndOfStream));
    }

    #[test]
    fn verify_bitreaderltr_read_rice_signed_longest_run() {
        // With parameter 30 the longest allowed run is 2^23 zeros.
        let mut buf = vec![0u8; 1 << 20];
        buf.extend_from_slice(&[0x80, 0x00, 0x00, 0x00]);

        let mut bs = BitReaderLtr::new(&buf);
        assert_eq!(bs.read_rice_signed(30).unwrap(), 1 << 52);
        assert_eq!(bs.bits_left(), 1);

        let mut bs = BitReaderLtr::new(&buf);
        bs.decode_rice_run(30, 0, 1).unwrap();
        assert_eq!(bs.bits_left(), 1);

        // One more zero is too many.
        let mut buf = vec![0u8; 1 << 20];
        buf.extend_from_slice(&[0x40, 0x00, 0x00, 0x00]);

        let mut bs = BitReaderLtr::new(&buf);
        assert_eq!(bs.read_rice_signed(30), Err(Error::InvalidFlacStream("unary run too long")));

        let mut bs = BitReaderLtr::new(&buf);
        assert_eq!(
            bs.decode_rice_run(30, 0, 1),
            Err(Error::InvalidFlacStream("unary run too long"))
        );
    }

    #[test]
    fn verify_bitreaderltr_decode_rice_run_empty() {
        let mut bs = BitReaderLtr::new(&[]);

        bs.decode_rice_run(7, 12, 12).unwrap();
        assert_eq!(bs.bits_left(), 0);
    }
}
