// Voxverify
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use smallvec::SmallVec;

use voxverify_core::errors::{invalid_stream_error, Result};
use voxverify_core::io::ReadBitsLtr;

use log::trace;

use crate::frame::FrameHeader;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubframeType {
    Constant,
    Verbatim,
    /// A fixed polynomial predictor of the given order (0 to 4).
    FixedLinear(u32),
    /// A linear predictor of the given order (1 to 32).
    Linear(u32),
}

/// A summary of one walked subframe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subframe {
    pub subframe_type: SubframeType,
    /// The number of low-order bits dropped from every sample.
    pub wasted_bits: u32,
    /// The bits per sample of the coded samples, after removing wasted bits.
    pub bits_per_sample: u32,
}

/// Walks all subframes of a frame. `stream_bps` is the bits per sample of the stream.
pub fn read_subframes<B: ReadBitsLtr>(
    bs: &mut B,
    header: &FrameHeader,
    stream_bps: u32,
) -> Result<SmallVec<[Subframe; 2]>> {
    let assignment = header.channel_assignment;

    (0..assignment.n_channels())
        .map(|ch| {
            let bps = assignment.subframe_bits_per_sample(stream_bps, ch);
            read_subframe(bs, bps, header.block_num_samples)
        })
        .collect()
}

/// Walks a single subframe of `block_len` samples with a nominal sample size of `frame_bps`.
pub fn read_subframe<B: ReadBitsLtr>(
    bs: &mut B,
    frame_bps: u32,
    block_len: u32,
) -> Result<Subframe> {
    if frame_bps < 1 || frame_bps > 33 {
        return invalid_stream_error("subframe bits per sample out of bounds");
    }

    // First sub-frame bit must always 0.
    if bs.read_bit()? {
        return invalid_stream_error("subframe padding is not 0");
    }

    // Next 6 bits designate the sub-frame type.
    let subframe_type_enc = bs.read_bits_leq32(6)?;

    let subframe_type = match subframe_type_enc {
        0x00 => SubframeType::Constant,
        0x01 => SubframeType::Verbatim,
        0x08..=0x0c => SubframeType::FixedLinear(subframe_type_enc & 0x07),
        0x20..=0x3f => SubframeType::Linear((subframe_type_enc & 0x1f) + 1),
        _ => {
            return invalid_stream_error("subframe type set to reserved value");
        }
    };

    // If the wasted bits flag is set, unary decode the number of wasted bits per sample minus 1.
    let wasted_bits = if bs.read_bit()? {
        bs.read_unary_zeros(u64::from(frame_bps))? as u32 + 1
    }
    else {
        0
    };

    if wasted_bits >= frame_bps {
        return invalid_stream_error("subframe wasted bits exceed bits per sample");
    }

    let bps = frame_bps - wasted_bits;

    trace!("subframe: type={:?}, bps={}, wasted_bits={}", subframe_type, bps, wasted_bits);

    match subframe_type {
        SubframeType::Constant => bs.ignore_bits(u64::from(bps))?,
        SubframeType::Verbatim => skip_samples(bs, bps, block_len)?,
        SubframeType::FixedLinear(order) => read_fixed_linear(bs, bps, order, block_len)?,
        SubframeType::Linear(order) => read_linear(bs, bps, order, block_len)?,
    }

    Ok(Subframe { subframe_type, wasted_bits, bits_per_sample: bps })
}

#[inline(always)]
fn skip_samples<B: ReadBitsLtr>(bs: &mut B, bps: u32, n_samples: u32) -> Result<()> {
    bs.ignore_bits(u64::from(bps) * u64::from(n_samples))
}

fn read_fixed_linear<B: ReadBitsLtr>(
    bs: &mut B,
    bps: u32,
    order: u32,
    block_len: u32,
) -> Result<()> {
    if order > block_len {
        return invalid_stream_error("predictor order exceeds block size");
    }

    // The first `order` samples are encoded verbatim to warm-up the predictor.
    skip_samples(bs, bps, order)?;

    read_residual(bs, order, block_len)
}

fn read_linear<B: ReadBitsLtr>(bs: &mut B, bps: u32, order: u32, block_len: u32) -> Result<()> {
    // The order of the Linear Predictor should be between 1 and 32.
    debug_assert!(order > 0 && order <= 32);

    if order > block_len {
        return invalid_stream_error("predictor order exceeds block size");
    }

    skip_samples(bs, bps, order)?;

    // Quantized linear predictor (QLP) coefficients precision in bits (1-15).
    let qlp_precision = bs.read_bits_leq32(4)? + 1;

    if qlp_precision > 15 {
        return invalid_stream_error("qlp precision set to reserved value");
    }

    // QLP coefficients bit shift [-16, 15].
    let qlp_coeff_shift = bs.read_bits_leq32_signed(5)?;

    if qlp_coeff_shift < 0 {
        return invalid_stream_error("lpc shifts less than 0 are not allowed");
    }

    // The coefficients themselves.
    skip_samples(bs, qlp_precision, order)?;

    read_residual(bs, order, block_len)
}

fn read_residual<B: ReadBitsLtr>(bs: &mut B, n_prelude_samples: u32, block_len: u32) -> Result<()> {
    let method_enc = bs.read_bits_leq32(2)?;

    // The two residual coding methods differ only in the bit width of the Rice parameter.
    let param_bit_width = match method_enc {
        0x0 => 4,
        0x1 => 5,
        _ => {
            return invalid_stream_error("residual method set to reserved value");
        }
    };

    // Read the partition order. The number of partitions is equal to 2^order.
    let order = bs.read_bits_leq32(4)?;

    let n_partitions = 1u32 << order;
    let n_partition_samples = block_len >> order;

    // All partitions have the same number of samples such that the sum of all partition lengths
    // equal the block length.
    if n_partitions * n_partition_samples != block_len {
        return invalid_stream_error("block size is not same as encoded residual");
    }

    // The warm-up samples are taken out of the first partition.
    if n_prelude_samples > n_partition_samples {
        return invalid_stream_error("residual partition too small for given predictor order");
    }

    read_residual_partition(bs, param_bit_width, n_partition_samples - n_prelude_samples)?;

    for _ in 1..n_partitions {
        read_residual_partition(bs, param_bit_width, n_partition_samples)?;
    }

    Ok(())
}

fn read_residual_partition<B: ReadBitsLtr>(
    bs: &mut B,
    param_bit_width: u32,
    n_residuals: u32,
) -> Result<()> {
    let rice_param = bs.read_bits_leq32(param_bit_width)?;

    // If the Rice parameter is all 1s, the residuals in this partition are stored in binary with
    // an explicit bit width instead.
    if rice_param < (1 << param_bit_width) - 1 {
        bs.decode_rice_run(rice_param, 0, n_residuals as usize)
    }
    else {
        let residual_bits = bs.read_bits_leq32(5)?;
        skip_samples(bs, residual_bits, n_residuals)
    }
}
