// Voxverify Check Tool
// Copyright (c) 2024 The Project Voxverify Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Justification: Fields on VerifyOptions and DecoderOptions may change at any time, but
// voxverify-check doesn't want to be updated every time those fields change, therefore always fill
// in the remaining fields with default values.
#![allow(clippy::needless_update)]

use std::path::{Path, PathBuf};

use voxverify::core::errors::Result;
use voxverify::flac::DecoderOptions;
use voxverify::{validate, verify, Format, Verdict, VerifyOptions};

use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatChoice {
    /// Detect the format from the file magic, then the file extension.
    Auto,
    Flac,
    Wav,
}

/// Check recorded audio files are structurally sound and have the expected properties.
#[derive(Parser, Debug)]
#[command(name = "Voxverify Check")]
#[command(version)]
struct Args {
    /// The format of the input files
    #[arg(long, value_enum, default_value = "auto")]
    format: FormatChoice,

    /// The expected number of channels
    #[arg(long, default_value_t = 1)]
    channels: u32,

    /// The expected bits per sample
    #[arg(long, default_value_t = 16)]
    bits: u32,

    /// Accept Wave headers with the chunk sizes filled in
    #[arg(long)]
    allow_patched_sizes: bool,

    /// Do not replace an unknown FLAC stream length with the counted length
    #[arg(long)]
    no_backfill: bool,

    /// Print one JSON object per file
    #[arg(long)]
    json: bool,

    /// The input file paths
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct VerdictReport {
    format: &'static str,
    valid: bool,
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    n_samples: u64,
    duration: u64,
}

impl From<&Verdict> for VerdictReport {
    fn from(verdict: &Verdict) -> Self {
        VerdictReport {
            format: verdict.format.name(),
            valid: verdict.valid,
            sample_rate: verdict.sample_rate,
            channels: verdict.channels,
            bits_per_sample: verdict.bits_per_sample,
            n_samples: verdict.n_samples,
            duration: verdict.duration,
        }
    }
}

#[derive(Serialize)]
struct FileReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<VerdictReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Default)]
struct CheckResult {
    n_valid: u64,
    n_invalid: u64,
    n_failed: u64,
}

fn resolve_format(choice: FormatChoice, path: &Path, buf: &[u8]) -> Option<Format> {
    match choice {
        FormatChoice::Flac => Some(Format::Flac),
        FormatChoice::Wav => Some(Format::Wav),
        FormatChoice::Auto => Format::detect(buf).or_else(|| {
            path.extension().and_then(|ext| ext.to_str()).and_then(Format::from_extension)
        }),
    }
}

fn check_buf(
    choice: FormatChoice,
    path: &Path,
    buf: &[u8],
    opts: &VerifyOptions,
) -> Result<Verdict> {
    match resolve_format(choice, path, buf) {
        Some(format) => validate(format, buf, opts),
        // Unrecognized format.
        None => verify(buf, opts),
    }
}

fn check_file(path: &Path, args: &Args, opts: &VerifyOptions) -> FileReport {
    let display = path.display().to_string();

    let buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(err) => {
            warn!("{}: could not read file: {}", display, err);
            return FileReport { path: display, verdict: None, error: Some(err.to_string()) };
        }
    };

    info!("{}: read {} bytes", display, buf.len());

    match check_buf(args.format, path, &buf, opts) {
        Ok(verdict) => {
            if !verdict.valid {
                warn!("{}: unexpected stream properties {:?}", display, verdict);
            }
            let verdict = VerdictReport::from(&verdict);
            FileReport { path: display, verdict: Some(verdict), error: None }
        }
        Err(err) => {
            warn!("{}: {}", display, err);
            FileReport { path: display, verdict: None, error: Some(err.to_string()) }
        }
    }
}

fn print_report(report: &FileReport, is_json: bool) {
    if is_json {
        match serde_json::to_string(report) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("{}: could not serialize report: {}", report.path, err),
        }
        return;
    }

    match (&report.verdict, &report.error) {
        (Some(verdict), _) => println!(
            "{}: {} ({}, {} Hz, {} ch, {} bit, {} samples, duration {})",
            report.path,
            if verdict.valid { "ok" } else { "invalid" },
            verdict.format,
            verdict.sample_rate,
            verdict.channels,
            verdict.bits_per_sample,
            verdict.n_samples,
            verdict.duration,
        ),
        (None, Some(err)) => println!("{}: error: {}", report.path, err),
        (None, None) => println!("{}: error", report.path),
    }
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();

    let opts = VerifyOptions {
        expected_channels: args.channels,
        expected_bits_per_sample: args.bits,
        require_zero_wav_sizes: !args.allow_patched_sizes,
        decoder: DecoderOptions { backfill_n_samples: !args.no_backfill, ..Default::default() },
        ..Default::default()
    };

    let mut res: CheckResult = Default::default();

    for path in &args.files {
        let report = check_file(path, &args, &opts);

        match report.verdict {
            Some(ref verdict) if verdict.valid => res.n_valid += 1,
            Some(_) => res.n_invalid += 1,
            None => res.n_failed += 1,
        }

        print_report(&report, args.json);
    }

    if !args.json {
        println!();
        println!("Check Results");
        println!("=================================================");
        println!();
        println!("  Valid:   {:>12}", res.n_valid);
        println!("  Invalid: {:>12}", res.n_invalid);
        println!("  Failed:  {:>12}", res.n_failed);
        println!();
    }

    let ret = if res.n_invalid > 0 || res.n_failed > 0 { 1 } else { 0 };

    std::process::exit(ret);
}
