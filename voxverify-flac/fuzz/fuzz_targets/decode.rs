#![no_main]

use libfuzzer_sys::fuzz_target;

use voxverify_flac::{DecoderOptions, FlacDecoder};

fuzz_target!(|data: &[u8]| {
    // Prefix the marker so that most inputs reach the metadata and frame parsers.
    let mut buf = b"fLaC".to_vec();
    buf.extend_from_slice(data);

    if let Ok(decoder) = FlacDecoder::try_new(&buf, DecoderOptions::default()) {
        let _ = decoder.decode();
    }
});
