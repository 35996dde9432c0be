#![no_main]

use arbitrary::Arbitrary;
use img2dna::{decode, encode, AlgoOptions, EncodeOptions, PixelBuffer};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    channels: u8,
    pixels: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).clamp(1, 64);
    let height = (input.height as usize).clamp(1, 64);
    let channels = (input.channels as usize % 4) + 1;

    let expected_size = width * height * channels;
    if input.pixels.len() < expected_size {
        return;
    }
    let buf = PixelBuffer::new(width, height, channels, input.pixels[..expected_size].to_vec())
        .expect("sizes match");

    let text = encode(&buf, &EncodeOptions::lossless()).expect("lossless encode");
    assert_eq!(decode(&text).expect("lossless decode"), buf);

    // Few colors with a large enough palette must survive quantization exactly
    if buf.distinct_colors() <= 256 {
        let opts = EncodeOptions::LossyAlgo(AlgoOptions {
            lock_dims: true,
            palette_size: 256,
            ..Default::default()
        });
        let text = encode(&buf, &opts).expect("algo encode");
        assert_eq!(decode(&text).expect("algo decode"), buf);
    }
});
