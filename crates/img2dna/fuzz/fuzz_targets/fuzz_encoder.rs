#![no_main]

use arbitrary::Arbitrary;
use img2dna::{encode, AlgoOptions, EncodeOptions, NlpOptions, PixelBuffer, Resample};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    channels: u8,
    pixels: Vec<u8>,
    palette_size: u16,
    max_side: u8,
    kernel: u8,
    dither: bool,
    lock_dims: bool,
    nlp: bool,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as usize).min(96);
    let height = (input.height as usize).min(96);
    let channels = (input.channels as usize % 4) + 1;

    let expected_size = width * height * channels;
    if input.pixels.len() < expected_size {
        return;
    }
    let Ok(buf) = PixelBuffer::new(width, height, channels, input.pixels[..expected_size].to_vec())
    else {
        return;
    };

    let opts = if input.nlp {
        EncodeOptions::LossyNlp(NlpOptions {
            preserve_dims: input.lock_dims,
            target_short_side: (input.max_side as usize).max(1),
            palette_probe: input.palette_size as usize,
        })
    } else {
        EncodeOptions::LossyAlgo(AlgoOptions {
            lock_dims: input.lock_dims,
            max_side: Some(input.max_side as usize),
            palette_size: input.palette_size as usize,
            resample: Resample::ALL[input.kernel as usize % Resample::ALL.len()],
            dither: input.dither,
        })
    };

    // Bad options and empty rasters are errors, not panics
    let _ = encode(&buf, &opts);
});
