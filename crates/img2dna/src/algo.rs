//! Palette quantization and run-length mode.
//!
//! Encoding is a chain of pure stages: [`resize_stage`] → [`quantize_stage`]
//! → [`run_encode`]. The body records the palette and the runs:
//!
//! ```text
//! source=640x480
//! resample=bicubic
//! dither=false
//! palette=2
//! ff0000
//! 0000ff
//! runs=3
//! 0:10 1:4 0:2
//! ```

use crate::codec::Encoded;
use crate::manifest::{BodyReader, Manifest};
use crate::quantize::{
    apply_palette, build_palette, check_palette_size, map_dithered, map_nearest, parse_hex_color,
    Palette,
};
use crate::resample::{fit_longer_side, resize, Resample};
use crate::rle::{run_decode, run_encode, total_length, Run};
use crate::{CodecError, PixelBuffer, Result, MAX_PALETTE_SIZE};

pub const DEFAULT_MAX_SIDE: usize = 256;
pub const DEFAULT_PALETTE_SIZE: usize = 16;

const RUNS_PER_LINE: usize = 16;

/// Options for the palette/run-length encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlgoOptions {
    /// Keep the input dimensions, ignoring `max_side`.
    pub lock_dims: bool,
    /// Target length of the longer side when resizing.
    pub max_side: Option<usize>,
    /// Upper bound on palette entries (1-256).
    pub palette_size: usize,
    /// Kernel used by the resize stage.
    pub resample: Resample,
    /// Floyd–Steinberg error diffusion instead of nearest-color mapping.
    pub dither: bool,
}

impl Default for AlgoOptions {
    fn default() -> Self {
        Self {
            lock_dims: false,
            max_side: Some(DEFAULT_MAX_SIDE),
            palette_size: DEFAULT_PALETTE_SIZE,
            resample: Resample::default(),
            dither: false,
        }
    }
}

impl AlgoOptions {
    fn validate(&self) -> Result<()> {
        check_palette_size(self.palette_size)?;
        if self.max_side == Some(0) {
            return Err(CodecError::InvalidOption("max_side must be positive".into()));
        }
        Ok(())
    }
}

/// A raster reduced to palette indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub width: usize,
    pub height: usize,
    pub palette: Palette,
    /// One palette index per pixel, row-major.
    pub indices: Vec<u8>,
}

/// Resizes according to `lock_dims` / `max_side`; returns a new buffer.
pub fn resize_stage(buf: &PixelBuffer, opts: &AlgoOptions) -> Result<PixelBuffer> {
    match opts.max_side {
        Some(max_side) if !opts.lock_dims => {
            let (width, height) = fit_longer_side(buf.width, buf.height, max_side);
            resize(buf, width, height, opts.resample)
        }
        _ => Ok(buf.clone()),
    }
}

/// Builds the palette and maps every pixel onto it.
pub fn quantize_stage(buf: &PixelBuffer, opts: &AlgoOptions) -> Result<Quantized> {
    let palette = build_palette(buf, opts.palette_size)?;
    let indices = if opts.dither {
        map_dithered(buf, &palette)
    } else {
        map_nearest(buf, &palette)
    };
    Ok(Quantized {
        width: buf.width,
        height: buf.height,
        palette,
        indices,
    })
}

/// Runs the full pipeline and renders the body.
pub fn encode(buf: &PixelBuffer, opts: &AlgoOptions) -> Result<Encoded> {
    opts.validate()?;
    buf.validate()?;

    let resized = resize_stage(buf, opts)?;
    let quantized = quantize_stage(&resized, opts)?;
    let runs = run_encode(&quantized.indices);
    log::trace!(
        "lossy-algo: {}x{} -> {}x{}, {} colors, {} runs",
        buf.width,
        buf.height,
        quantized.width,
        quantized.height,
        quantized.palette.len(),
        runs.len()
    );

    let mut body = String::new();
    body.push_str(&format!("source={}x{}\n", buf.width, buf.height));
    body.push_str(&format!("resample={}\n", opts.resample));
    body.push_str(&format!("dither={}\n", opts.dither));
    body.push_str(&format!("palette={}\n", quantized.palette.len()));
    for i in 0..quantized.palette.len() {
        body.push_str(&quantized.palette.hex(i));
        body.push('\n');
    }
    body.push_str(&format!("runs={}\n", runs.len()));
    for line in runs.chunks(RUNS_PER_LINE) {
        let tokens: Vec<String> = line
            .iter()
            .map(|run| format!("{}:{}", run.value, run.length))
            .collect();
        body.push_str(&tokens.join(" "));
        body.push('\n');
    }

    Ok(Encoded {
        width: quantized.width,
        height: quantized.height,
        channels: buf.channels,
        body,
    })
}

/// Expands runs through the palette; header dimensions are authoritative.
pub fn decode(manifest: &Manifest) -> Result<PixelBuffer> {
    manifest.sample_count()?;
    let mut reader = BodyReader::new(&manifest.body);
    let _source = reader.size_field("source")?;
    let _resample: Resample = reader.parse_field("resample")?;
    let _dither: bool = reader.parse_field("dither")?;

    let palette_len: usize = reader.parse_field("palette")?;
    if palette_len > MAX_PALETTE_SIZE {
        return Err(CodecError::PaletteOverflow {
            requested: palette_len,
            max: MAX_PALETTE_SIZE,
        });
    }
    let mut colors = Vec::with_capacity(palette_len);
    for _ in 0..palette_len {
        let line = reader.line("palette entry")?;
        let color = parse_hex_color(line, manifest.channels).ok_or_else(|| {
            reader.error(format!(
                "palette entry {line:?} is not {} hex samples",
                manifest.channels
            ))
        })?;
        colors.push(color);
    }
    let palette = Palette::from_distinct(manifest.channels, colors)
        .ok_or_else(|| reader.error("duplicate palette entry".to_string()))?;

    let run_count: usize = reader.parse_field("runs")?;
    let runs = parse_runs(reader, run_count, palette.len())?;

    let expected = manifest.pixel_count();
    let actual = total_length(&runs).unwrap_or(usize::MAX);
    if actual != expected {
        return Err(CodecError::DimensionMismatch { expected, actual });
    }
    let indices = run_decode(&runs);
    apply_palette(manifest.width, manifest.height, &palette, &indices)
}

fn parse_runs(reader: BodyReader<'_>, count: usize, palette_len: usize) -> Result<Vec<Run<u8>>> {
    let mut runs = Vec::with_capacity(count.min(1 << 20));
    for token in reader.remaining().flat_map(str::split_whitespace) {
        let parsed = token.split_once(':').and_then(|(index, length)| {
            Some((index.parse::<usize>().ok()?, length.parse::<usize>().ok()?))
        });
        let (index, length) = parsed
            .ok_or_else(|| CodecError::ManifestParse(format!("malformed run {token:?}")))?;
        if index >= palette_len {
            return Err(CodecError::ManifestParse(format!(
                "run index {index} outside palette of {palette_len}"
            )));
        }
        if length == 0 {
            return Err(CodecError::ManifestParse(format!("empty run {token:?}")));
        }
        runs.push(Run {
            value: index as u8,
            length,
        });
    }
    if runs.len() != count {
        return Err(CodecError::ManifestParse(format!(
            "expected {count} runs, found {}",
            runs.len()
        )));
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Mode;

    fn checkerboard(size: usize) -> PixelBuffer {
        let mut samples = Vec::new();
        for y in 0..size {
            for x in 0..size {
                if (x + y) % 2 == 0 {
                    samples.extend_from_slice(&[255, 255, 255]);
                } else {
                    samples.extend_from_slice(&[0, 0, 0]);
                }
            }
        }
        PixelBuffer::new(size, size, 3, samples).unwrap()
    }

    fn roundtrip(buf: &PixelBuffer, opts: &AlgoOptions) -> PixelBuffer {
        let encoded = encode(buf, opts).unwrap();
        decode(&encoded.into_manifest(Mode::LossyAlgo)).unwrap()
    }

    #[test]
    fn test_body_layout() {
        let buf = PixelBuffer::new(3, 1, 3, vec![255, 0, 0, 255, 0, 0, 0, 0, 255]).unwrap();
        let opts = AlgoOptions {
            lock_dims: true,
            ..Default::default()
        };
        let encoded = encode(&buf, &opts).unwrap();
        assert_eq!(
            encoded.body,
            "source=3x1\nresample=bicubic\ndither=false\npalette=2\n\
             ff0000\n0000ff\nruns=2\n0:2 1:1\n"
        );
    }

    #[test]
    fn test_checkerboard_is_lossless_with_two_colors() {
        let buf = checkerboard(4);
        let opts = AlgoOptions {
            lock_dims: true,
            palette_size: 2,
            dither: false,
            ..Default::default()
        };
        assert_eq!(roundtrip(&buf, &opts), buf);
    }

    #[test]
    fn test_resize_to_max_side() {
        let buf = PixelBuffer::filled(40, 20, &[10, 20, 30]).unwrap();
        let opts = AlgoOptions {
            max_side: Some(10),
            resample: Resample::Nearest,
            ..Default::default()
        };
        let out = roundtrip(&buf, &opts);
        assert_eq!((out.width, out.height), (10, 5));
        assert_eq!(out.distinct_colors(), 1);
    }

    #[test]
    fn test_lock_dims_skips_resize() {
        let buf = PixelBuffer::filled(40, 20, &[10, 20, 30]).unwrap();
        let opts = AlgoOptions {
            lock_dims: true,
            max_side: Some(10),
            ..Default::default()
        };
        let resized = resize_stage(&buf, &opts).unwrap();
        assert_eq!(resized, buf);
    }

    #[test]
    fn test_runs_are_maximal_in_body() {
        let buf = PixelBuffer::new(4, 2, 1, vec![1, 1, 1, 1, 1, 2, 2, 2]).unwrap();
        let opts = AlgoOptions {
            lock_dims: true,
            ..Default::default()
        };
        let encoded = encode(&buf, &opts).unwrap();
        assert!(encoded.body.ends_with("runs=2\n0:5 1:3\n"));
    }

    #[test]
    fn test_palette_bound_with_dither() {
        let samples: Vec<u8> = (0..32 * 32 * 4).map(|i| (i * 37 % 251) as u8).collect();
        let buf = PixelBuffer::new(32, 32, 4, samples).unwrap();
        for palette_size in [1, 4, 9] {
            let opts = AlgoOptions {
                lock_dims: true,
                palette_size,
                dither: true,
                ..Default::default()
            };
            let out = roundtrip(&buf, &opts);
            assert_eq!((out.width, out.height, out.channels), (32, 32, 4));
            assert!(out.distinct_colors() <= palette_size);
        }
    }

    fn manifest_with_body(width: usize, height: usize, body: &str) -> Manifest {
        Manifest::new(Mode::LossyAlgo, width, height, 1, body.to_string())
    }

    #[test]
    fn test_run_sum_mismatch() {
        let body = "source=2x2\nresample=nearest\ndither=false\npalette=1\n00\nruns=1\n0:3\n";
        assert!(matches!(
            decode(&manifest_with_body(2, 2, body)),
            Err(CodecError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_index_outside_palette() {
        let body = "source=2x1\nresample=nearest\ndither=false\npalette=1\n00\nruns=2\n0:1 1:1\n";
        assert!(matches!(
            decode(&manifest_with_body(2, 1, body)),
            Err(CodecError::ManifestParse(_))
        ));
    }

    #[test]
    fn test_duplicate_palette_entry() {
        let body = "source=2x1\nresample=nearest\ndither=false\npalette=2\n00\n00\nruns=1\n0:2\n";
        assert!(matches!(
            decode(&manifest_with_body(2, 1, body)),
            Err(CodecError::ManifestParse(_))
        ));
    }

    #[test]
    fn test_run_count_mismatch() {
        let body = "source=2x1\nresample=nearest\ndither=false\npalette=1\n00\nruns=2\n0:2\n";
        assert!(matches!(
            decode(&manifest_with_body(2, 1, body)),
            Err(CodecError::ManifestParse(_))
        ));
    }

    #[test]
    fn test_runs_filling_huge_header() {
        let body = "source=1x1\nresample=nearest\ndither=false\npalette=1\n80\n\
                    runs=1\n0:18446744065119617025\n";
        assert!(matches!(
            decode(&manifest_with_body(4_294_967_295, 4_294_967_295, body)),
            Err(CodecError::ManifestParse(_))
        ));
    }

    #[test]
    fn test_oversized_resize_target() {
        let buf = PixelBuffer::filled(4, 2, &[1, 2, 3]).unwrap();
        let opts = AlgoOptions {
            max_side: Some(usize::MAX),
            ..Default::default()
        };
        assert!(matches!(encode(&buf, &opts), Err(CodecError::InvalidOption(_))));
    }

    #[test]
    fn test_invalid_options() {
        let buf = PixelBuffer::filled(2, 2, &[0]).unwrap();
        let zero = AlgoOptions {
            palette_size: 0,
            ..Default::default()
        };
        assert!(matches!(encode(&buf, &zero), Err(CodecError::PaletteOverflow { .. })));
        let no_side = AlgoOptions {
            max_side: Some(0),
            ..Default::default()
        };
        assert!(matches!(encode(&buf, &no_side), Err(CodecError::InvalidOption(_))));
    }
}
