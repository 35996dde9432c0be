//! # img2dna
//!
//! Converts raster images into self-describing text manifests and back.
//!
//! ## Modes
//!
//! - **Lossless**: the raw samples are written as a chunked nucleotide
//!   (`ACGT`) or binary-digit text body. Decoding is bit-exact.
//! - **Lossy-Algo**: optional resize, median-cut palette quantization,
//!   optional Floyd–Steinberg dithering and run-length encoding of the
//!   palette indices.
//! - **Lossy-NLP**: the image is reduced to a handful of probe colors and
//!   described as a list of colored rectangles, plus a one-line English
//!   summary. Decoding paints a proxy image from that description.
//!
//! Every manifest carries a BLAKE3 checksum of its body which is verified
//! before any pixel is produced.
//!
//! ## Quick Start
//!
//! ```ignore
//! use img2dna::{decode, encode, EncodeOptions, PixelBuffer};
//!
//! let red = PixelBuffer::new(2, 2, 3, [255u8, 0, 0].repeat(4))?;
//! let manifest = encode(&red, &EncodeOptions::lossless())?;
//! assert_eq!(decode(&manifest)?, red);
//! ```
//!
//! ### From image files
//!
//! ```ignore
//! use img2dna::{decode_to_png, encode_image, AlgoOptions, EncodeOptions};
//!
//! let bytes = std::fs::read("photo.jpg")?;
//! let opts = EncodeOptions::LossyAlgo(AlgoOptions { palette_size: 8, ..Default::default() });
//! let manifest = encode_image(&bytes, &opts)?;
//! let png = decode_to_png(&manifest)?;
//! ```

use thiserror::Error;

pub mod algo;
pub mod buffer;
pub mod codec;
pub mod dna;
pub mod image_io;
pub mod lossless;
pub mod manifest;
pub mod nlp;
pub mod quantize;
pub mod resample;
pub mod rle;

pub use algo::AlgoOptions;
pub use buffer::PixelBuffer;
pub use codec::{decode, decode_to_png, encode, encode_image, EncodeOptions};
pub use dna::{Alphabet, MappingOrder};
pub use lossless::{LosslessOptions, LosslessStats};
pub use manifest::{parse_manifest, Manifest, Mode};
pub use nlp::{NlpOptions, Region};
pub use quantize::Palette;
pub use resample::Resample;
pub use rle::{run_decode, run_encode, Run};

/// Errors that can occur while encoding or decoding a manifest.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input cannot be interpreted as a raster.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Mode tag outside the known set, or an unsupported manifest version.
    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),

    /// The manifest text is truncated or structurally malformed.
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// The body digest does not match the one recorded in the header.
    #[error("checksum mismatch: header says {expected}, body hashes to {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Declared dimensions disagree with the decoded payload length.
    #[error("dimension mismatch: header implies {expected} values, payload has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A palette or probe bound that cannot be honored.
    #[error("palette overflow: {requested} colors is outside 1..={max}")]
    PaletteOverflow { requested: usize, max: usize },

    /// Unrecognized resampling kernel name.
    #[error("unsupported resample kernel: {0}")]
    UnsupportedResample(String),

    /// An encoder option outside its usable range.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// Result type for codec operations.
pub type Result<T> = core::result::Result<T, CodecError>;

/// Largest palette (and probe palette) a manifest may carry.
pub const MAX_PALETTE_SIZE: usize = 256;

/// Largest raster, in samples, a manifest may decode or resize to (1 GiB).
pub const MAX_DECODED_SAMPLES: usize = 1 << 30;

/// `width * height * channels` if it neither overflows nor exceeds
/// [`MAX_DECODED_SAMPLES`].
pub(crate) fn decoded_len(width: usize, height: usize, channels: usize) -> Option<usize> {
    width
        .checked_mul(height)?
        .checked_mul(channels)
        .filter(|&n| n <= MAX_DECODED_SAMPLES)
}

/// Supported channel counts: gray, gray+alpha, RGB, RGBA.
pub(crate) const MAX_CHANNELS: usize = 4;

/// Color tuple used by the quantizer; samples past `channels` stay zero.
pub(crate) type Color = [u8; MAX_CHANNELS];
