//! Mode dispatch: options pick the encoder, the manifest header picks the
//! decoder.

use crate::manifest::{parse_manifest, Manifest, Mode};
use crate::{algo, lossless, nlp};
use crate::{AlgoOptions, LosslessOptions, NlpOptions, PixelBuffer, Result};

/// Encoder selection with the options for that mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeOptions {
    Lossless(LosslessOptions),
    LossyAlgo(AlgoOptions),
    LossyNlp(NlpOptions),
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions::Lossless(LosslessOptions::default())
    }
}

impl EncodeOptions {
    /// Lossless mode with default options.
    pub fn lossless() -> Self {
        EncodeOptions::Lossless(LosslessOptions::default())
    }

    /// Lossy-Algo mode with default options.
    pub fn lossy_algo() -> Self {
        EncodeOptions::LossyAlgo(AlgoOptions::default())
    }

    /// Lossy-NLP mode with default options.
    pub fn lossy_nlp() -> Self {
        EncodeOptions::LossyNlp(NlpOptions::default())
    }

    /// Default options for `mode`.
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Lossless => Self::lossless(),
            Mode::LossyAlgo => Self::lossy_algo(),
            Mode::LossyNlp => Self::lossy_nlp(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            EncodeOptions::Lossless(_) => Mode::Lossless,
            EncodeOptions::LossyAlgo(_) => Mode::LossyAlgo,
            EncodeOptions::LossyNlp(_) => Mode::LossyNlp,
        }
    }
}

/// A mode body together with the header fields it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub body: String,
}

impl Encoded {
    /// Wraps the body into a manifest, computing the checksum.
    pub fn into_manifest(self, mode: Mode) -> Manifest {
        Manifest::new(mode, self.width, self.height, self.channels, self.body)
    }
}

/// Encodes `buf` into a manifest without rendering it.
pub fn encode_manifest(buf: &PixelBuffer, opts: &EncodeOptions) -> Result<Manifest> {
    let encoded = match opts {
        EncodeOptions::Lossless(o) => Encoded {
            width: buf.width,
            height: buf.height,
            channels: buf.channels,
            body: lossless::encode(buf, o)?,
        },
        EncodeOptions::LossyAlgo(o) => algo::encode(buf, o)?,
        EncodeOptions::LossyNlp(o) => nlp::encode(buf, o)?,
    };
    Ok(encoded.into_manifest(opts.mode()))
}

/// Encodes `buf` into manifest text.
#[must_use = "this returns the manifest text"]
pub fn encode(buf: &PixelBuffer, opts: &EncodeOptions) -> Result<String> {
    let manifest = encode_manifest(buf, opts)?;
    log::debug!(
        "encoded {}x{}x{} as {} ({}x{}, {} body bytes)",
        buf.width,
        buf.height,
        buf.channels,
        manifest.mode,
        manifest.width,
        manifest.height,
        manifest.body.len()
    );
    Ok(manifest.render())
}

/// Decodes an already verified manifest.
pub fn decode_manifest(manifest: &Manifest) -> Result<PixelBuffer> {
    match manifest.mode {
        Mode::Lossless => lossless::decode(manifest),
        Mode::LossyAlgo => algo::decode(manifest),
        Mode::LossyNlp => nlp::decode(manifest),
    }
}

/// Parses, verifies and decodes manifest text.
///
/// The mode is taken from the header, so the caller never needs to know how
/// the manifest was produced.
#[must_use = "this returns the decoded image"]
pub fn decode(text: &str) -> Result<PixelBuffer> {
    let manifest = parse_manifest(text)?;
    let buf = decode_manifest(&manifest)?;
    log::debug!(
        "decoded {} manifest into {}x{}x{}",
        manifest.mode,
        buf.width,
        buf.height,
        buf.channels
    );
    Ok(buf)
}

/// Decodes image file bytes (PNG, JPEG, ...) and encodes them.
#[must_use = "this returns the manifest text"]
pub fn encode_image(bytes: &[u8], opts: &EncodeOptions) -> Result<String> {
    let buf = PixelBuffer::from_image_bytes(bytes)?;
    encode(&buf, opts)
}

/// Decodes manifest text straight to PNG file bytes.
#[must_use = "this returns the PNG bytes"]
pub fn decode_to_png(text: &str) -> Result<Vec<u8>> {
    decode(text)?.to_png_bytes()
}
