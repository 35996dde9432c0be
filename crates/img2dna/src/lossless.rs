//! Bit-exact mode: raw samples written as chunked symbol lines.
//!
//! Body layout:
//!
//! ```text
//! alphabet=dna
//! mapping=ACGT
//! chunk_bits=16384
//! <symbols for the first chunk_bits bits>
//! <symbols for the next chunk_bits bits>
//! ...
//! ```

use crate::dna::{encode_symbols, Alphabet, MappingOrder, SymbolDecoder};
use crate::manifest::{BodyReader, Manifest};
use crate::{CodecError, PixelBuffer, Result};

/// Bits per body line unless configured otherwise (8192 bases).
pub const DEFAULT_CHUNK_BITS: usize = 16384;

/// Number of bytes rendered into [`LosslessStats::preview`].
const PREVIEW_BYTES: usize = 32;

/// Options for the lossless encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LosslessOptions {
    /// Symbol alphabet of the body.
    pub alphabet: Alphabet,
    /// Bit pair to nucleotide assignment (ignored for the binary alphabet).
    pub mapping: MappingOrder,
    /// Bits per body line; a positive multiple of 8.
    pub chunk_bits: usize,
}

impl Default for LosslessOptions {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::Dna,
            mapping: MappingOrder::default(),
            chunk_bits: DEFAULT_CHUNK_BITS,
        }
    }
}

impl LosslessOptions {
    fn validate(&self) -> Result<()> {
        if self.chunk_bits == 0 || self.chunk_bits % 8 != 0 {
            return Err(CodecError::InvalidOption(format!(
                "chunk_bits must be a positive multiple of 8, got {}",
                self.chunk_bits
            )));
        }
        Ok(())
    }
}

/// Size figures for a lossless encoding, without building the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LosslessStats {
    pub size_bytes: usize,
    pub total_bits: usize,
    pub total_symbols: usize,
    pub num_chunks: usize,
    /// Symbols of the first few bytes.
    pub preview: String,
}

/// Computes the size of the body [`encode`] would produce.
pub fn stats(buf: &PixelBuffer, opts: &LosslessOptions) -> Result<LosslessStats> {
    opts.validate()?;
    let size_bytes = buf.samples.len();
    let total_bits = size_bytes * 8;
    let mut preview = String::new();
    let head = &buf.samples[..size_bytes.min(PREVIEW_BYTES)];
    encode_symbols(head, opts.alphabet, &opts.mapping, &mut preview);
    Ok(LosslessStats {
        size_bytes,
        total_bits,
        total_symbols: total_bits / opts.alphabet.bits_per_symbol(),
        num_chunks: total_bits.div_ceil(opts.chunk_bits),
        preview,
    })
}

/// Builds the lossless body for `buf`.
pub fn encode(buf: &PixelBuffer, opts: &LosslessOptions) -> Result<String> {
    opts.validate()?;
    buf.validate()?;

    let chunk_bytes = opts.chunk_bits / 8;
    let symbols = buf.samples.len() * 8 / opts.alphabet.bits_per_symbol();
    let lines = buf.samples.len().div_ceil(chunk_bytes);
    let mut body = String::with_capacity(symbols + lines + 64);

    body.push_str(&format!(
        "alphabet={}\nmapping={}\nchunk_bits={}\n",
        opts.alphabet, opts.mapping, opts.chunk_bits
    ));
    for chunk in buf.samples.chunks(chunk_bytes) {
        encode_symbols(chunk, opts.alphabet, &opts.mapping, &mut body);
        body.push('\n');
    }
    Ok(body)
}

fn read_options(reader: &mut BodyReader<'_>) -> Result<LosslessOptions> {
    let alphabet: Alphabet = reader.parse_field("alphabet")?;
    let mapping: MappingOrder = reader.parse_field("mapping")?;
    let chunk_bits: usize = reader.parse_field("chunk_bits")?;
    if chunk_bits == 0 {
        return Err(reader.error("chunk_bits must be positive".to_string()));
    }
    Ok(LosslessOptions {
        alphabet,
        mapping,
        chunk_bits,
    })
}

/// Reads the options a lossless body was written with.
pub fn body_options(manifest: &Manifest) -> Result<LosslessOptions> {
    read_options(&mut BodyReader::new(&manifest.body))
}

/// Rebuilds the exact buffer from a verified manifest.
pub fn decode(manifest: &Manifest) -> Result<PixelBuffer> {
    let mut reader = BodyReader::new(&manifest.body);
    let opts = read_options(&mut reader)?;

    let expected = manifest.pixel_count().saturating_mul(manifest.channels);

    // Size the payload from the body before reserving anything.
    let lines: Vec<&str> = reader.remaining().collect();
    let symbols: usize = lines.iter().map(|line| line.len()).sum();
    let total_bits = symbols.saturating_mul(opts.alphabet.bits_per_symbol());
    if total_bits % 8 == 0 && total_bits / 8 != expected {
        return Err(CodecError::DimensionMismatch {
            expected,
            actual: total_bits / 8,
        });
    }

    let mut decoder = SymbolDecoder::with_capacity(opts.alphabet, opts.mapping, total_bits / 8);
    for line in lines {
        decoder.push(line)?;
    }
    let samples = decoder.finish()?;

    if samples.len() != expected {
        return Err(CodecError::DimensionMismatch {
            expected,
            actual: samples.len(),
        });
    }
    PixelBuffer::new(manifest.width, manifest.height, manifest.channels, samples)
}
