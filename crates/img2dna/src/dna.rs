//! Text-safe symbol encodings for raw bytes.
//!
//! Bytes are read most significant bit first. The nucleotide alphabet maps
//! each 2-bit group through a [`MappingOrder`] (the default `ACGT` means
//! `00 -> A`, `01 -> C`, `10 -> G`, `11 -> T`); the binary alphabet writes
//! one `0`/`1` digit per bit.

use crate::{CodecError, Result};
use std::fmt;
use std::str::FromStr;

/// Symbol alphabet of a lossless body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alphabet {
    /// Four nucleotide letters, two bits each.
    #[default]
    Dna,
    /// ASCII `0` and `1`, one bit each.
    Binary,
}

impl Alphabet {
    pub fn as_str(self) -> &'static str {
        match self {
            Alphabet::Dna => "dna",
            Alphabet::Binary => "binary",
        }
    }

    #[inline]
    pub fn bits_per_symbol(self) -> usize {
        match self {
            Alphabet::Dna => 2,
            Alphabet::Binary => 1,
        }
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alphabet {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dna" => Ok(Alphabet::Dna),
            "binary" => Ok(Alphabet::Binary),
            other => Err(CodecError::InvalidOption(format!(
                "unknown alphabet {other:?} (expected dna or binary)"
            ))),
        }
    }
}

/// Assignment of 2-bit values to nucleotide letters.
///
/// Always a permutation of `A`, `C`, `G`, `T`; position `i` holds the
/// letter for the bit pair with value `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOrder([u8; 4]);

impl Default for MappingOrder {
    fn default() -> Self {
        Self(*b"ACGT")
    }
}

impl MappingOrder {
    pub fn new(order: &str) -> Result<Self> {
        let bytes = order.as_bytes();
        let mut sorted: Vec<u8> = bytes.to_vec();
        sorted.sort_unstable();
        if sorted != b"ACGT" {
            return Err(CodecError::InvalidOption(format!(
                "mapping order {order:?} is not a permutation of ACGT"
            )));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    fn base(&self, pair: u8) -> char {
        self.0[(pair & 0b11) as usize] as char
    }

    #[inline]
    fn pair(&self, base: u8) -> Option<u8> {
        self.0.iter().position(|&b| b == base).map(|p| p as u8)
    }
}

impl fmt::Display for MappingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl FromStr for MappingOrder {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Appends the symbols for `data` to `out`.
pub fn encode_symbols(data: &[u8], alphabet: Alphabet, mapping: &MappingOrder, out: &mut String) {
    out.reserve(data.len() * 8 / alphabet.bits_per_symbol());
    match alphabet {
        Alphabet::Dna => {
            for &byte in data {
                for shift in [6u8, 4, 2, 0] {
                    out.push(mapping.base(byte >> shift));
                }
            }
        }
        Alphabet::Binary => {
            for &byte in data {
                for shift in (0..8).rev() {
                    out.push(if (byte >> shift) & 1 == 1 { '1' } else { '0' });
                }
            }
        }
    }
}

/// Incremental symbol decoder; lines may split bytes at any bit position.
pub struct SymbolDecoder {
    alphabet: Alphabet,
    mapping: MappingOrder,
    acc: u16,
    pending_bits: usize,
    out: Vec<u8>,
}

impl SymbolDecoder {
    pub fn new(alphabet: Alphabet, mapping: MappingOrder) -> Self {
        Self {
            alphabet,
            mapping,
            acc: 0,
            pending_bits: 0,
            out: Vec::new(),
        }
    }

    pub fn with_capacity(alphabet: Alphabet, mapping: MappingOrder, bytes: usize) -> Self {
        let mut decoder = Self::new(alphabet, mapping);
        decoder.out.reserve(bytes);
        decoder
    }

    pub fn push(&mut self, symbols: &str) -> Result<()> {
        let width = self.alphabet.bits_per_symbol();
        for ch in symbols.bytes() {
            let value = match self.alphabet {
                Alphabet::Dna => self.mapping.pair(ch),
                Alphabet::Binary => match ch {
                    b'0' => Some(0),
                    b'1' => Some(1),
                    _ => None,
                },
            }
            .ok_or_else(|| {
                CodecError::ManifestParse(format!(
                    "invalid {} symbol {:?}",
                    self.alphabet,
                    ch as char
                ))
            })?;

            self.acc = (self.acc << width) | value as u16;
            self.pending_bits += width;
            if self.pending_bits >= 8 {
                self.pending_bits -= 8;
                self.out.push((self.acc >> self.pending_bits) as u8);
                self.acc &= (1 << self.pending_bits) - 1;
            }
        }
        Ok(())
    }

    /// Returns the decoded bytes; leftover bits are a truncation error.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.pending_bits != 0 {
            return Err(CodecError::ManifestParse(format!(
                "{} trailing bits do not form a whole byte",
                self.pending_bits
            )));
        }
        Ok(self.out)
    }
}

/// Encodes bytes as a single nucleotide string.
pub fn bytes_to_dna(data: &[u8], mapping: &MappingOrder) -> String {
    let mut out = String::new();
    encode_symbols(data, Alphabet::Dna, mapping, &mut out);
    out
}

/// Decodes a nucleotide string produced by [`bytes_to_dna`].
pub fn dna_to_bytes(text: &str, mapping: &MappingOrder) -> Result<Vec<u8>> {
    let mut decoder = SymbolDecoder::new(Alphabet::Dna, *mapping);
    decoder.push(text)?;
    decoder.finish()
}
