//! The manifest text format shared by every mode.
//!
//! ```text
//! IMG2DNA 1
//! mode=lossless
//! width=2
//! height=2
//! channels=4
//! checksum=blake3:<64 hex digits>
//!
//! <mode specific body>
//! ```
//!
//! The header is a fixed sequence of `key=value` lines terminated by an
//! empty line. Everything after that line is the body, and the checksum is
//! the BLAKE3 digest of exactly those bytes.

use crate::{decoded_len, CodecError, Result, MAX_CHANNELS, MAX_DECODED_SAMPLES};
use std::fmt;
use std::str::FromStr;

/// Leading token of every manifest.
pub const MAGIC: &str = "IMG2DNA";

/// The only manifest version this crate reads and writes.
pub const VERSION: u32 = 1;

const CHECKSUM_PREFIX: &str = "blake3:";
const CHECKSUM_HEX_LEN: usize = 64;

/// Encoding mode recorded in the manifest header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Bit-exact samples in a nucleotide or binary text body.
    Lossless,
    /// Palette quantization plus run-length encoded indices.
    LossyAlgo,
    /// Probe-color region description rendered as a proxy image.
    LossyNlp,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Lossless, Mode::LossyAlgo, Mode::LossyNlp];

    /// Tag written to the `mode=` header line.
    pub fn tag(self) -> &'static str {
        match self {
            Mode::Lossless => "lossless",
            Mode::LossyAlgo => "lossy-algo",
            Mode::LossyNlp => "lossy-nlp",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Mode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.tag() == s)
            .ok_or_else(|| CodecError::UnsupportedMode(format!("unknown mode tag {s:?}")))
    }
}

/// A parsed (or freshly built) manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: u32,
    pub mode: Mode,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// `blake3:` followed by the hex digest of `body`
    pub checksum: String,
    pub body: String,
}

impl Manifest {
    /// Wraps a body, computing its checksum.
    pub fn new(mode: Mode, width: usize, height: usize, channels: usize, body: String) -> Self {
        Self {
            version: VERSION,
            mode,
            width,
            height,
            channels,
            checksum: body_checksum(&body),
            body,
        }
    }

    /// Number of pixels declared by the header.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Samples of the declared raster, if it is small enough to decode.
    pub fn sample_count(&self) -> Result<usize> {
        decoded_len(self.width, self.height, self.channels).ok_or_else(|| {
            CodecError::ManifestParse(format!(
                "{}x{}x{} exceeds the decode limit of {MAX_DECODED_SAMPLES} samples",
                self.width, self.height, self.channels
            ))
        })
    }

    /// Re-hashes the body and compares it with the recorded checksum.
    pub fn verify(&self) -> Result<()> {
        let actual = body_checksum(&self.body);
        if actual != self.checksum {
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Serializes the manifest to text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 160);
        out.push_str(MAGIC);
        out.push(' ');
        out.push_str(&self.version.to_string());
        out.push('\n');
        push_field(&mut out, "mode", self.mode.tag());
        push_field(&mut out, "width", &self.width.to_string());
        push_field(&mut out, "height", &self.height.to_string());
        push_field(&mut out, "channels", &self.channels.to_string());
        push_field(&mut out, "checksum", &self.checksum);
        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for Manifest {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        parse_manifest(s)
    }
}

#[inline]
fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

/// Checksum string for a body.
pub fn body_checksum(body: &str) -> String {
    format!("{CHECKSUM_PREFIX}{}", blake3::hash(body.as_bytes()).to_hex())
}

/// Parses and validates manifest text, including the body checksum.
pub fn parse_manifest(text: &str) -> Result<Manifest> {
    let mut reader = LineReader::new(text);

    let first = reader.line("magic")?;
    let (magic, version) = first
        .split_once(' ')
        .ok_or_else(|| CodecError::ManifestParse(format!("malformed first line {first:?}")))?;
    if magic != MAGIC {
        return Err(CodecError::ManifestParse(format!(
            "missing {MAGIC} magic (found {magic:?})"
        )));
    }
    let version: u32 = version
        .parse()
        .map_err(|_| CodecError::ManifestParse(format!("invalid version {version:?}")))?;
    if version != VERSION {
        return Err(CodecError::UnsupportedMode(format!(
            "manifest version {version} (supported: {VERSION})"
        )));
    }

    let mode: Mode = reader.field("mode")?.parse()?;
    let width = parse_number(reader.field("width")?, "width")?;
    let height = parse_number(reader.field("height")?, "height")?;
    let channels = parse_number(reader.field("channels")?, "channels")?;
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(CodecError::ManifestParse(format!(
            "channels must be 1..={MAX_CHANNELS}, got {channels}"
        )));
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            CodecError::ManifestParse(format!("{width}x{height}x{channels} overflows"))
        })?;

    let checksum = reader.field("checksum")?;
    let digest = checksum.strip_prefix(CHECKSUM_PREFIX).unwrap_or_default();
    if digest.len() != CHECKSUM_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::ManifestParse(format!(
            "malformed checksum {checksum:?}"
        )));
    }

    let separator = reader.line("header separator")?;
    if !separator.is_empty() {
        return Err(CodecError::ManifestParse(format!(
            "expected empty line after header, found {separator:?}"
        )));
    }

    let manifest = Manifest {
        version,
        mode,
        width,
        height,
        channels,
        checksum: checksum.to_ascii_lowercase(),
        body: reader.rest.to_string(),
    };
    manifest.verify()?;
    Ok(manifest)
}

fn parse_number(value: &str, key: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        CodecError::ManifestParse(format!(
            "{key} must be a non-negative integer, got {value:?}"
        ))
    })
}

/// Splits header lines off the front of the text.
struct LineReader<'a> {
    rest: &'a str,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn line(&mut self, what: &str) -> Result<&'a str> {
        let (line, tail) = self
            .rest
            .split_once('\n')
            .ok_or_else(|| CodecError::ManifestParse(format!("truncated header: missing {what}")))?;
        self.rest = tail;
        Ok(line.strip_suffix('\r').unwrap_or(line))
    }

    fn field(&mut self, key: &str) -> Result<&'a str> {
        let line = self.line(key)?;
        match line.split_once('=') {
            Some((k, v)) if k == key => Ok(v),
            _ => Err(CodecError::ManifestParse(format!(
                "expected `{key}=` header line, found {line:?}"
            ))),
        }
    }
}

/// Line cursor over a mode body; every failure is a `ManifestParse`.
pub(crate) struct BodyReader<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
}

impl<'a> BodyReader<'a> {
    pub(crate) fn new(body: &'a str) -> Self {
        Self {
            lines: body.lines(),
            line_no: 0,
        }
    }

    pub(crate) fn line(&mut self, what: &str) -> Result<&'a str> {
        self.line_no += 1;
        self.lines.next().ok_or_else(|| {
            CodecError::ManifestParse(format!("body truncated: missing {what}"))
        })
    }

    pub(crate) fn field(&mut self, key: &str) -> Result<&'a str> {
        let line = self.line(key)?;
        match line.split_once('=') {
            Some((k, v)) if k == key => Ok(v),
            _ => Err(self.error(format!("expected `{key}=`, found {line:?}"))),
        }
    }

    pub(crate) fn parse_field<T: FromStr>(&mut self, key: &str) -> Result<T> {
        let value = self.field(key)?;
        value
            .parse()
            .map_err(|_| self.error(format!("invalid {key} value {value:?}")))
    }

    /// Parses a `<w>x<h>` field.
    pub(crate) fn size_field(&mut self, key: &str) -> Result<(usize, usize)> {
        let value = self.field(key)?;
        parse_size(value).ok_or_else(|| self.error(format!("invalid {key} size {value:?}")))
    }

    pub(crate) fn error(&self, msg: String) -> CodecError {
        CodecError::ManifestParse(format!("body line {}: {msg}", self.line_no))
    }

    /// Lines not consumed yet.
    pub(crate) fn remaining(self) -> std::str::Lines<'a> {
        self.lines
    }
}

/// Parses `<w>x<h>`.
pub(crate) fn parse_size(value: &str) -> Option<(usize, usize)> {
    let (w, h) = value.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
