use crate::{CodecError, Color, Result, MAX_CHANNELS};

/// An 8-bit raster in row-major order.
///
/// `channels` is 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA), and
/// `samples.len()` is always `width * height * channels` for buffers built
/// through [`PixelBuffer::new`]. The fields are public for convenience; the
/// encoders re-check the invariant with [`PixelBuffer::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Samples per pixel (1-4)
    pub channels: usize,
    /// Interleaved samples, `channels` bytes per pixel
    pub samples: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a buffer, checking the channel count and sample length.
    pub fn new(width: usize, height: usize, channels: usize, samples: Vec<u8>) -> Result<Self> {
        let buf = Self {
            width,
            height,
            channels,
            samples,
        };
        buf.validate()?;
        Ok(buf)
    }

    /// Creates a buffer where every pixel has the same color.
    pub fn filled(width: usize, height: usize, pixel: &[u8]) -> Result<Self> {
        let samples = pixel.repeat(width * height);
        Self::new(width, height, pixel.len(), samples)
    }

    /// Checks the buffer invariants.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(CodecError::InvalidImage(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        let expected = self
            .pixel_count()
            .checked_mul(self.channels)
            .ok_or_else(|| {
                CodecError::InvalidImage(format!(
                    "{}x{}x{} overflows",
                    self.width, self.height, self.channels
                ))
            })?;
        if self.samples.len() != expected {
            return Err(CodecError::DimensionMismatch {
                expected,
                actual: self.samples.len(),
            });
        }
        Ok(())
    }

    /// Number of pixels (`width * height`), saturating on overflow.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Returns true if the raster has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Samples of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = (y * self.width + x) * self.channels;
        &self.samples[start..start + self.channels]
    }

    /// Number of distinct pixel values in the raster.
    pub fn distinct_colors(&self) -> usize {
        let mut seen: Vec<Color> = self.colors().collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    /// Iterates the pixels as zero-padded color tuples.
    pub(crate) fn colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.samples.chunks_exact(self.channels).map(to_color)
    }

    /// Builds a buffer from one color tuple per pixel.
    pub(crate) fn from_colors(
        width: usize,
        height: usize,
        channels: usize,
        colors: impl IntoIterator<Item = Color>,
    ) -> Result<Self> {
        let mut samples = Vec::with_capacity(width * height * channels);
        for color in colors {
            samples.extend_from_slice(&color[..channels]);
        }
        Self::new(width, height, channels, samples)
    }
}

/// Copies up to four samples into a zero-padded tuple.
#[inline]
pub(crate) fn to_color(samples: &[u8]) -> Color {
    let mut color = [0u8; MAX_CHANNELS];
    color[..samples.len()].copy_from_slice(samples);
    color
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 12]).is_ok());
        assert!(matches!(
            PixelBuffer::new(2, 2, 3, vec![0; 11]),
            Err(CodecError::DimensionMismatch {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn test_new_checks_channels() {
        assert!(matches!(
            PixelBuffer::new(1, 1, 0, vec![]),
            Err(CodecError::InvalidImage(_))
        ));
        assert!(matches!(
            PixelBuffer::new(1, 1, 5, vec![0; 5]),
            Err(CodecError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_empty_raster_is_valid() {
        let buf = PixelBuffer::new(0, 7, 4, vec![]).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.distinct_colors(), 0);
    }

    #[test]
    fn test_pixel_access_and_distinct_colors() {
        let buf = PixelBuffer::new(2, 1, 2, vec![10, 255, 20, 128]).unwrap();
        assert_eq!(buf.pixel(1, 0), &[20, 128]);
        assert_eq!(buf.distinct_colors(), 2);

        let solid = PixelBuffer::filled(3, 3, &[1, 2, 3]).unwrap();
        assert_eq!(solid.distinct_colors(), 1);
        assert_eq!(solid.samples.len(), 27);
    }
}
