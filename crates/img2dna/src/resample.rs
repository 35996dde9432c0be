use crate::{decoded_len, CodecError, PixelBuffer, Result, MAX_DECODED_SAMPLES};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use std::fmt;
use std::str::FromStr;

/// Resampling kernel used when resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resample {
    /// Nearest sample.
    Nearest,
    /// Linear interpolation over the 2x2 neighborhood.
    Bilinear,
    /// Catmull-Rom cubic over the 4x4 neighborhood.
    #[default]
    Bicubic,
    /// Lanczos windowed sinc with a window of 3.
    Lanczos,
}

impl Resample {
    pub const ALL: [Resample; 4] = [
        Resample::Nearest,
        Resample::Bilinear,
        Resample::Bicubic,
        Resample::Lanczos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resample::Nearest => "nearest",
            Resample::Bilinear => "bilinear",
            Resample::Bicubic => "bicubic",
            Resample::Lanczos => "lanczos",
        }
    }

    fn filter(self) -> FilterType {
        match self {
            Resample::Nearest => FilterType::Nearest,
            Resample::Bilinear => FilterType::Triangle,
            Resample::Bicubic => FilterType::CatmullRom,
            Resample::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for Resample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resample {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Resample::ALL
            .into_iter()
            .find(|kernel| kernel.name() == s)
            .ok_or_else(|| CodecError::UnsupportedResample(s.to_string()))
    }
}

/// Dimensions whose longer side equals `max_side`, keeping the aspect ratio.
///
/// The shorter side is rounded to the nearest pixel and never drops below 1.
pub fn fit_longer_side(width: usize, height: usize, max_side: usize) -> (usize, usize) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scaled = |short: usize, long: usize| scale_rounded(short, max_side, long).max(1);
    if width >= height {
        (max_side, scaled(height, width))
    } else {
        (scaled(width, height), max_side)
    }
}

/// Dimensions whose shorter side is at most `short_side`; never upscales.
pub fn fit_shorter_side(width: usize, height: usize, short_side: usize) -> (usize, usize) {
    let short = width.min(height);
    if short <= short_side || short == 0 {
        return (width, height);
    }
    let scaled = |long: usize| scale_rounded(long, short_side, short).max(1);
    if width <= height {
        (short_side, scaled(height))
    } else {
        (scaled(width), short_side)
    }
}

/// `value * to / from` rounded to nearest; `from` must be non-zero.
///
/// The product is taken in `u128`, where it cannot overflow.
fn scale_rounded(value: usize, to: usize, from: usize) -> usize {
    let (value, to, from) = (value as u128, to as u128, from as u128);
    usize::try_from((value * to + from / 2) / from).unwrap_or(usize::MAX)
}

/// Returns a resized copy of `buf`; the input is left untouched.
pub fn resize(
    buf: &PixelBuffer,
    width: usize,
    height: usize,
    kernel: Resample,
) -> Result<PixelBuffer> {
    buf.validate()?;
    if (width, height) == (buf.width, buf.height) {
        return Ok(buf.clone());
    }
    if buf.is_empty() || width == 0 || height == 0 {
        return Err(CodecError::InvalidImage(format!(
            "cannot resize {}x{} to {width}x{height}",
            buf.width, buf.height
        )));
    }
    if decoded_len(width, height, buf.channels).is_none() {
        return Err(CodecError::InvalidOption(format!(
            "resize target {width}x{height} exceeds {MAX_DECODED_SAMPLES} samples"
        )));
    }

    let samples = match buf.channels {
        1 => resize_as::<Luma<u8>>(buf, width, height, kernel)?,
        2 => resize_as::<LumaA<u8>>(buf, width, height, kernel)?,
        3 => resize_as::<Rgb<u8>>(buf, width, height, kernel)?,
        _ => resize_as::<Rgba<u8>>(buf, width, height, kernel)?,
    };
    log::trace!(
        "resized {}x{} -> {width}x{height} ({kernel})",
        buf.width,
        buf.height
    );
    PixelBuffer::new(width, height, buf.channels, samples)
}

fn resize_as<P>(buf: &PixelBuffer, width: usize, height: usize, kernel: Resample) -> Result<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let dim = |n: usize| {
        u32::try_from(n).map_err(|_| CodecError::InvalidImage(format!("dimension {n} too large")))
    };
    let src: ImageBuffer<P, Vec<u8>> =
        ImageBuffer::from_raw(dim(buf.width)?, dim(buf.height)?, buf.samples.clone()).ok_or_else(
            || CodecError::InvalidImage("sample buffer does not match dimensions".to_string()),
        )?;
    Ok(imageops::resize(&src, dim(width)?, dim(height)?, kernel.filter()).into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_names() {
        for kernel in Resample::ALL {
            assert_eq!(kernel.name().parse::<Resample>().unwrap(), kernel);
        }
        assert!(matches!(
            "box".parse::<Resample>(),
            Err(CodecError::UnsupportedResample(name)) if name == "box"
        ));
    }

    #[test]
    fn test_fit_longer_side() {
        assert_eq!(fit_longer_side(400, 200, 100), (100, 50));
        assert_eq!(fit_longer_side(200, 400, 100), (50, 100));
        assert_eq!(fit_longer_side(3, 2, 6), (6, 4));
        assert_eq!(fit_longer_side(1000, 1, 10), (10, 1));
    }

    #[test]
    fn test_fit_shorter_side() {
        assert_eq!(fit_shorter_side(640, 480, 64), (85, 64));
        assert_eq!(fit_shorter_side(480, 640, 64), (64, 85));
        assert_eq!(fit_shorter_side(20, 10, 64), (20, 10));
    }

    #[test]
    fn test_fit_huge_targets() {
        assert_eq!(fit_longer_side(4, 2, usize::MAX), (usize::MAX, usize::MAX / 2 + 1));
        assert_eq!(fit_shorter_side(usize::MAX, 8, 4), (usize::MAX / 2 + 1, 4));
    }

    #[test]
    fn test_resize_rejects_oversized_target() {
        let buf = PixelBuffer::filled(2, 2, &[1, 2, 3]).unwrap();
        assert!(matches!(
            resize(&buf, 1 << 20, 1 << 20, Resample::Nearest),
            Err(CodecError::InvalidOption(_))
        ));
        assert!(matches!(
            resize(&buf, usize::MAX, 2, Resample::Nearest),
            Err(CodecError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_resize_every_kernel() {
        let buf = PixelBuffer::new(4, 2, 3, (0..24).map(|v| v * 10).collect()).unwrap();
        for kernel in Resample::ALL {
            let out = resize(&buf, 8, 4, kernel).unwrap();
            assert_eq!((out.width, out.height, out.channels), (8, 4, 3));
            assert_eq!(out.samples.len(), 96);
        }
    }

    #[test]
    fn test_nearest_keeps_colors() {
        let buf = PixelBuffer::new(2, 1, 1, vec![0, 255]).unwrap();
        let out = resize(&buf, 4, 1, Resample::Nearest).unwrap();
        assert_eq!(out.samples.len(), 4);
        assert!(out.samples.iter().all(|&v| v == 0 || v == 255));
        assert_eq!(out.samples[0], 0);
        assert_eq!(out.samples[3], 255);
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let buf = PixelBuffer::filled(3, 3, &[9, 8, 7, 6]).unwrap();
        assert_eq!(resize(&buf, 3, 3, Resample::Lanczos).unwrap(), buf);
    }
}
