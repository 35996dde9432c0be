//! Conversions between image files and [`PixelBuffer`].

use crate::{CodecError, PixelBuffer, Result};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

impl PixelBuffer {
    /// Decodes PNG or JPEG file bytes.
    ///
    /// 8-bit gray, gray+alpha, RGB and RGBA keep their channel count. Deeper
    /// or float formats are reduced to 8 bits with the closest layout.
    pub fn from_image_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| CodecError::InvalidImage(e.to_string()))?;
        Self::from_dynamic(img)
    }

    /// Converts a decoded [`DynamicImage`].
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let (channels, samples) = match img {
            DynamicImage::ImageLuma8(b) => (1, b.into_raw()),
            DynamicImage::ImageLumaA8(b) => (2, b.into_raw()),
            DynamicImage::ImageRgb8(b) => (3, b.into_raw()),
            DynamicImage::ImageRgba8(b) => (4, b.into_raw()),
            DynamicImage::ImageLuma16(_) => (1, img.to_luma8().into_raw()),
            DynamicImage::ImageLumaA16(_) => (2, img.to_luma_alpha8().into_raw()),
            DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => {
                (3, img.to_rgb8().into_raw())
            }
            other => (4, other.to_rgba8().into_raw()),
        };
        PixelBuffer::new(width, height, channels, samples)
    }

    /// Writes the buffer as PNG file bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        if self.is_empty() {
            return Err(CodecError::InvalidImage(
                "cannot write an empty image".to_string(),
            ));
        }
        let color = match self.channels {
            1 => ExtendedColorType::L8,
            2 => ExtendedColorType::La8,
            3 => ExtendedColorType::Rgb8,
            _ => ExtendedColorType::Rgba8,
        };
        let dim = |n: usize| {
            u32::try_from(n)
                .map_err(|_| CodecError::InvalidImage(format!("dimension {n} too large")))
        };
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&self.samples, dim(self.width)?, dim(self.height)?, color)
            .map_err(|e| CodecError::InvalidImage(e.to_string()))?;
        Ok(out)
    }
}
