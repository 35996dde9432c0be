//! Deterministic palette construction and pixel-to-palette mapping.
//!
//! The palette comes from a median cut over the exact color histogram:
//! boxes of distinct colors are split along their widest channel at the
//! pixel-weighted median until the requested number of boxes exists. When
//! the image already has no more distinct colors than requested, those
//! colors become the palette verbatim, so quantization is lossless.
//!
//! Everything runs on integers and ordered containers, so the same input
//! and bound always produce the same palette and the same indices.

use crate::{CodecError, Color, PixelBuffer, Result, MAX_PALETTE_SIZE};
use std::collections::{BTreeMap, HashMap};

/// Ordered list of distinct colors, each `channels` samples wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    channels: usize,
    colors: Vec<Color>,
}

impl Palette {
    /// Builds a palette, rejecting duplicates. Returns `None` if two
    /// entries are equal.
    pub fn from_distinct(channels: usize, colors: Vec<Color>) -> Option<Self> {
        let mut sorted = colors.clone();
        sorted.sort_unstable();
        sorted.dedup();
        (sorted.len() == colors.len()).then_some(Self { channels, colors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples of entry `index`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.colors.get(index).map(|c| &c[..self.channels])
    }

    #[inline]
    pub(crate) fn color(&self, index: usize) -> Color {
        self.colors[index]
    }

    /// Index of the closest entry by squared distance; ties pick the lowest
    /// index.
    pub(crate) fn nearest(&self, color: &Color) -> usize {
        let mut best = 0;
        let mut best_dist = i32::MAX;
        for (i, entry) in self.colors.iter().enumerate() {
            let dist = distance(entry, color, self.channels);
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best
    }

    /// Lowercase hex form of entry `index`, two digits per channel.
    pub fn hex(&self, index: usize) -> String {
        hex_color(&self.colors[index], self.channels)
    }
}

#[inline]
fn distance(a: &Color, b: &Color, channels: usize) -> i32 {
    a.iter()
        .zip(b)
        .take(channels)
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            d * d
        })
        .sum()
}

pub(crate) fn hex_color(color: &Color, channels: usize) -> String {
    color[..channels].iter().map(|v| format!("{v:02x}")).collect()
}

pub(crate) fn parse_hex_color(text: &str, channels: usize) -> Option<Color> {
    if text.len() != channels * 2 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut color = [0u8; 4];
    for (c, slot) in color.iter_mut().enumerate().take(channels) {
        *slot = u8::from_str_radix(&text[c * 2..c * 2 + 2], 16).ok()?;
    }
    Some(color)
}

/// Rejects palette bounds outside `1..=256`.
pub fn check_palette_size(requested: usize) -> Result<()> {
    if requested == 0 || requested > MAX_PALETTE_SIZE {
        return Err(CodecError::PaletteOverflow {
            requested,
            max: MAX_PALETTE_SIZE,
        });
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct Bin {
    color: Color,
    count: u64,
}

/// Builds a palette of at most `max_colors` entries for `buf`.
pub fn build_palette(buf: &PixelBuffer, max_colors: usize) -> Result<Palette> {
    check_palette_size(max_colors)?;
    buf.validate()?;

    // color -> (pixel count, first raster position)
    let mut histogram: BTreeMap<Color, (u64, usize)> = BTreeMap::new();
    for (pos, color) in buf.colors().enumerate() {
        histogram.entry(color).or_insert((0, pos)).0 += 1;
    }

    let colors = if histogram.len() <= max_colors {
        let mut exact: Vec<(usize, Color)> =
            histogram.iter().map(|(&color, &(_, first))| (first, color)).collect();
        exact.sort_unstable();
        exact.into_iter().map(|(_, color)| color).collect()
    } else {
        let bins: Vec<Bin> = histogram
            .iter()
            .map(|(&color, &(count, _))| Bin { color, count })
            .collect();
        median_cut(bins, max_colors, buf.channels)
    };
    log::trace!(
        "palette: {} distinct colors -> {} entries (bound {max_colors})",
        histogram.len(),
        colors.len()
    );

    let palette = Palette::from_distinct(buf.channels, colors)
        .ok_or_else(|| CodecError::InvalidImage("quantizer produced duplicate colors".into()))?;
    if palette.len() > max_colors {
        return Err(CodecError::PaletteOverflow {
            requested: palette.len(),
            max: max_colors,
        });
    }
    Ok(palette)
}

fn median_cut(bins: Vec<Bin>, max_colors: usize, channels: usize) -> Vec<Color> {
    let mut boxes: Vec<Vec<Bin>> = vec![bins];

    while boxes.len() < max_colors {
        // widest box first, then the most populated, then the oldest
        let mut pick: Option<(usize, usize, u8, u64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.len() < 2 {
                continue;
            }
            let (channel, range) = widest_channel(b, channels);
            let count = b.iter().map(|bin| bin.count).sum::<u64>();
            let better = match pick {
                None => true,
                Some((_, _, best_range, best_count)) => {
                    range > best_range || (range == best_range && count > best_count)
                }
            };
            if better {
                pick = Some((i, channel, range, count));
            }
        }
        let Some((index, channel, _, total)) = pick else {
            break;
        };

        let mut bins = std::mem::take(&mut boxes[index]);
        bins.sort_unstable_by_key(|bin| (bin.color[channel], bin.color));

        let mut acc = 0u64;
        let mut split = bins.len() - 1;
        for (i, bin) in bins.iter().enumerate() {
            acc += bin.count;
            if acc * 2 >= total {
                split = i + 1;
                break;
            }
        }
        let split = split.clamp(1, bins.len() - 1);
        let upper = bins.split_off(split);
        boxes[index] = bins;
        boxes.push(upper);
    }

    let mut colors: Vec<Color> = Vec::with_capacity(boxes.len());
    for b in &boxes {
        let mean = weighted_mean(b, channels);
        if !colors.contains(&mean) {
            colors.push(mean);
        }
    }
    colors
}

fn widest_channel(bins: &[Bin], channels: usize) -> (usize, u8) {
    let mut best = (0, 0u8);
    for c in 0..channels {
        let (lo, hi) = bins.iter().fold((u8::MAX, u8::MIN), |(lo, hi), bin| {
            (lo.min(bin.color[c]), hi.max(bin.color[c]))
        });
        let range = hi - lo;
        if range > best.1 {
            best = (c, range);
        }
    }
    best
}

fn weighted_mean(bins: &[Bin], channels: usize) -> Color {
    let total: u64 = bins.iter().map(|bin| bin.count).sum();
    let mut mean = [0u8; 4];
    if total == 0 {
        return mean;
    }
    for (c, slot) in mean.iter_mut().enumerate().take(channels) {
        let sum: u64 = bins.iter().map(|bin| bin.color[c] as u64 * bin.count).sum();
        *slot = ((sum + total / 2) / total) as u8;
    }
    mean
}

/// Maps every pixel to its nearest palette entry.
pub fn map_nearest(buf: &PixelBuffer, palette: &Palette) -> Vec<u8> {
    let mut cache: HashMap<Color, u8> = HashMap::new();
    buf.colors()
        .map(|color| {
            *cache
                .entry(color)
                .or_insert_with(|| palette.nearest(&color) as u8)
        })
        .collect()
}

/// Maps pixels to palette entries with Floyd–Steinberg error diffusion.
///
/// Pixels are visited in raster order. The residual of each pixel is pushed
/// to the right (7/16), lower-left (3/16), lower (5/16) and lower-right
/// (1/16) neighbours. Accumulators hold sixteenths of a sample so that the
/// whole pass is integer arithmetic.
pub fn map_dithered(buf: &PixelBuffer, palette: &Palette) -> Vec<u8> {
    let (width, height, ch) = (buf.width, buf.height, buf.channels);
    let mut work: Vec<i32> = buf.samples.iter().map(|&s| s as i32 * 16).collect();
    let mut indices = Vec::with_capacity(buf.pixel_count());

    for y in 0..height {
        for x in 0..width {
            let base = (y * width + x) * ch;
            let mut target = [0u8; 4];
            for (c, slot) in target.iter_mut().enumerate().take(ch) {
                *slot = (work[base + c] + 8).div_euclid(16).clamp(0, 255) as u8;
            }
            let index = palette.nearest(&target);
            indices.push(index as u8);

            let chosen = palette.color(index);
            for c in 0..ch {
                let err = work[base + c] - chosen[c] as i32 * 16;
                if err == 0 {
                    continue;
                }
                if x + 1 < width {
                    work[base + ch + c] += err * 7 / 16;
                }
                if y + 1 < height {
                    let below = base + width * ch;
                    if x > 0 {
                        work[below - ch + c] += err * 3 / 16;
                    }
                    work[below + c] += err * 5 / 16;
                    if x + 1 < width {
                        work[below + ch + c] += err / 16;
                    }
                }
            }
        }
    }
    indices
}

/// Rebuilds a raster from palette indices.
pub fn apply_palette(
    width: usize,
    height: usize,
    palette: &Palette,
    indices: &[u8],
) -> Result<PixelBuffer> {
    PixelBuffer::from_colors(
        width,
        height,
        palette.channels(),
        indices.iter().map(|&i| palette.color(i as usize)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> PixelBuffer {
        let mut samples = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                samples.push(((x * 255) / width.max(1)) as u8);
                samples.push(((y * 255) / height.max(1)) as u8);
                samples.push(((x * y) % 256) as u8);
            }
        }
        PixelBuffer::new(width, height, 3, samples).unwrap()
    }

    #[test]
    fn test_palette_size_bounds() {
        let buf = PixelBuffer::filled(2, 2, &[1, 2, 3]).unwrap();
        assert!(matches!(
            build_palette(&buf, 0),
            Err(CodecError::PaletteOverflow { requested: 0, .. })
        ));
        assert!(matches!(
            build_palette(&buf, 257),
            Err(CodecError::PaletteOverflow { requested: 257, .. })
        ));
    }

    #[test]
    fn test_exact_palette_in_first_appearance_order() {
        let buf = PixelBuffer::new(3, 1, 1, vec![200, 10, 200]).unwrap();
        let palette = build_palette(&buf, 4).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.get(0), Some(&[200u8][..]));
        assert_eq!(palette.get(1), Some(&[10u8][..]));
        assert_eq!(map_nearest(&buf, &palette), vec![0, 1, 0]);
    }

    #[test]
    fn test_single_color_bound() {
        let buf = PixelBuffer::new(2, 1, 3, vec![0, 0, 0, 255, 255, 255]).unwrap();
        let palette = build_palette(&buf, 1).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get(0), Some(&[128u8, 128, 128][..]));
    }

    #[test]
    fn test_bound_holds_on_busy_image() {
        let buf = gradient(64, 64);
        for n in [1, 2, 3, 7, 16, 255, 256] {
            let palette = build_palette(&buf, n).unwrap();
            assert!(palette.len() <= n, "{} entries for bound {n}", palette.len());
            assert!(!palette.is_empty());
            let indices = map_dithered(&buf, &palette);
            assert!(indices.iter().all(|&i| (i as usize) < palette.len()));
        }
    }

    #[test]
    fn test_deterministic() {
        let buf = gradient(40, 30);
        let a = build_palette(&buf, 12).unwrap();
        let b = build_palette(&buf, 12).unwrap();
        assert_eq!(a, b);
        assert_eq!(map_dithered(&buf, &a), map_dithered(&buf, &b));
    }

    #[test]
    fn test_dither_is_exact_when_palette_covers_image() {
        let buf = PixelBuffer::new(2, 2, 3, vec![255, 0, 0, 0, 0, 255, 0, 0, 255, 255, 0, 0])
            .unwrap();
        let palette = build_palette(&buf, 2).unwrap();
        assert_eq!(map_dithered(&buf, &palette), map_nearest(&buf, &palette));
        let out = apply_palette(2, 2, &palette, &map_nearest(&buf, &palette)).unwrap();
        assert_eq!(out, buf);
    }

    #[test]
    fn test_dither_spreads_error() {
        // mid gray against a black/white palette alternates instead of
        // collapsing to one entry
        let palette = Palette::from_distinct(1, vec![[0, 0, 0, 0], [255, 0, 0, 0]]).unwrap();
        let buf = PixelBuffer::filled(8, 1, &[128]).unwrap();
        let dithered = map_dithered(&buf, &palette);
        assert!(dithered.contains(&0) && dithered.contains(&1));
        let nearest = map_nearest(&buf, &palette);
        assert!(nearest.iter().all(|&i| i == nearest[0]));
    }

    #[test]
    fn test_duplicate_entries_rejected() {
        assert!(Palette::from_distinct(3, vec![[1, 2, 3, 0], [1, 2, 3, 0]]).is_none());
    }

    #[test]
    fn test_hex_round_trip() {
        let color = [0xab, 0x01, 0xff, 0x00];
        assert_eq!(hex_color(&color, 3), "ab01ff");
        assert_eq!(parse_hex_color("ab01ff", 3), Some(color));
        assert_eq!(parse_hex_color("ab01f", 3), None);
        assert_eq!(parse_hex_color("zz01ff", 3), None);
    }
}
