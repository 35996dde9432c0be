//! Descriptive mode: a handful of probe colors and the rectangles they cover.
//!
//! The analysis raster is the input shrunk so its shorter side is at most
//! `target_short_side`. Its pixels are labelled with the nearest of at most
//! `palette_probe` probe colors, and 4-connected components of equal labels
//! become regions. The first region is always the whole canvas painted with
//! the dominant probe; later regions are painted over it in discovery order.
//!
//! ```text
//! analysis=64x48
//! preserve_dims=false
//! summary=mostly navy (62%), also white (21%), orange (9%); 4 regions
//! probes=3
//! probe 0 #1a1f6b navy
//! probe 1 #f2f2f2 white
//! probe 2 #e8911c orange
//! regions=4
//! region 0 at 0,0 size 64x48
//! region 1 at 3,2 size 20x11
//! ...
//! ```
//!
//! Decoding paints the rectangles; the result is a proxy of the source, not
//! a reconstruction.

use crate::codec::Encoded;
use crate::manifest::{parse_size, BodyReader, Manifest};
use crate::quantize::{build_palette, check_palette_size, map_nearest, parse_hex_color, Palette};
use crate::resample::{fit_shorter_side, resize, Resample};
use crate::{
    decoded_len, CodecError, Color, PixelBuffer, Result, MAX_CHANNELS, MAX_DECODED_SAMPLES,
    MAX_PALETTE_SIZE,
};

pub const DEFAULT_TARGET_SHORT_SIDE: usize = 64;
pub const DEFAULT_PALETTE_PROBE: usize = 8;

/// Upper bound on regions per description, background included.
pub const MAX_REGIONS: usize = 64;

/// Components smaller than `1/MIN_AREA_DIVISOR` of the raster are dropped.
const MIN_AREA_DIVISOR: usize = 64;

/// Options for the descriptive encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NlpOptions {
    /// Render at the original dimensions instead of the analysis size.
    pub preserve_dims: bool,
    /// Shorter side of the analysis raster (inputs are never upscaled).
    pub target_short_side: usize,
    /// Upper bound on distinct probe colors (1-256).
    pub palette_probe: usize,
}

impl Default for NlpOptions {
    fn default() -> Self {
        Self {
            preserve_dims: false,
            target_short_side: DEFAULT_TARGET_SHORT_SIDE,
            palette_probe: DEFAULT_PALETTE_PROBE,
        }
    }
}

impl NlpOptions {
    fn validate(&self) -> Result<()> {
        check_palette_size(self.palette_probe)?;
        if self.target_short_side == 0 {
            return Err(CodecError::InvalidOption(
                "target_short_side must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A rectangle painted with one probe color, in analysis coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub probe: usize,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Probe colors plus the ordered regions that use them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub height: usize,
    pub probes: Palette,
    pub regions: Vec<Region>,
    pub summary: String,
}

impl Layout {
    /// True if the region uses a known probe and lies inside the raster.
    pub fn contains(&self, r: &Region) -> bool {
        let fits = |start: usize, len: usize, limit: usize| {
            len > 0 && start.checked_add(len).is_some_and(|end| end <= limit)
        };
        r.probe < self.probes.len()
            && fits(r.x, r.width, self.width)
            && fits(r.y, r.height, self.height)
    }
}

/// Segments `buf` into a layout description.
pub fn analyze(buf: &PixelBuffer, opts: &NlpOptions) -> Result<Layout> {
    opts.validate()?;
    buf.validate()?;
    if buf.is_empty() {
        return Err(CodecError::InvalidImage(format!(
            "cannot describe an empty {}x{} image",
            buf.width, buf.height
        )));
    }

    let (width, height) = fit_shorter_side(buf.width, buf.height, opts.target_short_side);
    let analysis = resize(buf, width, height, Resample::Bilinear)?;
    let probes = build_palette(&analysis, opts.palette_probe)?;
    let labels = map_nearest(&analysis, &probes);

    let mut coverage = vec![0usize; probes.len()];
    for &label in &labels {
        coverage[label as usize] += 1;
    }
    let regions = segment(&labels, width, height, &coverage);
    let summary = summarize(&probes, &coverage, regions.len());
    log::trace!(
        "lossy-nlp: analysis {width}x{height}, {} probes, {} regions",
        probes.len(),
        regions.len()
    );

    Ok(Layout {
        width,
        height,
        probes,
        regions,
        summary,
    })
}

struct Component {
    region: Region,
    area: usize,
    order: usize,
}

/// Turns a label raster into the background plus its largest components.
fn segment(labels: &[u8], width: usize, height: usize, coverage: &[usize]) -> Vec<Region> {
    let background = coverage
        .iter()
        .enumerate()
        .fold((0, 0), |best, (probe, &count)| {
            if count > best.1 {
                (probe, count)
            } else {
                best
            }
        })
        .0;

    let min_area = (width * height / MIN_AREA_DIVISOR).max(1);
    let mut visited = vec![false; labels.len()];
    let mut components = Vec::new();
    let mut stack = Vec::new();

    for start in 0..labels.len() {
        if visited[start] {
            continue;
        }
        let label = labels[start];
        visited[start] = true;
        stack.push(start);

        let (mut x0, mut y0) = (usize::MAX, usize::MAX);
        let (mut x1, mut y1) = (0, 0);
        let mut area = 0;
        while let Some(pos) = stack.pop() {
            let (x, y) = (pos % width, pos / width);
            area += 1;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);

            let mut visit = |next: usize| {
                if !visited[next] && labels[next] == label {
                    visited[next] = true;
                    stack.push(next);
                }
            };
            if x > 0 {
                visit(pos - 1);
            }
            if x + 1 < width {
                visit(pos + 1);
            }
            if y > 0 {
                visit(pos - width);
            }
            if y + 1 < height {
                visit(pos + width);
            }
        }

        if area >= min_area {
            components.push(Component {
                region: Region {
                    probe: label as usize,
                    x: x0,
                    y: y0,
                    width: x1 - x0 + 1,
                    height: y1 - y0 + 1,
                },
                area,
                order: components.len(),
            });
        }
    }

    if components.len() >= MAX_REGIONS {
        components.sort_by_key(|c| (std::cmp::Reverse(c.area), c.order));
        components.truncate(MAX_REGIONS - 1);
        components.sort_by_key(|c| c.order);
    }

    let mut regions = Vec::with_capacity(components.len() + 1);
    regions.push(Region {
        probe: background,
        x: 0,
        y: 0,
        width,
        height,
    });
    regions.extend(components.into_iter().map(|c| c.region));
    regions
}

const COLOR_NAMES: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("gray", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("red", [255, 0, 0]),
    ("maroon", [128, 0, 0]),
    ("brown", [150, 75, 0]),
    ("orange", [255, 165, 0]),
    ("yellow", [255, 255, 0]),
    ("olive", [128, 128, 0]),
    ("lime", [0, 255, 0]),
    ("green", [0, 128, 0]),
    ("teal", [0, 128, 128]),
    ("cyan", [0, 255, 255]),
    ("blue", [0, 0, 255]),
    ("navy", [0, 0, 128]),
    ("purple", [128, 0, 128]),
    ("magenta", [255, 0, 255]),
    ("pink", [255, 192, 203]),
];

/// Plain-English name of the closest basic color.
pub fn color_name(color: &[u8]) -> &'static str {
    let (rgb, alpha) = match *color {
        [g] => ([g, g, g], 255),
        [g, a] => ([g, g, g], a),
        [r, g, b] => ([r, g, b], 255),
        [r, g, b, a, ..] => ([r, g, b], a),
        [] => return "black",
    };
    if alpha < 128 {
        return "transparent";
    }
    COLOR_NAMES
        .iter()
        .min_by_key(|(_, named)| {
            named
                .iter()
                .zip(rgb)
                .map(|(&n, c)| (n as i32 - c as i32).pow(2))
                .sum::<i32>()
        })
        .map(|(name, _)| *name)
        .unwrap_or("black")
}

fn summarize(probes: &Palette, coverage: &[usize], region_count: usize) -> String {
    let total: usize = coverage.iter().sum::<usize>().max(1);
    let percent = |count: usize| (count * 100 + total / 2) / total;

    let mut ranked: Vec<(usize, usize)> = coverage.iter().copied().enumerate().collect();
    ranked.retain(|&(_, count)| count > 0);
    ranked.sort_by_key(|&(probe, count)| (std::cmp::Reverse(count), probe));

    let name = |probe: usize| probes.get(probe).map(color_name).unwrap_or("black");
    let mut summary = String::new();
    if let Some(&(probe, count)) = ranked.first() {
        summary.push_str(&format!("mostly {} ({}%)", name(probe), percent(count)));
    }
    let others: Vec<String> = ranked
        .iter()
        .skip(1)
        .take(3)
        .map(|&(probe, count)| format!("{} ({}%)", name(probe), percent(count)))
        .collect();
    if !others.is_empty() {
        summary.push_str(", also ");
        summary.push_str(&others.join(", "));
    }
    let noun = if region_count == 1 { "region" } else { "regions" };
    summary.push_str(&format!("; {region_count} {noun}"));
    summary
}

/// Analyzes `buf` and renders the description body.
pub fn encode(buf: &PixelBuffer, opts: &NlpOptions) -> Result<Encoded> {
    let layout = analyze(buf, opts)?;

    let mut body = String::new();
    body.push_str(&format!("analysis={}x{}\n", layout.width, layout.height));
    body.push_str(&format!("preserve_dims={}\n", opts.preserve_dims));
    body.push_str(&format!("summary={}\n", layout.summary));
    body.push_str(&format!("probes={}\n", layout.probes.len()));
    for i in 0..layout.probes.len() {
        let name = layout.probes.get(i).map(color_name).unwrap_or("black");
        body.push_str(&format!("probe {i} #{} {name}\n", layout.probes.hex(i)));
    }
    body.push_str(&format!("regions={}\n", layout.regions.len()));
    for r in &layout.regions {
        body.push_str(&format!(
            "region {} at {},{} size {}x{}\n",
            r.probe, r.x, r.y, r.width, r.height
        ));
    }

    Ok(Encoded {
        width: buf.width,
        height: buf.height,
        channels: buf.channels,
        body,
    })
}

/// Parses a description body back into a layout and the `preserve_dims` flag.
pub fn parse_layout(manifest: &Manifest) -> Result<(Layout, bool)> {
    let mut reader = BodyReader::new(&manifest.body);
    let (width, height) = reader.size_field("analysis")?;
    if width == 0 || height == 0 || decoded_len(width, height, MAX_CHANNELS).is_none() {
        return Err(reader.error(format!("unusable analysis size {width}x{height}")));
    }
    let preserve_dims: bool = reader.parse_field("preserve_dims")?;
    let summary = reader.field("summary")?.to_string();

    let probe_count: usize = reader.parse_field("probes")?;
    if probe_count > MAX_PALETTE_SIZE {
        return Err(CodecError::PaletteOverflow {
            requested: probe_count,
            max: MAX_PALETTE_SIZE,
        });
    }
    let mut colors: Vec<Color> = Vec::with_capacity(probe_count);
    for i in 0..probe_count {
        let line = reader.line("probe")?;
        let color = match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["probe", index, hex, _name] if index.parse::<usize>().ok() == Some(i) => hex
                .strip_prefix('#')
                .and_then(|hex| parse_hex_color(hex, manifest.channels)),
            _ => None,
        };
        colors.push(color.ok_or_else(|| reader.error(format!("malformed probe {line:?}")))?);
    }
    let probes = Palette::from_distinct(manifest.channels, colors)
        .ok_or_else(|| reader.error("duplicate probe color".to_string()))?;

    let mut layout = Layout {
        width,
        height,
        probes,
        regions: Vec::new(),
        summary,
    };
    let region_count: usize = reader.parse_field("regions")?;
    for _ in 0..region_count {
        let line = reader.line("region")?;
        let region = parse_region(line)
            .filter(|r| layout.contains(r))
            .ok_or_else(|| reader.error(format!("invalid region {line:?}")))?;
        layout.regions.push(region);
    }
    if let Some(extra) = reader.remaining().find(|line| !line.is_empty()) {
        return Err(CodecError::ManifestParse(format!(
            "unexpected line after regions: {extra:?}"
        )));
    }
    Ok((layout, preserve_dims))
}

fn parse_region(line: &str) -> Option<Region> {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["region", probe, "at", origin, "size", extent] => {
            let (x, y) = origin.split_once(',')?;
            let (width, height) = parse_size(extent)?;
            Some(Region {
                probe: probe.parse().ok()?,
                x: x.parse().ok()?,
                y: y.parse().ok()?,
                width,
                height,
            })
        }
        _ => None,
    }
}

/// Paints the layout onto a `width` x `height` canvas, scaling geometry from
/// the analysis size. Every region covers at least one pixel.
pub fn render(layout: &Layout, width: usize, height: usize) -> Result<PixelBuffer> {
    if layout.width == 0 || layout.height == 0 {
        return Err(CodecError::InvalidImage("layout has no analysis raster".into()));
    }
    if let Some(bad) = layout.regions.iter().find(|r| !layout.contains(r)) {
        return Err(CodecError::InvalidImage(format!("region {bad:?} outside layout")));
    }
    let channels = layout.probes.channels();
    let len = decoded_len(width, height, channels).ok_or_else(|| {
        CodecError::InvalidImage(format!(
            "{width}x{height}x{channels} canvas exceeds {MAX_DECODED_SAMPLES} samples"
        ))
    })?;
    let mut samples = vec![0u8; len];
    if width > 0 && height > 0 {
        for r in &layout.regions {
            let color = layout.probes.color(r.probe);
            let x0 = scale_floor(r.x, width, layout.width);
            let y0 = scale_floor(r.y, height, layout.height);
            let x1 = scale_floor(r.x + r.width, width, layout.width).clamp(x0 + 1, width);
            let y1 = scale_floor(r.y + r.height, height, layout.height).clamp(y0 + 1, height);
            for y in y0..y1 {
                let row = (y * width + x0) * channels;
                for px in samples[row..row + (x1 - x0) * channels].chunks_exact_mut(channels) {
                    px.copy_from_slice(&color[..channels]);
                }
            }
        }
    }
    PixelBuffer::new(width, height, channels, samples)
}

/// `value * to / from`, rounded down; `value <= from` keeps it within `to`.
fn scale_floor(value: usize, to: usize, from: usize) -> usize {
    (value as u128 * to as u128 / from as u128) as usize
}

/// Proxy render of a verified manifest.
pub fn decode(manifest: &Manifest) -> Result<PixelBuffer> {
    let (layout, preserve_dims) = parse_layout(manifest)?;
    let (width, height) = if preserve_dims {
        manifest.sample_count()?;
        (manifest.width, manifest.height)
    } else {
        (layout.width, layout.height)
    };
    render(&layout, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Mode;

    /// Left half red, right half blue, with a green square in the middle.
    fn scene() -> PixelBuffer {
        let mut samples = Vec::new();
        for y in 0..16 {
            for x in 0..32 {
                let px = if (12..20).contains(&x) && (4..12).contains(&y) {
                    [0, 140, 0]
                } else if x < 16 {
                    [220, 20, 20]
                } else {
                    [20, 20, 220]
                };
                samples.extend_from_slice(&px);
            }
        }
        PixelBuffer::new(32, 16, 3, samples).unwrap()
    }

    fn wrap(encoded: Encoded) -> Manifest {
        encoded.into_manifest(Mode::LossyNlp)
    }

    #[test]
    fn test_analyze_scene() {
        let layout = analyze(&scene(), &NlpOptions::default()).unwrap();
        assert_eq!((layout.width, layout.height), (32, 16));
        assert_eq!(layout.probes.len(), 3);
        // background + three components
        assert_eq!(layout.regions.len(), 4);
        assert_eq!(
            layout.regions[0],
            Region {
                probe: layout.regions[0].probe,
                x: 0,
                y: 0,
                width: 32,
                height: 16
            }
        );
        let green = layout
            .regions
            .iter()
            .find(|r| layout.probes.get(r.probe) == Some(&[0u8, 140, 0][..]))
            .unwrap();
        assert_eq!((green.x, green.y, green.width, green.height), (12, 4, 8, 8));
    }

    #[test]
    fn test_summary_names_colors() {
        let layout = analyze(&scene(), &NlpOptions::default()).unwrap();
        assert!(layout.summary.starts_with("mostly "), "{}", layout.summary);
        assert!(layout.summary.contains("green"), "{}", layout.summary);
        assert!(layout.summary.ends_with("; 4 regions"), "{}", layout.summary);
    }

    #[test]
    fn test_single_probe_renders_solid_canvas() {
        let opts = NlpOptions {
            palette_probe: 1,
            ..Default::default()
        };
        let out = decode(&wrap(encode(&scene(), &opts).unwrap())).unwrap();
        assert_eq!(out.distinct_colors(), 1);
    }

    #[test]
    fn test_analysis_downscale_and_preserve_dims() {
        let buf = PixelBuffer::filled(200, 100, &[5, 6, 7, 255]).unwrap();
        let opts = NlpOptions {
            target_short_side: 10,
            ..Default::default()
        };
        let proxy = decode(&wrap(encode(&buf, &opts).unwrap())).unwrap();
        assert_eq!((proxy.width, proxy.height, proxy.channels), (20, 10, 4));

        let opts = NlpOptions {
            preserve_dims: true,
            ..opts
        };
        let full = decode(&wrap(encode(&buf, &opts).unwrap())).unwrap();
        assert_eq!(full, buf);
    }

    #[test]
    fn test_probe_bound() {
        let samples: Vec<u8> = (0..48 * 48 * 3).map(|i| (i * 91 % 256) as u8).collect();
        let buf = PixelBuffer::new(48, 48, 3, samples).unwrap();
        for palette_probe in [1, 2, 5] {
            let opts = NlpOptions {
                palette_probe,
                ..Default::default()
            };
            let layout = analyze(&buf, &opts).unwrap();
            assert!(layout.probes.len() <= palette_probe);
            assert!(layout.regions.len() <= MAX_REGIONS);
            let proxy = render(&layout, layout.width, layout.height).unwrap();
            assert!(proxy.distinct_colors() <= palette_probe);
        }
    }

    #[test]
    fn test_empty_image_rejected() {
        let buf = PixelBuffer::new(0, 3, 3, vec![]).unwrap();
        assert!(matches!(
            analyze(&buf, &NlpOptions::default()),
            Err(CodecError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_region_outside_canvas() {
        let body = "analysis=4x4\npreserve_dims=false\nsummary=x\nprobes=1\nprobe 0 #00 black\n\
                    regions=1\nregion 0 at 2,2 size 3x1\n";
        let manifest = Manifest::new(Mode::LossyNlp, 4, 4, 1, body.to_string());
        assert!(matches!(decode(&manifest), Err(CodecError::ManifestParse(_))));
    }

    fn description(analysis: &str, preserve_dims: bool, region: &str) -> String {
        format!(
            "analysis={analysis}\npreserve_dims={preserve_dims}\nsummary=x\nprobes=1\n\
             probe 0 #00 black\nregions=1\n{region}\n"
        )
    }

    #[test]
    fn test_region_coordinates_overflow() {
        for region in [
            "region 0 at 18446744073709551615,0 size 1x1",
            "region 0 at 0,1 size 1x18446744073709551615",
        ] {
            let body = description("4x4", false, region);
            let manifest = Manifest::new(Mode::LossyNlp, 4, 4, 1, body);
            assert!(
                matches!(decode(&manifest), Err(CodecError::ManifestParse(_))),
                "{region}"
            );
        }
    }

    #[test]
    fn test_oversized_analysis_or_canvas() {
        let body = description("4294967295x4294967295", false, "region 0 at 0,0 size 1x1");
        let manifest = Manifest::new(Mode::LossyNlp, 4, 4, 1, body);
        assert!(matches!(decode(&manifest), Err(CodecError::ManifestParse(_))));

        let body = description("4x4", true, "region 0 at 0,0 size 4x4");
        for (width, height) in [(100_000, 100_000), (usize::MAX, 2)] {
            let manifest = Manifest::new(Mode::LossyNlp, width, height, 1, body.clone());
            assert!(matches!(decode(&manifest), Err(CodecError::ManifestParse(_))));
        }
    }

    #[test]
    fn test_render_rejects_oversized_canvas() {
        let probes = Palette::from_distinct(1, vec![[5, 0, 0, 0]]).unwrap();
        let layout = Layout {
            width: 1,
            height: 1,
            probes,
            regions: vec![Region { probe: 0, x: 0, y: 0, width: 1, height: 1 }],
            summary: String::new(),
        };
        assert!(matches!(
            render(&layout, usize::MAX, usize::MAX),
            Err(CodecError::InvalidImage(_))
        ));
        assert_eq!(render(&layout, 3, 2).unwrap().samples, vec![5; 6]);
    }

    #[test]
    fn test_render_scales_regions() {
        let probes = Palette::from_distinct(1, vec![[0, 0, 0, 0], [9, 0, 0, 0]]).unwrap();
        let layout = Layout {
            width: 2,
            height: 2,
            probes,
            regions: vec![
                Region { probe: 0, x: 0, y: 0, width: 2, height: 2 },
                Region { probe: 1, x: 1, y: 1, width: 1, height: 1 },
            ],
            summary: String::new(),
        };
        let out = render(&layout, 4, 4).unwrap();
        assert_eq!(
            out.samples,
            vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9, 9, 0, 0, 9, 9]
        );
    }

    #[test]
    fn test_color_names() {
        assert_eq!(color_name(&[250, 5, 5]), "red");
        assert_eq!(color_name(&[10]), "black");
        assert_eq!(color_name(&[240, 240, 240, 255]), "white");
        assert_eq!(color_name(&[240, 240, 240, 0]), "transparent");
    }
}
