//! img2dna - Convert images to and from text manifests
//!
//! A command-line front end for the img2dna codec.

use clap::{Args, Parser, Subcommand};
use img2dna::lossless::{self, LosslessOptions};
use img2dna::nlp::{self, NlpOptions};
use img2dna::{
    decode, encode, parse_manifest, AlgoOptions, Alphabet, EncodeOptions, MappingOrder, Mode,
    PixelBuffer, Resample,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "img2dna")]
#[command(version)]
#[command(about = "Convert images to and from img2dna text manifests", long_about = None)]
struct Cli {
    /// Largest accepted input file in MiB
    #[arg(long, global = true, env = "IMG2DNA_MAX_UPLOAD_MB", default_value = "12")]
    max_input_mb: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an image into a manifest
    Encode {
        /// Input image file (PNG, JPEG, GIF, WebP)
        input: PathBuf,

        /// Output manifest file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Encoding mode
        #[arg(short, long, default_value = "lossless")]
        mode: Mode,

        #[command(flatten)]
        lossless: LosslessArgs,

        #[command(flatten)]
        algo: AlgoArgs,

        #[command(flatten)]
        nlp: NlpArgs,
    },

    /// Decode a manifest to an image
    Decode {
        /// Input manifest file (use - for stdin)
        input: PathBuf,

        /// Output image file (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the header and body statistics of a manifest
    Info {
        /// Input manifest file (use - for stdin)
        input: PathBuf,
    },
}

#[derive(Args)]
#[command(next_help_heading = "Lossless")]
struct LosslessArgs {
    /// Body alphabet (dna, binary)
    #[arg(long, default_value = "dna")]
    alphabet: Alphabet,

    /// Nucleotides for bit pairs 00, 01, 10, 11
    #[arg(long, default_value = "ACGT")]
    mapping: MappingOrder,

    /// Bits per body line (multiple of 8)
    #[arg(long, default_value_t = lossless::DEFAULT_CHUNK_BITS)]
    chunk_bits: usize,
}

#[derive(Args)]
#[command(next_help_heading = "Lossy-Algo")]
struct AlgoArgs {
    /// Keep the input dimensions
    #[arg(long)]
    lock_dims: bool,

    /// Target length of the longer side
    #[arg(long, default_value_t = img2dna::algo::DEFAULT_MAX_SIDE)]
    max_side: usize,

    /// Maximum number of palette colors (1-256)
    #[arg(short, long, default_value_t = img2dna::algo::DEFAULT_PALETTE_SIZE)]
    palette: usize,

    /// Resize kernel (nearest, bilinear, bicubic, lanczos)
    #[arg(long, default_value = "bicubic")]
    resample: Resample,

    /// Floyd-Steinberg dithering
    #[arg(long)]
    dither: bool,
}

#[derive(Args)]
#[command(next_help_heading = "Lossy-NLP")]
struct NlpArgs {
    /// Render at the original dimensions when decoding
    #[arg(long)]
    preserve_dims: bool,

    /// Shorter side of the analysis raster
    #[arg(long, default_value_t = nlp::DEFAULT_TARGET_SHORT_SIDE)]
    target_short_side: usize,

    /// Number of probe colors (1-256)
    #[arg(long, default_value_t = nlp::DEFAULT_PALETTE_PROBE)]
    palette_probe: usize,
}

fn encode_options(
    mode: Mode,
    lossless: LosslessArgs,
    algo: AlgoArgs,
    nlp: NlpArgs,
) -> EncodeOptions {
    match mode {
        Mode::Lossless => EncodeOptions::Lossless(LosslessOptions {
            alphabet: lossless.alphabet,
            mapping: lossless.mapping,
            chunk_bits: lossless.chunk_bits,
        }),
        Mode::LossyAlgo => EncodeOptions::LossyAlgo(AlgoOptions {
            lock_dims: algo.lock_dims,
            max_side: Some(algo.max_side),
            palette_size: algo.palette,
            resample: algo.resample,
            dither: algo.dither,
        }),
        Mode::LossyNlp => EncodeOptions::LossyNlp(NlpOptions {
            preserve_dims: nlp.preserve_dims,
            target_short_side: nlp.target_short_side,
            palette_probe: nlp.palette_probe,
        }),
    }
}

/// Reads a file (or stdin for `-`), refusing anything above `limit` bytes.
fn read_input(path: &Path, limit: u64) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = if path.to_string_lossy() == "-" {
        let mut buf = Vec::new();
        io::stdin().take(limit.saturating_add(1)).read_to_end(&mut buf)?;
        buf
    } else {
        let len = fs::metadata(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?
            .len();
        if len > limit {
            return Err(format!(
                "'{}' is {} bytes, limit is {} bytes",
                path.display(),
                len,
                limit
            )
            .into());
        }
        fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?
    };
    if data.len() as u64 > limit {
        return Err(format!("input exceeds the limit of {limit} bytes").into());
    }
    Ok(data)
}

fn read_manifest(path: &Path, limit: u64) -> Result<String, Box<dyn std::error::Error>> {
    let data = read_input(path, limit)?;
    String::from_utf8(data)
        .map_err(|_| format!("'{}' is not a UTF-8 text manifest", path.display()).into())
}

fn save_image(buf: &PixelBuffer, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let is_png = path
        .extension()
        .map_or(true, |ext| ext.eq_ignore_ascii_case("png"));
    if is_png {
        fs::write(path, buf.to_png_bytes()?)?;
        return Ok(());
    }
    let color = match buf.channels {
        1 => image::ExtendedColorType::L8,
        2 => image::ExtendedColorType::La8,
        3 => image::ExtendedColorType::Rgb8,
        _ => image::ExtendedColorType::Rgba8,
    };
    let width = u32::try_from(buf.width).map_err(|_| format!("width {} too large", buf.width))?;
    let height = u32::try_from(buf.height).map_err(|_| format!("height {} too large", buf.height))?;
    image::save_buffer(path, &buf.samples, width, height, color)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(())
}

fn print_info(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = parse_manifest(text)?;
    println!("mode:      {}", manifest.mode);
    println!("size:      {}x{}", manifest.width, manifest.height);
    println!("channels:  {}", manifest.channels);
    println!("checksum:  {}", manifest.checksum);
    println!(
        "body:      {} bytes, {} lines",
        manifest.body.len(),
        manifest.body.lines().count()
    );

    match manifest.mode {
        Mode::Lossless => {
            let opts = lossless::body_options(&manifest)?;
            let buf = lossless::decode(&manifest)?;
            let stats = lossless::stats(&buf, &opts)?;
            println!("alphabet:  {} ({})", opts.alphabet, opts.mapping);
            println!("payload:   {} bytes, {} bits", stats.size_bytes, stats.total_bits);
            println!("symbols:   {} in {} chunks", stats.total_symbols, stats.num_chunks);
            println!("preview:   {}", stats.preview);
        }
        Mode::LossyAlgo => {
            let buf = img2dna::algo::decode(&manifest)?;
            println!("colors:    {}", buf.distinct_colors());
        }
        Mode::LossyNlp => {
            let (layout, preserve_dims) = nlp::parse_layout(&manifest)?;
            println!("analysis:  {}x{}", layout.width, layout.height);
            println!("preserve:  {preserve_dims}");
            println!("probes:    {}", layout.probes.len());
            println!("regions:   {}", layout.regions.len());
            println!("summary:   {}", layout.summary);
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let limit = cli.max_input_mb.saturating_mul(1024 * 1024);

    match cli.command {
        Commands::Encode {
            input,
            output,
            mode,
            lossless,
            algo,
            nlp,
        } => {
            let bytes = read_input(&input, limit)?;
            let img = PixelBuffer::from_image_bytes(&bytes)
                .map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
            log::info!(
                "Encoding '{}' ({}x{}, {} channels) as {}",
                input.display(),
                img.width,
                img.height,
                img.channels,
                mode
            );

            let opts = encode_options(mode, lossless, algo, nlp);
            let manifest = encode(&img, &opts)?;

            match output {
                Some(path) => {
                    fs::write(&path, &manifest)?;
                    log::info!("Written {} bytes to '{}'", manifest.len(), path.display());
                }
                None => {
                    io::stdout().write_all(manifest.as_bytes())?;
                }
            }
        }

        Commands::Decode { input, output } => {
            let text = read_manifest(&input, limit)?;
            log::info!("Decoding ({} bytes)", text.len());

            let img = decode(&text)?;

            let output_path = output.unwrap_or_else(|| {
                let mut p = input.clone();
                p.set_extension("png");
                p
            });
            save_image(&img, &output_path)?;

            log::info!(
                "Decoded: {}x{} pixels -> '{}'",
                img.width,
                img.height,
                output_path.display()
            );
        }

        Commands::Info { input } => {
            let text = read_manifest(&input, limit)?;
            print_info(&text)?;
        }
    }

    Ok(())
}
