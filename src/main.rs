//! `restyle` CLI - apply a neural style to a photo.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use image::Rgb;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use restyle::image::{ResampleFilter, DEFAULT_TARGET_SIZE};
use restyle::model::StyleModel;
use restyle::pipeline::parse_pad_color;
use restyle::{Config, Pipeline};

/// Apply a neural style-transfer model to an image and blend it with the original.
#[derive(Parser, Debug)]
#[command(name = "restyle")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image path.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output image path. PNG unless the extension is .jpg/.jpeg.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Style to apply: picasso, van-gogh, georges-seurat, cyberpunk.
    #[arg(long, default_value = "van-gogh", value_name = "NAME")]
    style: StyleModel,

    /// Use this ONNX model file instead of a named style.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Directory holding the style models. Defaults to the user cache directory.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Base URL to download missing style models from.
    #[arg(long, value_name = "URL")]
    model_url: Option<String>,

    /// Style strength (0.0-1.0). 0 keeps the original, 1 is fully stylized.
    #[arg(short, long, default_value = "1.0", value_name = "FLOAT")]
    strength: f32,

    /// Side of the square the model runs on.
    #[arg(long, default_value_t = DEFAULT_TARGET_SIZE, value_name = "INT")]
    target_size: u32,

    /// Letterbox padding color (#rgb or #rrggbb).
    #[arg(long, default_value = "#000", value_parser = parse_pad_color, value_name = "HEX")]
    pad_color: Rgb<u8>,

    /// Resampling filter: nearest, bilinear, bicubic, lanczos3.
    #[arg(long, default_value = "bicubic", value_name = "NAME")]
    filter: ResampleFilter,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Also save the fully stylized image here.
    #[arg(long, value_name = "PATH")]
    stylized: Option<PathBuf>,

    /// JPEG quality (1-100) for the stylized-only image.
    #[arg(long, default_value = "90", value_name = "INT")]
    stylized_quality: u8,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("restyle={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let config = Config {
        style: args.style,
        model_path: args.model.clone(),
        model_dir: args.model_dir.clone(),
        model_base_url: args.model_url.clone(),
        target_size: args.target_size,
        pad_color: args.pad_color,
        strength: args.strength,
        filter: args.filter,
        intermediate_quality: args.stylized_quality,
        output_quality: args.quality,
    };

    let pipeline = Pipeline::new(config).context("Failed to initialize pipeline")?;

    let styled = pipeline
        .process(&args.input, &args.output)
        .context("Failed to process image")?;

    if let Some(path) = &args.stylized {
        pipeline
            .save_stylized(&styled, path)
            .with_context(|| format!("Failed to save stylized image to {}", path.display()))?;
    }

    println!(
        "Successfully processed {} -> {}",
        args.input.display(),
        args.output.display()
    );

    Ok(())
}
