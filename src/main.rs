//! imaker CLI - convert images to training tensors and back.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imaker::{Config, ImageMaker};

/// Convert images into fixed-size training tensors and tensors back into images.
#[derive(Parser, Debug)]
#[command(name = "imaker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory of training inputs.
    #[arg(long, default_value = "learn", value_name = "DIR", global = true)]
    learn_dir: PathBuf,

    /// Directory of training targets, matched to inputs by file name.
    #[arg(long, default_value = "answer", value_name = "DIR", global = true)]
    answer_dir: PathBuf,

    /// Output JPEG path for encoded tensors.
    #[arg(short, long, default_value = "output.jpg", value_name = "FILE", global = true)]
    output: PathBuf,

    /// Image width in pixels.
    #[arg(long, default_value = "64", value_name = "INT", global = true)]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value = "64", value_name = "INT", global = true)]
    height: u32,

    /// Decode directory files in parallel.
    #[arg(long, global = true)]
    parallel: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode one image and print tensor statistics.
    Decode {
        /// Image to decode.
        #[arg(value_name = "IMAGE")]
        input: PathBuf,

        /// Encode the decoded tensor back to the output file.
        #[arg(long)]
        preview: bool,
    },

    /// Pair the learn and answer directories into training patterns.
    Patterns,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("imaker={log_level}").into()),
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
    let config = Config {
        learn_dir: args.learn_dir.clone(),
        answer_dir: args.answer_dir.clone(),
        output_file: args.output.clone(),
        image_width: args.width,
        image_height: args.height,
        parallel: args.parallel,
        ..Config::default()
    };

    let maker = ImageMaker::new(config).context("Invalid configuration")?;

    match &args.command {
        Command::Decode { input, preview } => decode(&maker, input, *preview),
        Command::Patterns => patterns(&maker),
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode(maker: &ImageMaker, input: &Path, preview: bool) -> Result<()> {
    let tensor = maker
        .decode(input)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let min = tensor.iter().copied().fold(f64::INFINITY, f64::min);
    let max = tensor.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = tensor.sum() / tensor.len() as f64;

    println!(
        "{}: {} values {:?}, min {min:.4}, max {max:.4}, mean {mean:.4}",
        input.display(),
        tensor.len(),
        tensor.shape()
    );

    if preview {
        maker
            .encode(&tensor)
            .context("Failed to encode preview")?;
        println!("Preview written to {}", maker.config().output_file.display());
    }

    Ok(())
}

fn patterns(maker: &ImageMaker) -> Result<()> {
    let patterns = maker.make_patterns().context("Failed to build patterns")?;

    for pattern in &patterns {
        println!(
            "{}: input {} values, target {} values",
            pattern.key,
            pattern.input.len(),
            pattern.target.len()
        );
    }

    println!("{} patterns", patterns.len());

    Ok(())
}
