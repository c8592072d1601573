// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "edgecam")]
#[command(about = "Live camera preview with an edge-detection transform")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture and render pipeline
    Run(RunArgs),

    /// Show the GPU adapter and transform availability
    Probe,

    /// Print the active configuration
    Config,
}

#[derive(Args)]
pub struct RunArgs {
    /// Frame source: "pattern" or the path of an image file
    #[arg(short, long, default_value = "pattern")]
    pub source: String,

    /// Frame width (test pattern only)
    #[arg(long, default_value_t = edgecam::constants::capture::DEFAULT_WIDTH)]
    pub width: u32,

    /// Frame height (test pattern only)
    #[arg(long, default_value_t = edgecam::constants::capture::DEFAULT_HEIGHT)]
    pub height: u32,

    /// Channels per pixel: 1 (gray), 3 (BGR) or 4 (RGBA)
    #[arg(short, long, default_value = "4")]
    pub channels: u32,

    /// Capture frame rate
    #[arg(long, default_value_t = edgecam::constants::capture::DEFAULT_FPS)]
    pub fps: u32,

    /// Stop after this many frames (default: run until Ctrl+C)
    #[arg(short, long)]
    pub frames: Option<u64>,

    /// Lower edge threshold (overrides config)
    #[arg(long)]
    pub lower: Option<i32>,

    /// Upper edge threshold (overrides config)
    #[arg(long)]
    pub upper: Option<i32>,

    /// Blur kernel size (overrides config)
    #[arg(long)]
    pub blur: Option<i32>,

    /// Save the last rendered image (default: ~/Pictures/edgecam/snapshot_TIMESTAMP.png)
    #[arg(long, num_args = 0..=1)]
    pub snapshot: Option<Option<PathBuf>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=edgecam=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cli::run(args),
        Commands::Probe => cli::probe(),
        Commands::Config => cli::show_config(),
    }
}
