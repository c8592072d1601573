// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the frame pipeline
//!
//! This module provides command-line functionality for:
//! - Running the pipeline from a test pattern or an image file
//! - Probing the GPU and transform availability
//! - Printing the configuration

use crate::RunArgs;
use chrono::Local;
use edgecam::backends::camera::{ChannelLayout, FrameSource, ImageSource, TestPatternSource};
use edgecam::config::Config;
use edgecam::errors::FrameError;
use edgecam::gpu::create_render_device;
use edgecam::pipelines::{PipelineSession, SessionOptions, TransformParams, TransformStage};
use edgecam::render::{GpuRenderContext, RenderOptions, RenderState, SnapshotSlot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

/// Run the pipeline until the source is exhausted or Ctrl+C is pressed
pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();

    let defaults = config.transform_params();
    let params = TransformParams::new(
        args.lower.unwrap_or(defaults.lower_threshold),
        args.upper.unwrap_or(defaults.upper_threshold),
        args.blur.unwrap_or(defaults.blur_kernel_size),
    )
    .sanitized();

    let source = open_source(&args)?;
    println!("Source: {}", source.name());

    let snapshot = args.snapshot.as_ref().map(|_| SnapshotSlot::new());
    let render_options = RenderOptions {
        surface_width: config.surface_width,
        surface_height: config.surface_height,
        mirror: config.mirror_preview,
        shader_dir: config.shader_dir.clone(),
        snapshot: snapshot.clone(),
    };

    let stage = TransformStage::probe(None);
    println!(
        "Transform: {}",
        if stage.is_available() {
            "native"
        } else {
            "passthrough"
        }
    );
    println!(
        "Parameters: lower={} upper={} blur={}",
        params.lower_threshold, params.upper_threshold, params.blur_kernel_size
    );

    let options = SessionOptions {
        render_fps: config.render_fps(),
        pool_capacity_per_shape: config.pool_capacity_per_shape,
        params,
    };
    let mut session = PipelineSession::start(source, stage, options, move || {
        GpuRenderContext::new(&render_options)
    });

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Running... (press Ctrl+C to stop)");
    while session.is_capturing() {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        let metrics = session.metrics().snapshot();
        print!(
            "\r{}  frames: {}  dropped: {}",
            session.metrics().fps_label(),
            metrics.frame_count,
            metrics.drop_count
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    session.stop();

    if let RenderState::Failed(e) = session.render_status().get() {
        eprintln!("Rendering failed: {}", e);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&session.metrics().snapshot())?
    );

    if let (Some(slot), Some(requested)) = (snapshot, args.snapshot) {
        match slot.take() {
            Some(image) => {
                let path = snapshot_path(requested)?;
                image.save(&path)?;
                println!("Snapshot saved: {}", path.display());
            }
            None => eprintln!("No snapshot available"),
        }
    }

    Ok(())
}

/// Print the GPU adapter and transform availability
pub fn probe() -> Result<(), Box<dyn std::error::Error>> {
    match pollster::block_on(create_render_device("edgecam_probe")) {
        Ok((_device, _queue, info)) => println!("GPU: {}", info),
        Err(e) => println!("GPU: unavailable ({})", e),
    }

    let stage = TransformStage::probe(None);
    println!(
        "Transform: {}",
        if stage.is_available() {
            "available"
        } else {
            "unavailable (frames pass through unchanged)"
        }
    );
    Ok(())
}

/// Print the config file location and its effective contents
pub fn show_config() -> Result<(), Box<dyn std::error::Error>> {
    match Config::default_path() {
        Ok(path) => println!("# {}", path.display()),
        Err(e) => println!("# {}", e),
    }
    println!("{}", serde_json::to_string_pretty(&load_config())?);
    Ok(())
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    })
}

fn open_source(
    args: &RunArgs,
) -> Result<Box<dyn FrameSource + Send>, Box<dyn std::error::Error>> {
    if args.source == "pattern" {
        let source = TestPatternSource::new(args.width, args.height, args.channels, args.fps)?
            .with_frame_limit(args.frames);
        return Ok(Box::new(source));
    }

    let layout =
        ChannelLayout::from_channels(args.channels).ok_or(FrameError::UnsupportedChannels {
            channels: args.channels,
        })?;
    let source =
        ImageSource::open(Path::new(&args.source), layout, args.fps)?.with_frame_limit(args.frames);
    Ok(Box::new(source))
}

fn snapshot_path(requested: Option<PathBuf>) -> std::io::Result<PathBuf> {
    if let Some(path) = requested {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        return Ok(path);
    }

    let dir = dirs::picture_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("edgecam");
    std::fs::create_dir_all(&dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("snapshot_{}.png", timestamp)))
}
