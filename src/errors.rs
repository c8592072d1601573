// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame pipeline
//!
//! Errors are grouped by the stage that can recover from them:
//! - [`FrameError`]: per-frame failures, the frame is dropped and capture continues
//! - [`RenderError`]: renderer failures, rendering halts but capture keeps running
//! - [`ConfigError`]: configuration file problems
//!
//! [`AppError`] wraps all of them for the command-line front end.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result alias for per-frame pipeline operations
pub type FrameResult<T> = Result<T, FrameError>;

/// Result alias for GPU rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Failures scoped to a single captured frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The capture source delivered a channel count the pipeline cannot normalize
    #[error("unsupported channel count: {channels} (expected 1, 3 or 4)")]
    UnsupportedChannels { channels: u32 },

    /// Zero-sized or overflowing frame dimensions
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Buffer length does not match `width * height * channels`
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The pool could not reserve memory for a frame buffer
    #[error("failed to allocate {bytes} bytes for frame buffer")]
    Allocation { bytes: usize },
}

impl FrameError {
    /// Whether this error belongs to the capture-format category
    pub fn is_capture_format(&self) -> bool {
        !matches!(self, FrameError::Allocation { .. })
    }
}

/// Failures in the GPU render component
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// A shader source file could not be read
    #[error("failed to load {stage} shader from {path}: {message}")]
    ShaderLoad {
        stage: ShaderStage,
        path: PathBuf,
        message: String,
    },

    /// A shader source failed to compile
    #[error("{stage} shader failed to compile: {message}")]
    ShaderCompile { stage: ShaderStage, message: String },

    /// The vertex and fragment stages could not be linked into a pipeline
    #[error("render program failed to link: {0}")]
    ProgramLink(String),

    /// No usable adapter or device
    #[error("GPU device unavailable: {0}")]
    Device(String),

    /// Texture or buffer storage could not be allocated
    #[error("GPU allocation failed: {0}")]
    Allocation(String),

    /// Reading rendered pixels back to the CPU failed
    #[error("readback failed: {0}")]
    Readback(String),
}

/// Programmable stage a shader source belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Configuration loading and saving errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no configuration directory available on this system")]
    NoConfigDir,
}

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
