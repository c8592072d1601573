// SPDX-License-Identifier: GPL-3.0-only

//! Edgecam - real-time camera frame pipeline
//!
//! Captured frames are normalized to RGBA, run through an optional native
//! edge-detection transform and drawn as a full-screen textured quad.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources and the capture loop
//! - [`pipelines`]: Buffer pool, transform, handoff slot and coordinator
//! - [`render`]: Frame texture, quad renderer and offscreen target
//! - [`shaders`]: WGSL sources for the quad program
//! - [`gpu`]: Device creation
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let source = TestPatternSource::new(640, 480, 3, 30)?;
//! let mut session = PipelineSession::start(
//!     source,
//!     TransformStage::probe(None),
//!     SessionOptions::default(),
//!     || GpuRenderContext::new(&RenderOptions::default()),
//! );
//! session.settings().set_blur_kernel_size(7);
//! session.stop();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod pipelines;
pub mod render;
pub mod shaders;

// Re-export commonly used types
pub use backends::camera::{CanonicalFrame, CapturedFrame, ChannelLayout, FrameSource};
pub use config::Config;
pub use errors::{AppError, AppResult, FrameError, RenderError};
pub use pipelines::{PipelineSession, SessionOptions, TransformParams, TransformStage};
pub use render::{GpuRenderContext, RenderOptions, RenderTarget};
