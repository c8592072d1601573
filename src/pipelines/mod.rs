// SPDX-License-Identifier: GPL-3.0-only

//! Frame pipeline from capture to render
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Capture    │ ──▶ │   Coordinator     │ ──▶ │ Latest-frame │ ──▶ │    Render    │
//! │ (1/3/4 ch)   │     │  - normalize RGBA │     │     slot     │     │  - upload    │
//! │              │     │  - transform      │     │  (1 frame)   │     │  - draw quad │
//! └──────────────┘     └───────────────────┘     └──────────────┘     └──────────────┘
//!    capture thread          capture thread                              render thread
//! ```
//!
//! Buffers travel through the stages by move and come back to the
//! [`FrameBufferPool`] once consumed or superseded.
//!
//! # Modules
//!
//! - [`pool`]: Reusable frame buffers keyed by shape
//! - [`transform`]: Native edge transform with passthrough fallback
//! - [`handoff`]: Single-slot latest-value exchange between threads
//! - [`metrics`]: FPS and per-frame counters
//! - [`coordinator`]: Per-frame state machine on the capture thread
//! - [`session`]: Starts and tears down both loops

pub mod coordinator;
pub mod handoff;
pub mod metrics;
pub mod pool;
pub mod session;
pub mod transform;

pub use coordinator::{FrameOutcome, FrameStage, PipelineCoordinator};
pub use handoff::LatestFrameSlot;
pub use metrics::{MetricsSnapshot, PipelineMetrics, SharedMetrics};
pub use pool::{FrameBufferPool, PoolStats};
pub use session::{PipelineSession, SessionOptions};
pub use transform::{
    NativeTransformFn, TransformInvoker, TransformOutput, TransformParams, TransformSettings,
    TransformStage,
};
