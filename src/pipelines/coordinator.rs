// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame pipeline coordination on the capture context
//!
//! Each captured frame walks through
//!
//! ```text
//! CAPTURED → NORMALIZED → TRANSFORMED → (published) → UPLOADED → RENDERED
//! ```
//!
//! The first three steps run synchronously inside [`PipelineCoordinator::on_frame`],
//! which the capture loop calls once per frame. Upload and draw belong to the
//! render context; the coordinator only publishes the result into the
//! [`LatestFrameSlot`]. A failure at any step drops that frame and nothing else.

use crate::backends::camera::CapturedFrame;
use crate::backends::camera::format_converters::normalize;
use crate::errors::FrameError;
use crate::pipelines::handoff::LatestFrameSlot;
use crate::pipelines::metrics::SharedMetrics;
use crate::pipelines::pool::FrameBufferPool;
use crate::pipelines::transform::{TransformInvoker, TransformSettings};
use std::sync::Arc;
use tracing::{trace, warn};

/// Steps a frame passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Captured,
    Normalized,
    Transformed,
    Uploaded,
    Rendered,
}

impl std::fmt::Display for FrameStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrameStage::Captured => "captured",
            FrameStage::Normalized => "normalized",
            FrameStage::Transformed => "transformed",
            FrameStage::Uploaded => "uploaded",
            FrameStage::Rendered => "rendered",
        };
        write!(f, "{}", name)
    }
}

/// What happened to one captured frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Published for the render context
    Delivered {
        passthrough: bool,
        /// An older unconsumed frame was replaced
        superseded: bool,
    },
    /// Abandoned after reaching `last_stage`
    Dropped {
        last_stage: FrameStage,
        error: FrameError,
    },
}

impl FrameOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FrameOutcome::Delivered { .. })
    }
}

/// Drives captured frames through normalization and the transform
///
/// Owned by the capture loop. `on_frame` takes `&mut self`, so frames are
/// processed strictly one at a time.
#[derive(Debug)]
pub struct PipelineCoordinator {
    pool: Arc<FrameBufferPool>,
    invoker: TransformInvoker,
    settings: TransformSettings,
    metrics: SharedMetrics,
    slot: Arc<LatestFrameSlot>,
}

impl PipelineCoordinator {
    pub fn new(
        pool: Arc<FrameBufferPool>,
        invoker: TransformInvoker,
        settings: TransformSettings,
        metrics: SharedMetrics,
        slot: Arc<LatestFrameSlot>,
    ) -> Self {
        Self {
            pool,
            invoker,
            settings,
            metrics,
            slot,
        }
    }

    pub fn invoker(&self) -> &TransformInvoker {
        &self.invoker
    }

    /// Process one captured frame
    ///
    /// Updates the FPS metric, normalizes into a pool buffer, runs the
    /// transform with the parameters current at entry, and publishes the
    /// result. The captured buffer is not retained past this call.
    pub fn on_frame(&mut self, captured: &CapturedFrame<'_>) -> FrameOutcome {
        self.metrics
            .update(|m| m.record_timestamp(captured.timestamp_ms));
        let params = self.settings.snapshot();

        let canonical = match normalize(captured, &self.pool) {
            Ok(frame) => frame,
            Err(error) => return self.drop_frame(FrameStage::Captured, error),
        };

        let output = match self.invoker.invoke(canonical, params) {
            Ok(output) => output,
            Err(error) => return self.drop_frame(FrameStage::Normalized, error),
        };

        let (width, height) = (output.frame.width(), output.frame.height());
        let superseded = self.slot.publish(output.frame);
        self.metrics.update(|m| {
            m.record_delivered(width, height, output.passthrough, output.elapsed)
        });

        trace!(
            timestamp_ms = captured.timestamp_ms,
            passthrough = output.passthrough,
            superseded,
            "Frame published"
        );

        FrameOutcome::Delivered {
            passthrough: output.passthrough,
            superseded,
        }
    }

    fn drop_frame(&self, last_stage: FrameStage, error: FrameError) -> FrameOutcome {
        warn!(
            stage = %last_stage,
            error = %error,
            capture_format = error.is_capture_format(),
            "Dropping frame"
        );
        self.metrics.update(|m| m.record_drop());
        FrameOutcome::Dropped { last_stage, error }
    }
}
