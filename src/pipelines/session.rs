// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline session: the capture and render loops together
//!
//! A session owns two threads. The capture thread pulls frames from a
//! [`FrameSource`] and runs them through the [`PipelineCoordinator`]; the
//! render thread creates its [`RenderTarget`] on startup and ticks it at the
//! render rate. Stopping tears them down in order: capture first, then
//! render (waiting for any in-flight upload), then the handoff slot.

use crate::backends::camera::{FrameSource, LoopAction, LoopController};
use crate::constants::pool::DEFAULT_CAPACITY_PER_SHAPE;
use crate::constants::render::{DEFAULT_RENDER_FPS, frame_interval};
use crate::errors::RenderResult;
use crate::pipelines::coordinator::PipelineCoordinator;
use crate::pipelines::handoff::LatestFrameSlot;
use crate::pipelines::metrics::SharedMetrics;
use crate::pipelines::pool::FrameBufferPool;
use crate::pipelines::transform::{
    TransformInvoker, TransformParams, TransformSettings, TransformStage,
};
use crate::render::{RenderState, RenderStatus, RenderTarget};
use std::sync::Arc;
use tracing::{error, info};

/// Startup settings for a [`PipelineSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub render_fps: u32,
    pub pool_capacity_per_shape: usize,
    pub params: TransformParams,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            render_fps: DEFAULT_RENDER_FPS,
            pool_capacity_per_shape: DEFAULT_CAPACITY_PER_SHAPE,
            params: TransformParams::default(),
        }
    }
}

/// Running capture and render loops
pub struct PipelineSession {
    capture: LoopController,
    render: LoopController,
    settings: TransformSettings,
    metrics: SharedMetrics,
    status: RenderStatus,
    pool: Arc<FrameBufferPool>,
    slot: Arc<LatestFrameSlot>,
    stopped: bool,
}

impl PipelineSession {
    /// Start both loops
    ///
    /// `make_target` runs on the render thread, so the target it returns
    /// never has to cross threads. If it fails, the render status becomes
    /// `Failed` and capture keeps running without a consumer.
    pub fn start<S, R, F>(
        mut source: S,
        stage: TransformStage,
        options: SessionOptions,
        make_target: F,
    ) -> Self
    where
        S: FrameSource + Send + 'static,
        R: RenderTarget + 'static,
        F: FnOnce() -> RenderResult<R> + Send + 'static,
    {
        let pool = Arc::new(FrameBufferPool::new(options.pool_capacity_per_shape));
        let slot = Arc::new(LatestFrameSlot::new(Arc::clone(&pool)));
        let settings = TransformSettings::new(options.params);
        let metrics = SharedMetrics::new();
        let status = RenderStatus::new();

        info!(
            source = source.name(),
            transform = ?stage,
            render_fps = options.render_fps,
            "Starting pipeline session"
        );

        let init_status = status.clone();
        let tick_status = status.clone();
        let render_slot = Arc::clone(&slot);
        let render = LoopController::start_paced(
            "edgecam-render",
            frame_interval(options.render_fps),
            move || match make_target() {
                Ok(target) => {
                    init_status.set(RenderState::Running);
                    Ok(target)
                }
                Err(e) => {
                    error!(error = %e, "Render context failed to start");
                    let message = e.to_string();
                    init_status.set(RenderState::Failed(e));
                    Err(message)
                }
            },
            move |target: &mut R| match target.tick(&render_slot) {
                Ok(()) => LoopAction::Continue,
                Err(e) => {
                    error!(error = %e, "Rendering halted");
                    tick_status.set(RenderState::Failed(e));
                    LoopAction::Stop
                }
            },
        );

        let mut coordinator = PipelineCoordinator::new(
            Arc::clone(&pool),
            TransformInvoker::new(stage, Arc::clone(&pool)),
            settings.clone(),
            metrics.clone(),
            Arc::clone(&slot),
        );
        let capture = LoopController::start("edgecam-capture", move || {
            match source.next_frame() {
                Some(frame) => {
                    coordinator.on_frame(&frame);
                    LoopAction::Continue
                }
                None => {
                    info!(
                        invocations = coordinator.invoker().invocations(),
                        "Capture source exhausted"
                    );
                    LoopAction::Stop
                }
            }
        });

        Self {
            capture,
            render,
            settings,
            metrics,
            status,
            pool,
            slot,
            stopped: false,
        }
    }

    /// Handle for changing transform parameters while running
    pub fn settings(&self) -> &TransformSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn render_status(&self) -> &RenderStatus {
        &self.status
    }

    pub fn pool(&self) -> &Arc<FrameBufferPool> {
        &self.pool
    }

    pub fn slot(&self) -> &Arc<LatestFrameSlot> {
        &self.slot
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }

    pub fn is_rendering(&self) -> bool {
        self.render.is_running()
    }

    /// Block until the source runs out of frames
    pub fn wait_for_capture(&mut self) {
        self.capture.join();
    }

    /// Stop both loops and release pipeline buffers
    ///
    /// Returns only after the render thread has finished its current tick
    /// and dropped its target.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.capture.stop();
        self.render.stop();
        self.status.finish();
        self.slot.drain();

        let stats = self.pool.stats();
        info!(
            published = self.slot.published(),
            superseded = self.slot.superseded(),
            allocations = stats.allocations,
            reuses = stats.reuses,
            "Pipeline session stopped"
        );
        self.pool.clear();
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::TestPatternSource;
    use crate::errors::RenderError;

    struct CountingTarget {
        ticks: Arc<std::sync::atomic::AtomicU64>,
    }

    impl RenderTarget for CountingTarget {
        fn tick(&mut self, slot: &LatestFrameSlot) -> RenderResult<()> {
            if let Some(frame) = slot.take() {
                slot.recycle(frame);
            }
            self.ticks
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn pattern(frames: u64) -> TestPatternSource {
        TestPatternSource::new(16, 8, 3, 30)
            .unwrap()
            .unpaced()
            .with_frame_limit(Some(frames))
    }

    #[test]
    fn test_session_runs_to_completion() {
        let ticks = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let target_ticks = Arc::clone(&ticks);
        let mut session = PipelineSession::start(
            pattern(10),
            TransformStage::Unavailable,
            SessionOptions::default(),
            move || Ok(CountingTarget { ticks: target_ticks }),
        );

        session.wait_for_capture();
        assert!(!session.is_capturing());
        let snapshot = session.metrics().snapshot();
        assert_eq!(snapshot.frame_count, 10);
        assert_eq!(snapshot.passthrough_count, 10);
        assert_eq!(snapshot.resolution.as_deref(), Some("16x8"));

        session.stop();
        assert!(matches!(session.render_status().get(), RenderState::Stopped));
        assert!(!session.slot().is_pending());
    }

    #[test]
    fn test_render_init_failure_keeps_capture() {
        let mut session = PipelineSession::start(
            pattern(5),
            TransformStage::Unavailable,
            SessionOptions::default(),
            || -> RenderResult<CountingTarget> { Err(RenderError::Device("no adapter".into())) },
        );

        session.wait_for_capture();
        assert_eq!(session.metrics().snapshot().frame_count, 5);
        // Nothing consumes the slot, so every frame but the last is superseded
        assert_eq!(session.slot().superseded(), 4);

        session.stop();
        assert!(session.render_status().is_failed());
    }
}
