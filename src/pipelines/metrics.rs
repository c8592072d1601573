// SPDX-License-Identifier: GPL-3.0-only

//! Throughput and diagnostic counters for a pipeline session
//!
//! Written once per capture callback by the coordinator, read by whatever
//! displays them. Nothing in the pipeline itself depends on these values.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Per-session pipeline metrics
#[derive(Debug, Clone, Default)]
pub struct PipelineMetrics {
    last_frame_timestamp_ms: Option<u64>,
    instantaneous_fps: Option<f64>,
    frame_count: u64,
    drop_count: u64,
    passthrough_count: u64,
    processing_time: Duration,
    resolution: Option<(u32, u32)>,
}

/// Serializable view of [`PipelineMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub fps: Option<f64>,
    pub frame_count: u64,
    pub drop_count: u64,
    pub passthrough_count: u64,
    pub processing_time_ms: f64,
    pub resolution: Option<String>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a capture timestamp and update the instantaneous rate
    ///
    /// `fps = 1000 / (now - last)`. Returns the new rate, or `None` on the
    /// first frame and whenever the timestamp did not advance. A skipped
    /// update keeps the previous rate.
    pub fn record_timestamp(&mut self, timestamp_ms: u64) -> Option<f64> {
        let previous = self.last_frame_timestamp_ms.replace(timestamp_ms);
        let delta = timestamp_ms.checked_sub(previous?)?;
        if delta == 0 {
            return None;
        }
        let fps = 1000.0 / delta as f64;
        self.instantaneous_fps = Some(fps);
        Some(fps)
    }

    /// Record a frame that reached the render handoff
    pub fn record_delivered(
        &mut self,
        width: u32,
        height: u32,
        passthrough: bool,
        elapsed: Duration,
    ) {
        self.frame_count += 1;
        if passthrough {
            self.passthrough_count += 1;
        }
        self.processing_time = elapsed;
        self.resolution = Some((width, height));
    }

    /// Record a frame dropped before reaching the handoff
    pub fn record_drop(&mut self) {
        self.drop_count += 1;
    }

    pub fn instantaneous_fps(&self) -> Option<f64> {
        self.instantaneous_fps
    }

    pub fn last_frame_timestamp_ms(&self) -> Option<u64> {
        self.last_frame_timestamp_ms
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn drop_count(&self) -> u64 {
        self.drop_count
    }

    pub fn passthrough_count(&self) -> u64 {
        self.passthrough_count
    }

    /// On-screen label, e.g. `FPS: 29.9`
    pub fn fps_label(&self) -> String {
        format!("FPS: {:.1}", self.instantaneous_fps.unwrap_or(0.0))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fps: self.instantaneous_fps,
            frame_count: self.frame_count,
            drop_count: self.drop_count,
            passthrough_count: self.passthrough_count,
            processing_time_ms: self.processing_time.as_secs_f64() * 1000.0,
            resolution: self.resolution.map(|(w, h)| format!("{}x{}", w, h)),
        }
    }
}

/// Metrics shared between the capture context and readers
#[derive(Debug, Clone, Default)]
pub struct SharedMetrics(Arc<Mutex<PipelineMetrics>>);

impl SharedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the metrics
    pub fn update<R>(&self, f: impl FnOnce(&mut PipelineMetrics) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).snapshot()
    }

    pub fn fps_label(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).fps_label()
    }
}
