// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame pixel transform stage
//!
//! The transform itself is an opaque native function operating on two
//! equal-sized RGBA buffers. Whether it exists is decided once at startup
//! by [`TransformStage::probe`]:
//!
//! - [`TransformStage::Available`] calls the native function
//! - [`TransformStage::Unavailable`] forwards frames untouched (passthrough)
//!
//! [`TransformInvoker::invoke`] takes `&mut self`, so one invoker can never
//! run two transforms at once. The coordinator owns exactly one invoker.

use crate::backends::camera::{CanonicalFrame, ChannelLayout};
use crate::constants::transform::{
    BLUR_KERNEL_MAX, BLUR_KERNEL_MIN, DEFAULT_BLUR_KERNEL_SIZE, DEFAULT_LOWER_THRESHOLD,
    DEFAULT_UPPER_THRESHOLD, THRESHOLD_MAX, THRESHOLD_MIN,
};
use crate::errors::FrameResult;
use crate::pipelines::pool::FrameBufferPool;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Native transform entry point
///
/// `input` and `output` each point to `width * height * 4` bytes of RGBA.
/// The function must fill every output byte and must not retain either
/// pointer after returning.
pub type NativeTransformFn = unsafe extern "C" fn(
    input: *const u8,
    output: *mut u8,
    width: u32,
    height: u32,
    lower_threshold: i32,
    upper_threshold: i32,
    blur_kernel_size: i32,
);

/// Tunables passed to the transform on every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformParams {
    pub lower_threshold: i32,
    pub upper_threshold: i32,
    pub blur_kernel_size: i32,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            lower_threshold: DEFAULT_LOWER_THRESHOLD,
            upper_threshold: DEFAULT_UPPER_THRESHOLD,
            blur_kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
        }
    }
}

impl TransformParams {
    pub fn new(lower_threshold: i32, upper_threshold: i32, blur_kernel_size: i32) -> Self {
        Self {
            lower_threshold,
            upper_threshold,
            blur_kernel_size,
        }
    }

    /// Clamp every field into its accepted range
    ///
    /// Thresholds clamp to [0, 255]. The blur kernel clamps to [1, 15] and
    /// an even size is bumped to the next odd one, so 0 becomes 1 and 4
    /// becomes 5.
    pub fn sanitized(self) -> Self {
        let mut blur = self.blur_kernel_size.clamp(BLUR_KERNEL_MIN, BLUR_KERNEL_MAX);
        if blur % 2 == 0 {
            blur += 1;
        }
        Self {
            lower_threshold: self.lower_threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            upper_threshold: self.upper_threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX),
            blur_kernel_size: blur,
        }
    }
}

/// Transform parameters shared between the UI and the capture context
///
/// The capture context takes a snapshot at the start of each frame, so a
/// change applies from the next frame on and never mid-frame.
#[derive(Debug, Clone, Default)]
pub struct TransformSettings {
    inner: Arc<Mutex<TransformParams>>,
}

impl TransformSettings {
    pub fn new(params: TransformParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(params)),
        }
    }

    /// Replace all parameters
    pub fn set(&self, params: TransformParams) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = params;
    }

    pub fn set_lower_threshold(&self, value: i32) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lower_threshold = value;
    }

    pub fn set_upper_threshold(&self, value: i32) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upper_threshold = value;
    }

    pub fn set_blur_kernel_size(&self, value: i32) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blur_kernel_size = value;
    }

    /// Current parameters, as seen by the next frame
    pub fn snapshot(&self) -> TransformParams {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transform capability selected at startup
#[derive(Clone, Copy)]
pub enum TransformStage {
    /// Delegate to the native function
    Available(NativeTransformFn),
    /// No transform loaded, frames pass through unchanged
    Unavailable,
}

impl TransformStage {
    /// Select the stage variant from an optional native entry point
    pub fn probe(native: Option<NativeTransformFn>) -> Self {
        match native {
            Some(f) => {
                info!("Native transform available");
                TransformStage::Available(f)
            }
            None => {
                warn!("Native transform unavailable, running in passthrough mode");
                TransformStage::Unavailable
            }
        }
    }

    /// Capability flag reported to callers
    pub fn is_available(&self) -> bool {
        matches!(self, TransformStage::Available(_))
    }
}

impl std::fmt::Debug for TransformStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStage::Available(_) => write!(f, "TransformStage::Available"),
            TransformStage::Unavailable => write!(f, "TransformStage::Unavailable"),
        }
    }
}

/// Result of one transform invocation
#[derive(Debug)]
pub struct TransformOutput {
    pub frame: CanonicalFrame,
    /// True when the input was forwarded without running the transform
    pub passthrough: bool,
    /// Wall time spent inside the native call
    pub elapsed: Duration,
}

/// Runs the transform stage for one frame at a time
#[derive(Debug)]
pub struct TransformInvoker {
    stage: TransformStage,
    pool: Arc<FrameBufferPool>,
    invocations: u64,
}

impl TransformInvoker {
    pub fn new(stage: TransformStage, pool: Arc<FrameBufferPool>) -> Self {
        Self {
            stage,
            pool,
            invocations: 0,
        }
    }

    pub fn stage(&self) -> TransformStage {
        self.stage
    }

    /// Number of native transform calls made so far
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Transform one canonical frame
    ///
    /// Parameters are sanitized before the call. In passthrough mode the
    /// input is returned as-is. Otherwise the output comes from the pool and
    /// the consumed input goes back to it. If no output buffer can be
    /// allocated the input is released and the error returned.
    pub fn invoke(
        &mut self,
        input: CanonicalFrame,
        params: TransformParams,
    ) -> FrameResult<TransformOutput> {
        let native = match self.stage {
            TransformStage::Available(f) => f,
            TransformStage::Unavailable => {
                return Ok(TransformOutput {
                    frame: input,
                    passthrough: true,
                    elapsed: Duration::ZERO,
                });
            }
        };

        let params = params.sanitized();
        let (width, height) = (input.width(), input.height());

        let output = match self.pool.acquire(width, height, ChannelLayout::Rgba32) {
            Ok(frame) => frame,
            Err(e) => {
                self.pool.release(input.into_frame());
                return Err(e);
            }
        };
        let timestamp_ms = input.timestamp_ms();
        let mut output = CanonicalFrame::new(output, timestamp_ms)?;

        let start = Instant::now();
        // SAFETY: both buffers are canonical frames of identical dimensions,
        // so each holds exactly width * height * 4 bytes, and neither is
        // aliased while the call runs.
        unsafe {
            native(
                input.data().as_ptr(),
                output.data_mut().as_mut_ptr(),
                width,
                height,
                params.lower_threshold,
                params.upper_threshold,
                params.blur_kernel_size,
            );
        }
        let elapsed = start.elapsed();
        self.invocations += 1;

        debug!(
            width,
            height,
            lower = params.lower_threshold,
            upper = params.upper_threshold,
            blur = params.blur_kernel_size,
            elapsed_us = elapsed.as_micros() as u64,
            "Transform complete"
        );

        self.pool.release(input.into_frame());

        Ok(TransformOutput {
            frame: output,
            passthrough: false,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::Frame;
    use std::sync::atomic::{AtomicI32, Ordering};

    static LAST_BLUR: AtomicI32 = AtomicI32::new(-1);

    extern "C" fn invert(
        input: *const u8,
        output: *mut u8,
        width: u32,
        height: u32,
        _lower: i32,
        _upper: i32,
        blur: i32,
    ) {
        LAST_BLUR.store(blur, Ordering::SeqCst);
        let len = (width * height * 4) as usize;
        let (src, dst) = unsafe {
            (
                std::slice::from_raw_parts(input, len),
                std::slice::from_raw_parts_mut(output, len),
            )
        };
        for (d, s) in dst.iter_mut().zip(src) {
            *d = 255 - s;
        }
    }

    fn canonical(width: u32, height: u32, fill: u8) -> CanonicalFrame {
        let mut frame = Frame::allocate(width, height, ChannelLayout::Rgba32).unwrap();
        frame.data_mut().fill(fill);
        CanonicalFrame::new(frame, 0).unwrap()
    }

    #[test]
    fn test_sanitize_blur() {
        assert_eq!(TransformParams::new(50, 150, 0).sanitized().blur_kernel_size, 1);
        assert_eq!(TransformParams::new(50, 150, -3).sanitized().blur_kernel_size, 1);
        assert_eq!(TransformParams::new(50, 150, 4).sanitized().blur_kernel_size, 5);
        assert_eq!(TransformParams::new(50, 150, 5).sanitized().blur_kernel_size, 5);
        assert_eq!(TransformParams::new(50, 150, 14).sanitized().blur_kernel_size, 15);
        assert_eq!(TransformParams::new(50, 150, 99).sanitized().blur_kernel_size, 15);
    }

    #[test]
    fn test_sanitize_thresholds() {
        let p = TransformParams::new(-10, 300, 5).sanitized();
        assert_eq!(p.lower_threshold, 0);
        assert_eq!(p.upper_threshold, 255);
    }

    #[test]
    fn test_default_params() {
        assert_eq!(TransformParams::default(), TransformParams::new(50, 150, 5));
    }

    #[test]
    fn test_settings_snapshot() {
        let settings = TransformSettings::default();
        let ui = settings.clone();
        ui.set_lower_threshold(10);
        ui.set_upper_threshold(20);
        ui.set_blur_kernel_size(3);
        assert_eq!(settings.snapshot(), TransformParams::new(10, 20, 3));
    }

    #[test]
    fn test_passthrough_returns_input() {
        let pool = Arc::new(FrameBufferPool::new(2));
        let mut invoker = TransformInvoker::new(TransformStage::probe(None), pool.clone());
        let input = canonical(4, 4, 9);
        let ptr = input.data().as_ptr();

        let out = invoker.invoke(input, TransformParams::default()).unwrap();
        assert!(out.passthrough);
        assert_eq!(out.frame.data().as_ptr(), ptr);
        assert!(out.frame.data().iter().all(|&b| b == 9));
        assert_eq!(invoker.invocations(), 0);
        assert_eq!(pool.stats().allocations, 0);
    }

    #[test]
    fn test_available_calls_native_and_recycles_input() {
        let pool = Arc::new(FrameBufferPool::new(2));
        let mut invoker = TransformInvoker::new(TransformStage::probe(Some(invert)), pool.clone());
        assert!(invoker.stage().is_available());

        let out = invoker
            .invoke(canonical(4, 2, 10), TransformParams::new(50, 150, 0))
            .unwrap();
        assert!(!out.passthrough);
        assert!(out.frame.data().iter().all(|&b| b == 245));
        assert_eq!(out.frame.data().len(), 4 * 2 * 4);
        assert_eq!(LAST_BLUR.load(Ordering::SeqCst), 1);
        assert_eq!(invoker.invocations(), 1);

        let shape = out.frame.into_frame().shape();
        assert_eq!(pool.free_count(shape), 1);
    }
}
