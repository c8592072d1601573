// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests for the capture, transform and render pipeline

use edgecam::backends::camera::format_converters::normalize;
use edgecam::backends::camera::{CapturedFrame, TestPatternSource};
use edgecam::errors::{FrameError, RenderError, RenderResult};
use edgecam::pipelines::{
    FrameBufferPool, FrameOutcome, FrameStage, LatestFrameSlot, PipelineCoordinator,
    PipelineMetrics, PipelineSession, SessionOptions, SharedMetrics, TransformInvoker,
    TransformParams, TransformSettings, TransformStage,
};
use edgecam::render::{
    GpuRenderContext, RenderOptions, RenderState, RenderTarget, TextureBackend, TextureUploader,
};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Texture calls observed on the render thread
#[derive(Default)]
struct TextureLog {
    allocations: Vec<(u32, u32)>,
    writes: Vec<usize>,
    destroyed: usize,
}

struct LoggingBackend(Arc<Mutex<TextureLog>>);

impl TextureBackend for LoggingBackend {
    fn create(&mut self) -> RenderResult<u32> {
        Ok(1)
    }

    fn allocate(&mut self, _id: u32, width: u32, height: u32) -> RenderResult<()> {
        self.0.lock().unwrap().allocations.push((width, height));
        Ok(())
    }

    fn write(&mut self, _id: u32, _width: u32, _height: u32, pixels: &[u8]) {
        self.0.lock().unwrap().writes.push(pixels.len());
    }

    fn destroy(&mut self, _id: u32) {
        self.0.lock().unwrap().destroyed += 1;
    }
}

/// Render target that uploads but does not draw
struct UploadOnly(TextureUploader<LoggingBackend>);

impl RenderTarget for UploadOnly {
    fn tick(&mut self, slot: &LatestFrameSlot) -> RenderResult<()> {
        if let Some(frame) = slot.take() {
            self.0.upload(&frame)?;
            slot.recycle(frame);
        }
        Ok(())
    }
}

fn upload_only(
    log: Arc<Mutex<TextureLog>>,
) -> impl FnOnce() -> RenderResult<UploadOnly> + Send + 'static {
    move || {
        let mut uploader = TextureUploader::new(LoggingBackend(log));
        uploader.create()?;
        Ok(UploadOnly(uploader))
    }
}

fn wait_until_consumed(session: &PipelineSession) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.slot().is_pending() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn captured(data: &[u8], width: u32, height: u32, channels: u32) -> CapturedFrame<'_> {
    CapturedFrame {
        data,
        width,
        height,
        channels,
        timestamp_ms: 0,
    }
}

fn coordinator(stage: TransformStage) -> (PipelineCoordinator, Arc<LatestFrameSlot>) {
    let pool = Arc::new(FrameBufferPool::default());
    let slot = Arc::new(LatestFrameSlot::new(pool.clone()));
    let coordinator = PipelineCoordinator::new(
        pool.clone(),
        TransformInvoker::new(stage, pool),
        TransformSettings::default(),
        SharedMetrics::new(),
        slot.clone(),
    );
    (coordinator, slot)
}

static GRAY_CALLS: AtomicU64 = AtomicU64::new(0);

extern "C" fn count_gray(
    input: *const u8,
    output: *mut u8,
    width: u32,
    height: u32,
    _lower: i32,
    _upper: i32,
    _blur: i32,
) {
    GRAY_CALLS.fetch_add(1, Ordering::SeqCst);
    let len = (width * height * 4) as usize;
    unsafe { std::ptr::copy_nonoverlapping(input, output, len) };
}

#[test]
fn test_gray_vga_stream_uploads_once_per_size() {
    let log = Arc::new(Mutex::new(TextureLog::default()));
    let source = TestPatternSource::new(640, 480, 1, 30)
        .unwrap()
        .unpaced()
        .with_frame_limit(Some(5));

    let mut session = PipelineSession::start(
        source,
        TransformStage::probe(Some(count_gray)),
        SessionOptions::default(),
        upload_only(log.clone()),
    );
    session.wait_for_capture();
    wait_until_consumed(&session);
    session.stop();

    assert_eq!(GRAY_CALLS.load(Ordering::SeqCst), 5);

    let snapshot = session.metrics().snapshot();
    assert_eq!(snapshot.frame_count, 5);
    assert_eq!(snapshot.passthrough_count, 0);
    assert_eq!(snapshot.resolution.as_deref(), Some("640x480"));

    let log = log.lock().unwrap();
    assert_eq!(log.allocations, vec![(640, 480)]);
    assert!(!log.writes.is_empty());
    assert!(log.writes.iter().all(|&len| len == 640 * 480 * 4));
    assert_eq!(log.destroyed, 1, "texture released with the render context");
}

#[test]
fn test_passthrough_is_bit_identical() {
    let (mut coordinator, slot) = coordinator(TransformStage::probe(None));
    let rgba: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8).collect();

    let outcome = coordinator.on_frame(&captured(&rgba, 3, 2, 4));
    assert_eq!(
        outcome,
        FrameOutcome::Delivered {
            passthrough: true,
            superseded: false,
        }
    );
    assert_eq!(slot.take().unwrap().data(), &rgba[..]);
    assert_eq!(coordinator.invoker().invocations(), 0);
}

#[test]
fn test_bgr_input_swapped_to_rgba() {
    let (mut coordinator, slot) = coordinator(TransformStage::probe(None));
    let bgr = [10u8, 20, 30, 40, 50, 60];

    coordinator.on_frame(&captured(&bgr, 2, 1, 3));
    assert_eq!(slot.take().unwrap().data(), &[30, 20, 10, 255, 60, 50, 40, 255]);
}

static ACTIVE: AtomicI32 = AtomicI32::new(0);
static MAX_ACTIVE: AtomicI32 = AtomicI32::new(0);
static STRESS_CALLS: AtomicU64 = AtomicU64::new(0);

extern "C" fn slow_transform(
    _input: *const u8,
    _output: *mut u8,
    _width: u32,
    _height: u32,
    _lower: i32,
    _upper: i32,
    _blur: i32,
) {
    let active = ACTIVE.fetch_add(1, Ordering::SeqCst) + 1;
    MAX_ACTIVE.fetch_max(active, Ordering::SeqCst);
    STRESS_CALLS.fetch_add(1, Ordering::SeqCst);
    std::thread::sleep(Duration::from_micros(200));
    ACTIVE.fetch_sub(1, Ordering::SeqCst);
}

#[test]
fn test_transform_never_overlaps() {
    let log = Arc::new(Mutex::new(TextureLog::default()));
    let source = TestPatternSource::new(64, 48, 3, 30)
        .unwrap()
        .unpaced()
        .with_frame_limit(Some(200));

    let mut session = PipelineSession::start(
        source,
        TransformStage::probe(Some(slow_transform)),
        SessionOptions {
            render_fps: 240,
            ..Default::default()
        },
        upload_only(log),
    );

    // Parameter changes race with the capture thread on purpose
    for blur in 0..50 {
        session.settings().set_blur_kernel_size(blur);
        std::thread::sleep(Duration::from_micros(100));
    }
    session.wait_for_capture();
    session.stop();

    assert_eq!(MAX_ACTIVE.load(Ordering::SeqCst), 1);
    assert_eq!(STRESS_CALLS.load(Ordering::SeqCst), 200);
    assert_eq!(session.metrics().snapshot().frame_count, 200);
}

#[test]
fn test_normalized_length_for_each_layout() {
    let pool = FrameBufferPool::default();
    for channels in [1u32, 3, 4] {
        let data = vec![7u8; 5 * 3 * channels as usize];
        let frame = normalize(&captured(&data, 5, 3, channels), &pool).unwrap();
        assert_eq!(frame.data().len(), 5 * 3 * 4, "channels = {}", channels);
    }
}

#[test]
fn test_unsupported_channels_never_reach_render() {
    let (mut coordinator, slot) = coordinator(TransformStage::probe(None));
    let data = vec![0u8; 4 * 4 * 2];

    match coordinator.on_frame(&captured(&data, 4, 4, 2)) {
        FrameOutcome::Dropped { last_stage, error } => {
            assert_eq!(last_stage, FrameStage::Captured);
            assert_eq!(error, FrameError::UnsupportedChannels { channels: 2 });
        }
        other => panic!("expected drop, got {:?}", other),
    }
    assert!(!slot.is_pending());
}

#[test]
fn test_zero_blur_reaches_transform_as_one() {
    assert_eq!(TransformParams::new(50, 150, 0).sanitized().blur_kernel_size, 1);

    let settings = TransformSettings::default();
    settings.set_blur_kernel_size(0);
    assert_eq!(settings.snapshot().sanitized().blur_kernel_size, 1);
}

#[test]
fn test_fps_sequence() {
    let mut metrics = PipelineMetrics::new();
    let fps: Vec<Option<f64>> = [1000, 1100, 1200]
        .into_iter()
        .map(|ts| metrics.record_timestamp(ts))
        .collect();

    assert_eq!(fps[0], None);
    assert!((fps[1].unwrap() - 10.0).abs() < f64::EPSILON);
    assert!((fps[2].unwrap() - 10.0).abs() < f64::EPSILON);
    assert_eq!(metrics.fps_label(), "FPS: 10.0");
}

#[test]
fn test_render_failure_does_not_stop_capture() {
    let source = TestPatternSource::new(8, 8, 4, 30)
        .unwrap()
        .unpaced()
        .with_frame_limit(Some(20));

    let mut session = PipelineSession::start(
        source,
        TransformStage::probe(None),
        SessionOptions::default(),
        || -> RenderResult<UploadOnly> {
            Err(RenderError::ProgramLink("missing entry point".into()))
        },
    );
    session.wait_for_capture();
    session.stop();

    assert!(session.render_status().is_failed());
    assert_eq!(session.metrics().snapshot().frame_count, 20);
}

#[test]
fn test_missing_shader_dir_fails_render_only() {
    let dir = tempfile::tempdir().unwrap();
    let render_options = RenderOptions {
        shader_dir: Some(dir.path().join("no_such_shaders")),
        ..Default::default()
    };
    let source = TestPatternSource::new(16, 8, 3, 30)
        .unwrap()
        .unpaced()
        .with_frame_limit(Some(5));

    let mut session = PipelineSession::start(
        source,
        TransformStage::probe(None),
        SessionOptions::default(),
        move || GpuRenderContext::new(&render_options),
    );
    session.wait_for_capture();
    session.stop();

    assert!(session.render_status().is_failed());
    assert!(matches!(
        session.render_status().get(),
        RenderState::Failed(RenderError::ShaderLoad { .. })
    ));
    assert_eq!(session.metrics().snapshot().frame_count, 5);
}
