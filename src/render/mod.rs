// SPDX-License-Identifier: GPL-3.0-only

//! Render context
//!
//! Everything in here lives on the render thread. [`GpuRenderContext`] ties
//! the frame texture, the quad renderer and the offscreen target together
//! and is driven once per tick by the render loop.

pub mod renderer;
pub mod surface;
pub mod texture;

pub use renderer::{Mat4, QUAD_VERTICES, QuadVertex, Renderer, projection};
pub use surface::OffscreenSurface;
pub use texture::{
    GpuTexture, NO_TEXTURE, TextureBackend, TextureState, TextureUploader, UploadOutcome,
};

use crate::constants::render::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};
use crate::errors::{RenderError, RenderResult};
use crate::gpu::{GpuDeviceInfo, create_render_device};
use crate::pipelines::LatestFrameSlot;
use crate::shaders::ShaderSources;
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Work done by the render loop on every tick
pub trait RenderTarget {
    /// Consume the newest frame from `slot`, if any, and draw
    ///
    /// An error halts rendering. Per-frame upload failures are not errors.
    fn tick(&mut self, slot: &LatestFrameSlot) -> RenderResult<()>;
}

/// Lifecycle of the render context as seen from outside the render thread
#[derive(Debug, Clone)]
pub enum RenderState {
    Starting,
    Running,
    Failed(RenderError),
    Stopped,
}

/// Shared handle to the current [`RenderState`]
#[derive(Debug, Clone)]
pub struct RenderStatus(Arc<Mutex<RenderState>>);

impl RenderStatus {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(RenderState::Starting)))
    }

    pub fn set(&self, state: RenderState) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn get(&self) -> RenderState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Mark the context stopped unless it already failed
    pub fn finish(&self) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*state, RenderState::Failed(_)) {
            *state = RenderState::Stopped;
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.get(), RenderState::Failed(_))
    }
}

impl Default for RenderStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives the last rendered image when the render context shuts down
#[derive(Debug, Clone, Default)]
pub struct SnapshotSlot(Arc<Mutex<Option<RgbaImage>>>);

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, image: RgbaImage) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(image);
    }

    pub fn take(&self) -> Option<RgbaImage> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Settings for creating a [`GpuRenderContext`]
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub surface_width: u32,
    pub surface_height: u32,
    pub mirror: bool,
    /// Directory with shader overrides; built-in sources when `None`
    pub shader_dir: Option<PathBuf>,
    /// Where to put a readback of the final image on release
    pub snapshot: Option<SnapshotSlot>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            surface_width: DEFAULT_SURFACE_WIDTH,
            surface_height: DEFAULT_SURFACE_HEIGHT,
            mirror: true,
            shader_dir: None,
            snapshot: None,
        }
    }
}

/// GPU resources owned by the render thread
///
/// Created inside the render loop's init closure and dropped there, which
/// releases the texture, buffers and target in that order.
pub struct GpuRenderContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
    uploader: TextureUploader<GpuTexture>,
    renderer: Renderer,
    surface: OffscreenSurface,
    snapshot: Option<SnapshotSlot>,
    dropped_uploads: u64,
    released: bool,
}

impl GpuRenderContext {
    /// Load the shaders, acquire a device, create the frame texture and
    /// compile the program
    ///
    /// Runs on the render thread. Shader sources are read first, so a
    /// missing file fails here without touching the GPU.
    pub fn new(options: &RenderOptions) -> RenderResult<Self> {
        let shaders = ShaderSources::resolve(options.shader_dir.as_deref())?;
        let (device, queue, info) = pollster::block_on(create_render_device("edgecam_render"))?;

        let mut uploader =
            TextureUploader::new(GpuTexture::new(Arc::clone(&device), Arc::clone(&queue)));
        uploader.create()?;

        let surface = OffscreenSurface::new(&device, options.surface_width, options.surface_height);
        let mut renderer = Renderer::new(
            Arc::clone(&device),
            Arc::clone(&queue),
            surface.format(),
            &shaders,
            options.mirror,
        )?;
        let (width, height) = surface.size();
        renderer.resize(width, height);

        info!(adapter = %info, width, height, "Render context ready");

        Ok(Self {
            device,
            queue,
            info,
            uploader,
            renderer,
            surface,
            snapshot: options.snapshot.clone(),
            dropped_uploads: 0,
            released: false,
        })
    }

    pub fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    pub fn uploader(&self) -> &TextureUploader<GpuTexture> {
        &self.uploader
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Frames lost to failed uploads
    pub fn dropped_uploads(&self) -> u64 {
        self.dropped_uploads
    }

    /// Resize the target and recompute the projection
    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if self.surface.resize(&self.device, width, height) {
            let (width, height) = self.surface.size();
            self.renderer.resize(width, height);
        }
    }

    /// Read the current target contents
    pub fn read_pixels(&self) -> RenderResult<RgbaImage> {
        self.surface.read_pixels(&self.device, &self.queue)
    }

    /// Free all GPU resources
    ///
    /// Takes the snapshot first when one was requested. Safe to call twice.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(slot) = self.snapshot.take() {
            match self.read_pixels() {
                Ok(image) => slot.store(image),
                Err(e) => warn!(error = %e, "Snapshot readback failed"),
            }
        }

        debug!(
            uploads = self.uploader.uploads(),
            reallocations = self.uploader.reallocations(),
            draws = self.renderer.draws(),
            "Releasing render context"
        );
        self.uploader.release();
        self.renderer.release();
        self.surface.destroy();
    }
}

impl RenderTarget for GpuRenderContext {
    fn tick(&mut self, slot: &LatestFrameSlot) -> RenderResult<()> {
        if let Some(frame) = slot.take() {
            if let Err(e) = self.uploader.upload(&frame) {
                self.dropped_uploads += 1;
                warn!(error = %e, "Frame upload failed, dropping frame");
            }
            slot.recycle(frame);
        }

        let bound = self.uploader.backend().bound_view();
        self.renderer.draw_frame(self.surface.view(), bound);
        Ok(())
    }
}

impl Drop for GpuRenderContext {
    fn drop(&mut self) {
        self.release();
    }
}
