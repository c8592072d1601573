// SPDX-License-Identifier: GPL-3.0-only

//! Frame texture ownership and upload
//!
//! [`TextureUploader`] owns the single texture the renderer samples from.
//! Storage is reallocated only when the incoming frame size differs from the
//! last upload; same-size frames overwrite the pixels in place.
//!
//! The uploader is `!Send`. It is created on the render thread and cannot
//! be moved off it, so texture mutation from the capture context does not
//! compile.

use crate::backends::camera::CanonicalFrame;
use crate::constants::render::FRAME_TEXTURE_FORMAT;
use crate::errors::{RenderError, RenderResult};
use crate::shaders::CachedDimensions;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Texture handle value meaning "not created"
pub const NO_TEXTURE: u32 = 0;

/// Storage operations the uploader needs from a graphics API
pub trait TextureBackend {
    /// Create the texture object and return its non-zero handle
    fn create(&mut self) -> RenderResult<u32>;

    /// Allocate (or reallocate) storage for `width x height` RGBA pixels
    ///
    /// Previous contents are discarded.
    fn allocate(&mut self, texture_id: u32, width: u32, height: u32) -> RenderResult<()>;

    /// Overwrite the whole texture with tightly packed RGBA pixels
    fn write(&mut self, texture_id: u32, width: u32, height: u32, pixels: &[u8]);

    /// Delete the texture object
    fn destroy(&mut self, texture_id: u32);
}

/// GPU-side record of the frame texture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureState {
    texture_id: u32,
    dimensions: CachedDimensions,
}

impl TextureState {
    pub fn texture_id(&self) -> u32 {
        self.texture_id
    }

    /// Width of the last successful upload
    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height of the last successful upload
    pub fn height(&self) -> u32 {
        self.dimensions.height
    }
}

/// What an upload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No texture object, nothing written
    Skipped,
    /// Storage was reallocated for new dimensions, then written
    Reallocated,
    /// Pixels replaced in existing storage
    Updated,
}

/// Owner of the frame texture on the render thread
pub struct TextureUploader<B: TextureBackend> {
    backend: B,
    state: TextureState,
    reallocations: u64,
    uploads: u64,
    _render_thread: PhantomData<*const ()>,
}

impl<B: TextureBackend> TextureUploader<B> {
    /// Wrap a backend; no texture object exists until [`create`](Self::create)
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: TextureState::default(),
            reallocations: 0,
            uploads: 0,
            _render_thread: PhantomData,
        }
    }

    /// Create the texture object if it does not exist yet
    pub fn create(&mut self) -> RenderResult<()> {
        if self.state.texture_id != NO_TEXTURE {
            return Ok(());
        }
        let id = self.backend.create()?;
        if id == NO_TEXTURE {
            return Err(RenderError::Allocation(
                "backend returned a null texture handle".into(),
            ));
        }
        debug!(texture_id = id, "Frame texture created");
        self.state.texture_id = id;
        Ok(())
    }

    /// Upload one canonical frame
    ///
    /// A missing texture object makes this a logged no-op. A failed
    /// reallocation drops the frame and leaves the texture unsized, so the
    /// next frame retries the allocation.
    pub fn upload(&mut self, frame: &CanonicalFrame) -> RenderResult<UploadOutcome> {
        let id = self.state.texture_id;
        if id == NO_TEXTURE {
            warn!("Frame texture not created, skipping upload");
            return Ok(UploadOutcome::Skipped);
        }

        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 || frame.data().is_empty() {
            warn!(width, height, "Empty frame, skipping upload");
            return Ok(UploadOutcome::Skipped);
        }

        let outcome = if self.state.dimensions.needs_update(width, height) {
            if let Err(e) = self.backend.allocate(id, width, height) {
                self.state.dimensions = CachedDimensions::default();
                return Err(e);
            }
            info!(
                width,
                height,
                previous_width = self.state.width(),
                previous_height = self.state.height(),
                "Frame texture reallocated"
            );
            self.state.dimensions.update(width, height);
            self.reallocations += 1;
            UploadOutcome::Reallocated
        } else {
            UploadOutcome::Updated
        };

        self.backend.write(id, width, height, frame.data());
        self.uploads += 1;
        Ok(outcome)
    }

    pub fn state(&self) -> TextureState {
        self.state
    }

    /// Number of storage reallocations so far
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Number of frames written so far
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Delete the texture object; safe to call more than once
    pub fn release(&mut self) {
        if self.state.texture_id != NO_TEXTURE {
            debug!(texture_id = self.state.texture_id, "Releasing frame texture");
            self.backend.destroy(self.state.texture_id);
            self.state = TextureState::default();
        }
    }
}

impl<B: TextureBackend> Drop for TextureUploader<B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// wgpu texture backend
///
/// Holds one RGBA texture plus its view. Every reallocation bumps
/// [`generation`](Self::generation) so the renderer knows to rebuild its
/// bind group.
pub struct GpuTexture {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    created: bool,
    generation: u64,
}

/// Handle the wgpu backend hands out for its single texture
const GPU_TEXTURE_ID: u32 = 1;

impl GpuTexture {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            texture: None,
            view: None,
            created: false,
            generation: 0,
        }
    }

    /// Current view and its generation, once storage exists
    pub fn bound_view(&self) -> Option<(&wgpu::TextureView, u64)> {
        self.view.as_ref().map(|view| (view, self.generation))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl TextureBackend for GpuTexture {
    fn create(&mut self) -> RenderResult<u32> {
        self.created = true;
        Ok(GPU_TEXTURE_ID)
    }

    fn allocate(&mut self, _texture_id: u32, width: u32, height: u32) -> RenderResult<()> {
        if !self.created {
            return Err(RenderError::Allocation("texture object not created".into()));
        }

        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(RenderError::Allocation(format!(
                "{}x{} exceeds the device texture limit of {}",
                width, height, max
            )));
        }

        if let Some(old) = self.texture.take() {
            old.destroy();
        }
        self.view = None;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Allocation(error.to_string()));
        }

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.generation += 1;
        Ok(())
    }

    fn write(&mut self, _texture_id: u32, width: u32, height: u32, pixels: &[u8]) {
        let Some(texture) = &self.texture else {
            return;
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy(&mut self, _texture_id: u32) {
        self.view = None;
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
        self.created = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{ChannelLayout, Frame};

    #[derive(Default)]
    struct RecordingBackend {
        next_id: u32,
        allocations: Vec<(u32, u32)>,
        writes: usize,
        destroyed: Vec<u32>,
        fail_allocation: bool,
    }

    impl TextureBackend for RecordingBackend {
        fn create(&mut self) -> RenderResult<u32> {
            self.next_id += 1;
            Ok(self.next_id)
        }

        fn allocate(&mut self, _id: u32, width: u32, height: u32) -> RenderResult<()> {
            if self.fail_allocation {
                return Err(RenderError::Allocation("out of memory".into()));
            }
            self.allocations.push((width, height));
            Ok(())
        }

        fn write(&mut self, _id: u32, width: u32, height: u32, pixels: &[u8]) {
            assert_eq!(pixels.len(), (width * height * 4) as usize);
            self.writes += 1;
        }

        fn destroy(&mut self, id: u32) {
            self.destroyed.push(id);
        }
    }

    fn frame(width: u32, height: u32) -> CanonicalFrame {
        CanonicalFrame::new(
            Frame::allocate(width, height, ChannelLayout::Rgba32).unwrap(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_upload_without_texture_is_noop() {
        let mut uploader = TextureUploader::new(RecordingBackend::default());
        assert_eq!(uploader.upload(&frame(4, 4)).unwrap(), UploadOutcome::Skipped);
        assert_eq!(uploader.backend().writes, 0);
        assert_eq!(uploader.state().texture_id(), NO_TEXTURE);
    }

    #[test]
    fn test_reallocate_only_on_dimension_change() {
        let mut uploader = TextureUploader::new(RecordingBackend::default());
        uploader.create().unwrap();

        assert_eq!(
            uploader.upload(&frame(640, 480)).unwrap(),
            UploadOutcome::Reallocated
        );
        for _ in 0..5 {
            assert_eq!(
                uploader.upload(&frame(640, 480)).unwrap(),
                UploadOutcome::Updated
            );
        }
        assert_eq!(uploader.reallocations(), 1);

        assert_eq!(
            uploader.upload(&frame(1280, 720)).unwrap(),
            UploadOutcome::Reallocated
        );
        assert_eq!(uploader.reallocations(), 2);
        assert_eq!(uploader.state().width(), 1280);
        assert_eq!(uploader.state().height(), 720);
        assert_eq!(uploader.backend().allocations, vec![(640, 480), (1280, 720)]);
        assert_eq!(uploader.backend().writes, 7);
    }

    #[test]
    fn test_failed_allocation_retries_next_frame() {
        let mut uploader = TextureUploader::new(RecordingBackend {
            fail_allocation: true,
            ..Default::default()
        });
        uploader.create().unwrap();

        assert!(uploader.upload(&frame(8, 8)).is_err());
        assert_eq!(uploader.backend().writes, 0);
        assert_eq!(uploader.state().width(), 0);

        uploader.backend.fail_allocation = false;
        assert_eq!(
            uploader.upload(&frame(8, 8)).unwrap(),
            UploadOutcome::Reallocated
        );
    }

    #[test]
    fn test_create_is_idempotent_and_release_destroys() {
        let mut uploader = TextureUploader::new(RecordingBackend::default());
        uploader.create().unwrap();
        uploader.create().unwrap();
        let id = uploader.state().texture_id();
        assert_eq!(id, 1);

        uploader.release();
        uploader.release();
        assert_eq!(uploader.backend().destroyed, vec![id]);
        assert_eq!(uploader.state().texture_id(), NO_TEXTURE);
    }
}
