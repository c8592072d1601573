// SPDX-License-Identifier: GPL-3.0-only

//! Offscreen render target
//!
//! Stands in for a window surface when running headless. Its contents can
//! be read back as an image for snapshots and tests.

use crate::constants::render::SURFACE_FORMAT;
use crate::errors::{RenderError, RenderResult};
use crate::shaders::{CachedDimensions, read_buffer_async};
use image::RgbaImage;
use tracing::debug;

/// Color texture the renderer draws into
pub struct OffscreenSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: CachedDimensions,
}

impl OffscreenSurface {
    /// Create a target; zero dimensions are raised to 1
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let (texture, view) = create_target(device, width, height);
        Self {
            texture,
            view,
            size: CachedDimensions::new(width, height),
        }
    }

    /// Recreate the target at a new size
    ///
    /// Returns false if the size did not change.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if !self.size.needs_update(width, height) {
            return false;
        }
        debug!(width, height, "Resizing offscreen surface");
        self.texture.destroy();
        let (texture, view) = create_target(device, width, height);
        self.texture = texture;
        self.view = view;
        self.size.update(width, height);
        true
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        SURFACE_FORMAT
    }

    pub fn size(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    /// Copy the current contents back to the CPU
    ///
    /// Waits for all submitted work, so the result reflects the last draw.
    pub fn read_pixels(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> RenderResult<RgbaImage> {
        let (width, height) = self.size();
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("surface_readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("surface_readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let padded = pollster::block_on(read_buffer_async(device, &buffer))
            .map_err(RenderError::Readback)?;
        buffer.destroy();

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in padded.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("pixel buffer size mismatch".into()))
    }

    /// Free the target texture
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_surface"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SURFACE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
