// SPDX-License-Identifier: GPL-3.0-only

//! Full-screen quad renderer
//!
//! Draws the frame texture onto a static quad once per display tick,
//! whether or not a new frame arrived. Per draw:
//!
//! 1. bind the pipeline
//! 2. bind the projection, computed only when the target is resized
//! 3. bind the current frame texture
//! 4. draw the four-vertex strip
//!
//! Pipeline, buffers and sampler are created in [`Renderer::new`] and
//! released by [`Renderer::release`] or on drop.

use crate::errors::{RenderError, RenderResult, ShaderStage};
use crate::shaders::{CachedDimensions, FRAGMENT_ENTRY, ShaderSources, VERTEX_ENTRY};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

/// Quad vertex: clip-space position plus texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

/// Triangle-strip quad covering [-1, 1]², texture rows top to bottom
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0, 0.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0, 0.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0, 0.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0, 0.0],
        tex_coord: [1.0, 0.0],
    },
];

/// Column-major 4x4 matrix as laid out in the uniform buffer
pub type Mat4 = [[f32; 4]; 4];

/// Uniform block for the vertex stage
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct QuadUniforms {
    mvp: Mat4,
}

/// Projection for a `width x height` target
///
/// The quad fills the full height. Its horizontal extent is divided by the
/// aspect ratio (width / height), and negated when `mirror` is set.
pub fn projection(width: u32, height: u32, mirror: bool) -> Mat4 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let sign = if mirror { -1.0 } else { 1.0 };
    let sx = sign / aspect;
    [
        [sx, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// GPU program and fixed geometry for the preview quad
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    /// Bind group for the current texture generation
    bind_group: Option<(u64, wgpu::BindGroup)>,
    viewport: CachedDimensions,
    mirror: bool,
    projection: Mat4,
    draws: u64,
    released: bool,
}

impl Renderer {
    /// Compile both shader stages and build the render pipeline
    ///
    /// Compile errors are captured with validation error scopes and
    /// returned as `ShaderCompile`; a pipeline that fails to build is
    /// reported as `ProgramLink`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
        sources: &ShaderSources,
        mirror: bool,
    ) -> RenderResult<Self> {
        let vertex_module = compile_shader(&device, ShaderStage::Vertex, &sources.vertex)?;
        let fragment_module = compile_shader(&device, ShaderStage::Fragment, &sources.fragment)?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ProgramLink(error.to_string()));
        }

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let projection = projection(1, 1, mirror);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_uniforms"),
            contents: bytemuck::bytes_of(&QuadUniforms { mvp: projection }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        info!(format = ?target_format, mirror, "Quad renderer created");

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            sampler,
            vertex_buffer,
            uniform_buffer,
            bind_group: None,
            viewport: CachedDimensions::default(),
            mirror,
            projection,
            draws: 0,
            released: false,
        })
    }

    /// Recompute the projection for a new target size
    ///
    /// Returns false when the size is unchanged and nothing was written.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if !self.viewport.needs_update(width, height) {
            return false;
        }
        self.viewport.update(width, height);
        self.projection = projection(width, height, self.mirror);
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&QuadUniforms {
                mvp: self.projection,
            }),
        );
        debug!(width, height, "Projection updated");
        true
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Number of completed draws
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Draw one tick into `target`
    ///
    /// `frame` is the current texture view and its generation. With no
    /// texture yet the target is only cleared to black. Redrawing an
    /// unchanged texture is expected.
    pub fn draw_frame(
        &mut self,
        target: &wgpu::TextureView,
        frame: Option<(&wgpu::TextureView, u64)>,
    ) {
        if self.released {
            return;
        }

        if let Some((view, generation)) = frame
            && self.bind_group.as_ref().is_none_or(|(current, _)| *current != generation)
        {
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quad_bind_group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.bind_group = Some((generation, bind_group));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quad_draw"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if frame.is_some()
                && let Some((_, bind_group)) = &self.bind_group
            {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.draws += 1;
    }

    /// Free GPU buffers; later draws become no-ops
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        debug!(draws = self.draws, "Releasing quad renderer");
        self.bind_group = None;
        self.vertex_buffer.destroy();
        self.uniform_buffer.destroy();
        self.released = true;
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Compile one WGSL stage, turning validation errors into `ShaderCompile`
fn compile_shader(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &str,
) -> RenderResult<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "quad_vertex",
            ShaderStage::Fragment => "quad_fragment",
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(RenderError::ShaderCompile {
            stage,
            message: error.to_string(),
        }),
        None => Ok(module),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(m: &Mat4, x: f32, y: f32) -> (f32, f32) {
        (
            m[0][0] * x + m[1][0] * y + m[3][0],
            m[0][1] * x + m[1][1] * y + m[3][1],
        )
    }

    #[test]
    fn test_square_target_is_identity() {
        let m = projection(720, 720, false);
        assert_eq!(apply(&m, 1.0, 1.0), (1.0, 1.0));
        assert_eq!(apply(&m, -1.0, -1.0), (-1.0, -1.0));
    }

    #[test]
    fn test_wide_target_scales_horizontal_extent() {
        let m = projection(1280, 640, false);
        let (x, y) = apply(&m, 1.0, 1.0);
        assert!((x - 0.5).abs() < 1e-6);
        assert_eq!(y, 1.0);
    }

    #[test]
    fn test_mirror_flips_horizontally() {
        let m = projection(1280, 640, true);
        let (x, y) = apply(&m, 1.0, 1.0);
        assert!((x + 0.5).abs() < 1e-6);
        assert_eq!(y, 1.0);
    }

    #[test]
    fn test_quad_covers_clip_space() {
        let xs: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = QUAD_VERTICES.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs, vec![-1.0, 1.0, -1.0, 1.0]);
        assert_eq!(ys, vec![-1.0, -1.0, 1.0, 1.0]);
        // Top of the quad samples the first texture row
        assert_eq!(QUAD_VERTICES[2].tex_coord, [0.0, 0.0]);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let m = projection(100, 0, false);
        assert!(m[0][0].is_finite());
    }
}
