// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Edge transform parameter defaults and limits
pub mod transform {
    /// Default lower hysteresis threshold
    pub const DEFAULT_LOWER_THRESHOLD: i32 = 50;
    /// Default upper hysteresis threshold
    pub const DEFAULT_UPPER_THRESHOLD: i32 = 150;
    /// Default blur kernel size (odd)
    pub const DEFAULT_BLUR_KERNEL_SIZE: i32 = 5;

    /// Smallest accepted threshold value
    pub const THRESHOLD_MIN: i32 = 0;
    /// Largest accepted threshold value
    pub const THRESHOLD_MAX: i32 = 255;

    /// Smallest blur kernel (no blur)
    pub const BLUR_KERNEL_MIN: i32 = 1;
    /// Largest blur kernel
    pub const BLUR_KERNEL_MAX: i32 = 15;
}

/// Frame buffer pool sizing
pub mod pool {
    /// Free buffers kept per (width, height, layout) shape
    ///
    /// Three covers one frame being normalized, one being transformed and
    /// one parked in the render handoff.
    pub const DEFAULT_CAPACITY_PER_SHAPE: usize = 3;
}

/// Render loop and surface defaults
pub mod render {
    use super::Duration;

    /// Default redraw cadence when no display vsync is available
    pub const DEFAULT_RENDER_FPS: u32 = 60;
    /// Upper bound on the configurable redraw cadence
    pub const MAX_RENDER_FPS: u32 = 240;

    /// Default offscreen surface size
    pub const DEFAULT_SURFACE_WIDTH: u32 = 1280;
    pub const DEFAULT_SURFACE_HEIGHT: u32 = 720;

    /// Texture format used for uploaded frames
    pub const FRAME_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    /// Color format of the offscreen surface
    pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// Convert a redraw rate into a tick interval
    pub fn frame_interval(fps: u32) -> Duration {
        let fps = fps.clamp(1, MAX_RENDER_FPS);
        Duration::from_micros(1_000_000 / fps as u64)
    }
}

/// Synthetic capture source defaults
pub mod capture {
    /// Default synthetic frame width
    pub const DEFAULT_WIDTH: u32 = 640;
    /// Default synthetic frame height
    pub const DEFAULT_HEIGHT: u32 = 480;
    /// Default synthetic capture rate
    pub const DEFAULT_FPS: u32 = 30;
}

/// File names used by the configuration and shader loaders
pub mod files {
    /// Application directory name under the platform config dir
    pub const APP_DIR: &str = "edgecam";
    /// Configuration file name
    pub const CONFIG_FILE: &str = "config.json";
    /// Vertex shader file name inside a shader directory
    pub const VERTEX_SHADER: &str = "quad.vert.wgsl";
    /// Fragment shader file name inside a shader directory
    pub const FRAGMENT_SHADER: &str = "quad.frag.wgsl";
}
