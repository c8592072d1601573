// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities
//!
//! Creates the wgpu device the render context draws with. No window surface
//! is required; the preview renders into an offscreen texture when headless.

use crate::errors::{RenderError, RenderResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, GL)
    pub backend: wgpu::Backend,
    /// Adapter class (discrete, integrated, software)
    pub device_type: wgpu::DeviceType,
    /// Largest supported 2D texture edge
    pub max_texture_dimension: u32,
}

impl std::fmt::Display for GpuDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?}, max texture {})",
            self.adapter_name, self.backend, self.device_type, self.max_texture_dimension
        )
    }
}

/// Create a wgpu device and queue for rendering
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
///
/// # Returns
///
/// A tuple of (Device, Queue, GpuDeviceInfo), or `RenderError::Device`
/// when no adapter or device is available
pub async fn create_render_device(
    label: &str,
) -> RenderResult<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo)> {
    info!(label = label, "Creating GPU device for rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::Device(format!("Failed to find suitable GPU adapter: {}", e)))?;

    let adapter_info = adapter.get_info();
    let adapter_limits = adapter.limits();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for rendering"
    );

    debug!(
        max_texture_dimension_2d = adapter_limits.max_texture_dimension_2d,
        "Adapter limits"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults()
                .using_resolution(adapter_limits.clone()),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| RenderError::Device(format!("Failed to create GPU device: {}", e)))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        device_type: adapter_info.device_type,
        max_texture_dimension: adapter_limits.max_texture_dimension_2d,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_render_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_render_device("test_device").await {
            Ok((device, queue, info)) => {
                println!("Created device: {}", info);
                assert!(info.max_texture_dimension >= 2048);
                drop(queue);
                drop(device);
            }
            Err(e) => {
                // Skip if no GPU available
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
