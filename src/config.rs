// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::files::{APP_DIR, CONFIG_FILE};
use crate::constants::pool::DEFAULT_CAPACITY_PER_SHAPE;
use crate::constants::render::{
    DEFAULT_RENDER_FPS, DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH, MAX_RENDER_FPS,
};
use crate::constants::transform::{
    DEFAULT_BLUR_KERNEL_SIZE, DEFAULT_LOWER_THRESHOLD, DEFAULT_UPPER_THRESHOLD,
};
use crate::errors::ConfigError;
use crate::pipelines::TransformParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persistent user settings
///
/// Missing fields take their defaults, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lower hysteresis threshold for edge detection
    pub lower_threshold: i32,
    /// Upper hysteresis threshold for edge detection
    pub upper_threshold: i32,
    /// Blur kernel size applied before edge detection
    pub blur_kernel_size: i32,
    /// Mirror camera preview horizontally (selfie mode)
    pub mirror_preview: bool,
    /// Render ticks per second
    pub render_fps: u32,
    /// Free buffers kept per frame shape
    pub pool_capacity_per_shape: usize,
    /// Offscreen render target width
    pub surface_width: u32,
    /// Offscreen render target height
    pub surface_height: u32,
    /// Directory with `quad.vert.wgsl` and `quad.frag.wgsl` overrides
    pub shader_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lower_threshold: DEFAULT_LOWER_THRESHOLD,
            upper_threshold: DEFAULT_UPPER_THRESHOLD,
            blur_kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
            mirror_preview: true,
            render_fps: DEFAULT_RENDER_FPS,
            pool_capacity_per_shape: DEFAULT_CAPACITY_PER_SHAPE,
            surface_width: DEFAULT_SURFACE_WIDTH,
            surface_height: DEFAULT_SURFACE_HEIGHT,
            shader_dir: None,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/edgecam/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, falling back to defaults if the file does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write as pretty JSON, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_error)?;

        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Transform parameters with out-of-range values corrected
    pub fn transform_params(&self) -> TransformParams {
        TransformParams::new(
            self.lower_threshold,
            self.upper_threshold,
            self.blur_kernel_size,
        )
        .sanitized()
    }

    /// Render rate clamped to 1..=240
    pub fn render_fps(&self) -> u32 {
        self.render_fps.clamp(1, MAX_RENDER_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "lower_threshold": 20, "mirror_preview": false }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.lower_threshold, 20);
        assert!(!config.mirror_preview);
        assert_eq!(config.upper_threshold, DEFAULT_UPPER_THRESHOLD);
        assert_eq!(config.shader_dir, None);
    }

    #[test]
    fn test_render_fps_clamped() {
        let config = Config {
            render_fps: 0,
            ..Default::default()
        };
        assert_eq!(config.render_fps(), 1);

        let config = Config {
            render_fps: 10_000,
            ..Default::default()
        };
        assert_eq!(config.render_fps(), MAX_RENDER_FPS);
    }
}
