// SPDX-License-Identifier: GPL-3.0-only
//! Shader sources for the preview quad
//!
//! The renderer needs two WGSL programs: a vertex stage (`vs_main`) and a
//! fragment stage (`fs_main`). Built-in copies are embedded at compile time;
//! a shader directory can override both.

mod gpu_processor;

pub use gpu_processor::{CachedDimensions, read_buffer_async};

use crate::constants::files::{FRAGMENT_SHADER, VERTEX_SHADER};
use crate::errors::{RenderError, RenderResult, ShaderStage};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// Embedded vertex stage
pub const QUAD_VERTEX_SHADER: &str = include_str!("quad.vert.wgsl");
/// Embedded fragment stage
pub const QUAD_FRAGMENT_SHADER: &str = include_str!("quad.frag.wgsl");

/// Vertex entry point name
pub const VERTEX_ENTRY: &str = "vs_main";
/// Fragment entry point name
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Vertex and fragment WGSL sources
#[derive(Debug, Clone)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl ShaderSources {
    /// Sources compiled into the binary
    pub fn builtin() -> Self {
        Self {
            vertex: Cow::Borrowed(QUAD_VERTEX_SHADER),
            fragment: Cow::Borrowed(QUAD_FRAGMENT_SHADER),
        }
    }

    /// Read `quad.vert.wgsl` and `quad.frag.wgsl` from `dir`
    ///
    /// Sources are only read here; compile errors surface when the renderer
    /// is created.
    pub fn load(dir: &Path) -> RenderResult<Self> {
        let read = |stage: ShaderStage, name: &str| {
            let path = dir.join(name);
            debug!(path = %path.display(), %stage, "Loading shader source");
            std::fs::read_to_string(&path).map_err(|e| RenderError::ShaderLoad {
                stage,
                path,
                message: e.to_string(),
            })
        };

        Ok(Self {
            vertex: Cow::Owned(read(ShaderStage::Vertex, VERTEX_SHADER)?),
            fragment: Cow::Owned(read(ShaderStage::Fragment, FRAGMENT_SHADER)?),
        })
    }

    /// Built-in sources, or the ones in `dir` when given
    pub fn resolve(dir: Option<&Path>) -> RenderResult<Self> {
        match dir {
            Some(dir) => Self::load(dir),
            None => Ok(Self::builtin()),
        }
    }
}
