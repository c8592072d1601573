// SPDX-License-Identifier: GPL-3.0-only

//! Still-image frame source
//!
//! Decodes an image file once and replays it as a stream. Useful for
//! checking transform output against a known picture.

use super::{CapturedFrame, ChannelLayout, FrameClock, FrameSource};
use crate::errors::AppResult;
use crate::pipelines::pool::check_request;
use std::path::Path;
use tracing::info;

/// Largest decoded frame accepted from an image file (8K RGBA)
const MAX_IMAGE_BYTES: usize = 7680 * 4320 * 4;

/// Replays a decoded image at a fixed rate
#[derive(Debug)]
pub struct ImageSource {
    name: String,
    width: u32,
    height: u32,
    layout: ChannelLayout,
    clock: FrameClock,
    pixels: Vec<u8>,
}

impl ImageSource {
    /// Decode `path` into `layout`
    ///
    /// `Bgr24` stores the image blue-first, matching camera output.
    pub fn open(path: &Path, layout: ChannelLayout, fps: u32) -> AppResult<Self> {
        let image = image::open(path)?;
        let (width, height) = (image.width(), image.height());
        check_request(width, height, layout, MAX_IMAGE_BYTES)?;

        let pixels = match layout {
            ChannelLayout::Gray8 => image.into_luma8().into_raw(),
            ChannelLayout::Bgr24 => {
                let mut rgb = image.into_rgb8().into_raw();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                rgb
            }
            ChannelLayout::Rgba32 => image.into_rgba8().into_raw(),
        };

        info!(path = %path.display(), width, height, %layout, "Loaded image source");

        Ok(Self {
            name: display_name(path),
            width,
            height,
            layout,
            clock: FrameClock::new(fps),
            pixels,
        })
    }

    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.clock = self.clock.with_frame_limit(limit);
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl FrameSource for ImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self) -> Option<CapturedFrame<'_>> {
        let timestamp_ms = self.clock.tick()?;
        Some(CapturedFrame {
            data: &self.pixels,
            width: self.width,
            height: self.height,
            channels: self.layout.channels() as u32,
            timestamp_ms,
        })
    }
}
