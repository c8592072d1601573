// SPDX-License-Identifier: GPL-3.0-only

//! Shared frame types for capture sources and the pipeline

use crate::errors::{FrameError, FrameResult};
use serde::{Deserialize, Serialize};

/// Pixel channel layout of a frame buffer
///
/// Three-channel captures arrive blue-first, the ordering most camera
/// stacks deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Single 8-bit luma channel
    Gray8,
    /// 8-bit blue, green, red
    Bgr24,
    /// 8-bit red, green, blue, alpha (canonical)
    Rgba32,
}

impl ChannelLayout {
    /// Map a raw channel count to a layout
    ///
    /// Returns `None` for counts the pipeline cannot normalize.
    pub fn from_channels(channels: u32) -> Option<Self> {
        match channels {
            1 => Some(ChannelLayout::Gray8),
            3 => Some(ChannelLayout::Bgr24),
            4 => Some(ChannelLayout::Rgba32),
            _ => None,
        }
    }

    /// Number of bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Gray8 => 1,
            ChannelLayout::Bgr24 => 3,
            ChannelLayout::Rgba32 => 4,
        }
    }

    /// Expected buffer length for a `width x height` frame in this layout
    ///
    /// Fails on zero or overflowing dimensions.
    pub fn buffer_len(&self, width: u32, height: u32) -> FrameResult<usize> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(self.channels()))
            .ok_or(FrameError::InvalidDimensions { width, height })
    }
}

impl std::fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelLayout::Gray8 => write!(f, "GRAY8"),
            ChannelLayout::Bgr24 => write!(f, "BGR24"),
            ChannelLayout::Rgba32 => write!(f, "RGBA"),
        }
    }
}

/// A frame as delivered by a capture source
///
/// The pixel data is borrowed from the source for the duration of one
/// callback. Anything kept past that point must be copied into pool memory.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    /// Raw pixel bytes, tightly packed (`stride == width * channels`)
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Raw channel count as reported by the source
    pub channels: u32,
    /// Capture timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl<'a> CapturedFrame<'a> {
    /// Resolve and validate the layout of this frame
    ///
    /// Checks the channel count, the dimensions and the buffer length.
    pub fn layout(&self) -> FrameResult<ChannelLayout> {
        let layout = ChannelLayout::from_channels(self.channels).ok_or(
            FrameError::UnsupportedChannels {
                channels: self.channels,
            },
        )?;
        let expected = layout.buffer_len(self.width, self.height)?;
        if self.data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(layout)
    }
}

/// A pool-owned pixel buffer
///
/// Exactly one pipeline stage owns a `Frame` at a time. Handing it
/// downstream moves it.
#[derive(PartialEq, Eq)]
pub struct Frame {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) layout: ChannelLayout,
    pub(crate) data: Vec<u8>,
}

impl Frame {
    /// Allocate a zeroed frame outside of any pool
    ///
    /// Allocation failure is reported rather than aborting.
    pub fn allocate(width: u32, height: u32, layout: ChannelLayout) -> FrameResult<Self> {
        let len = layout.buffer_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| FrameError::Allocation { bytes: len })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Pool key for this frame's shape
    pub fn shape(&self) -> FrameShape {
        FrameShape {
            width: self.width,
            height: self.height,
            layout: self.layout,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame({}x{} {}, {} bytes)",
            self.width,
            self.height,
            self.layout,
            self.data.len()
        )
    }
}

/// Dimensions plus layout, the key buffers are reused under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
    pub layout: ChannelLayout,
}

/// A frame in the canonical 4-channel RGBA layout
///
/// Invariant: `data().len() == width * height * 4`. This is the only
/// format the transform stage and the texture uploader accept.
#[derive(Debug, PartialEq, Eq)]
pub struct CanonicalFrame {
    frame: Frame,
    timestamp_ms: u64,
}

impl CanonicalFrame {
    /// Wrap an RGBA frame, checking the layout and length invariant
    pub fn new(frame: Frame, timestamp_ms: u64) -> FrameResult<Self> {
        if frame.layout != ChannelLayout::Rgba32 {
            return Err(FrameError::UnsupportedChannels {
                channels: frame.layout.channels() as u32,
            });
        }
        let expected = ChannelLayout::Rgba32.buffer_len(frame.width, frame.height)?;
        if frame.data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: frame.data.len(),
            });
        }
        Ok(Self {
            frame,
            timestamp_ms,
        })
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn data(&self) -> &[u8] {
        &self.frame.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.frame.data
    }

    /// Give up the canonical wrapper, e.g. to return the buffer to a pool
    pub fn into_frame(self) -> Frame {
        self.frame
    }
}
