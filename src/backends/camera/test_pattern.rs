// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic frame source
//!
//! Produces a scrolling gradient with a bright vertical bar in any of the
//! supported channel layouts. Edges in the pattern move every frame, which
//! makes transform output easy to eyeball.

use super::{CapturedFrame, ChannelLayout, FrameClock, FrameSource};
use crate::errors::FrameResult;

/// Animated test-pattern source
#[derive(Debug)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    channels: u32,
    clock: FrameClock,
    buffer: Vec<u8>,
}

impl TestPatternSource {
    /// Create a source for `width x height` frames with `channels` channels
    ///
    /// `channels` is passed through to the pipeline as-is, so unsupported
    /// counts can be used to exercise frame rejection. The buffer is sized
    /// for the nearest supported layout in that case.
    pub fn new(width: u32, height: u32, channels: u32, fps: u32) -> FrameResult<Self> {
        let layout = ChannelLayout::from_channels(channels).unwrap_or(ChannelLayout::Gray8);
        let len = layout.buffer_len(width, height)?;
        Ok(Self {
            width,
            height,
            channels,
            clock: FrameClock::new(fps),
            buffer: vec![0; len],
        })
    }

    /// Stop after `limit` frames
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.clock = self.clock.with_frame_limit(limit);
        self
    }

    /// Deliver frames as fast as they are requested
    pub fn unpaced(mut self) -> Self {
        self.clock = self.clock.unpaced();
        self
    }

    fn render(&mut self, frame_index: u64) {
        let width = self.width as usize;
        let channels = (self.buffer.len() / (width * self.height as usize)).max(1);
        let offset = (frame_index * 4) as usize;
        let bar_x = offset % width;
        let bar_width = (width / 16).max(1);

        for (y, row) in self.buffer.chunks_exact_mut(width * channels).enumerate() {
            for (x, px) in row.chunks_exact_mut(channels).enumerate() {
                let in_bar = x >= bar_x && x < bar_x + bar_width;
                let luma = if in_bar {
                    255
                } else {
                    let ramp = ((x + offset) % width) * 127 / width;
                    (ramp + y * 127 / self.height as usize) as u8
                };
                match channels {
                    1 => px[0] = luma,
                    3 => px.copy_from_slice(&[luma / 2, luma, 255 - luma]),
                    _ => px.copy_from_slice(&[255 - luma, luma, luma / 2, 255]),
                }
            }
        }
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn next_frame(&mut self) -> Option<CapturedFrame<'_>> {
        let index = self.clock.frames_emitted();
        let timestamp_ms = self.clock.tick()?;
        self.render(index);
        Some(CapturedFrame {
            data: &self.buffer,
            width: self.width,
            height: self.height,
            channels: self.channels,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_match_declared_layout() {
        for channels in [1, 3, 4] {
            let mut source = TestPatternSource::new(32, 24, channels, 30)
                .unwrap()
                .unpaced()
                .with_frame_limit(Some(2));
            let frame = source.next_frame().unwrap();
            assert_eq!(frame.data.len(), (32 * 24 * channels) as usize);
            assert!(frame.layout().is_ok());
        }
    }

    #[test]
    fn test_frame_limit() {
        let mut source = TestPatternSource::new(8, 8, 1, 30)
            .unwrap()
            .unpaced()
            .with_frame_limit(Some(2));
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_unsupported_channels_rejected_downstream() {
        let mut source = TestPatternSource::new(8, 8, 2, 30).unwrap().unpaced();
        let frame = source.next_frame().unwrap();
        assert!(frame.layout().is_err());
    }

    #[test]
    fn test_pattern_moves() {
        let mut source = TestPatternSource::new(64, 4, 1, 30).unwrap().unpaced();
        let first = source.next_frame().unwrap().data.to_vec();
        let second = source.next_frame().unwrap().data.to_vec();
        assert_ne!(first, second);
    }
}
