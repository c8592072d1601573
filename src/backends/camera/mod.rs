// SPDX-License-Identifier: GPL-3.0-only

//! Frame sources
//!
//! A [`FrameSource`] delivers one [`CapturedFrame`] per call, serialized by
//! construction: the next frame cannot be requested while the previous one
//! is still borrowed.
//!
//! ```text
//! ┌───────────────┐   CapturedFrame    ┌─────────────────────┐
//! │  FrameSource  │ ─────────────────▶ │ PipelineCoordinator │
//! └───────────────┘  (borrowed data)   └─────────────────────┘
//! ```

pub mod format_converters;
pub mod frame_loop;
pub mod image_source;
pub mod test_pattern;
pub mod types;

pub use frame_loop::{LoopAction, LoopController};
pub use image_source::ImageSource;
pub use test_pattern::TestPatternSource;
pub use types::*;

/// Producer of captured frames
///
/// Implementations pace themselves. `next_frame` blocks until the next
/// frame is due and returns `None` once the source is exhausted.
pub trait FrameSource {
    /// Human-readable source name for logs
    fn name(&self) -> &str;

    /// Deliver the next frame
    ///
    /// The returned data is only valid until the next call.
    fn next_frame(&mut self) -> Option<CapturedFrame<'_>>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self) -> Option<CapturedFrame<'_>> {
        (**self).next_frame()
    }
}

/// Frame timing shared by the bundled sources
///
/// Paced sources sleep until each frame is due and stamp frames with wall
/// time since start. Unpaced sources return immediately and stamp frames
/// with their nominal time, which keeps tests deterministic.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval_ms: f64,
    paced: bool,
    start: std::time::Instant,
    frames_emitted: u64,
    frame_limit: Option<u64>,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            interval_ms: 1000.0 / fps.max(1) as f64,
            paced: true,
            start: std::time::Instant::now(),
            frames_emitted: 0,
            frame_limit: None,
        }
    }

    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Wait for the next frame slot and return its timestamp in ms
    ///
    /// Returns `None` once the frame limit is reached.
    pub fn tick(&mut self) -> Option<u64> {
        if self
            .frame_limit
            .is_some_and(|limit| self.frames_emitted >= limit)
        {
            return None;
        }

        let nominal_ms = self.frames_emitted as f64 * self.interval_ms;
        self.frames_emitted += 1;

        if !self.paced {
            return Some(nominal_ms.round() as u64);
        }

        let due = self.start + std::time::Duration::from_secs_f64(nominal_ms / 1000.0);
        let now = std::time::Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
        Some(self.start.elapsed().as_millis() as u64)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpaced_clock_timestamps() {
        let mut clock = FrameClock::new(10).unpaced().with_frame_limit(Some(3));
        assert_eq!(clock.tick(), Some(0));
        assert_eq!(clock.tick(), Some(100));
        assert_eq!(clock.tick(), Some(200));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.frames_emitted(), 3);
    }

    #[test]
    fn test_paced_clock_is_monotonic() {
        let mut clock = FrameClock::new(200).with_frame_limit(Some(3));
        let a = clock.tick().unwrap();
        let b = clock.tick().unwrap();
        let c = clock.tick().unwrap();
        assert!(a <= b && b <= c);
        assert!(c >= 10);
    }
}
