// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format normalization into the canonical RGBA layout
//!
//! Capture sources deliver grayscale, BGR or RGBA buffers. Everything
//! downstream of the capture callback works on [`CanonicalFrame`]s, so this
//! is the single place channel layouts are converted.

use super::types::{CanonicalFrame, CapturedFrame, ChannelLayout};
use crate::errors::FrameResult;
use crate::pipelines::pool::FrameBufferPool;

/// Expand 8-bit grayscale to RGBA (R = G = B = luma, opaque alpha)
pub fn gray_to_rgba_into(gray: &[u8], rgba: &mut [u8]) {
    for (dst, &y) in rgba.chunks_exact_mut(4).zip(gray) {
        dst.copy_from_slice(&[y, y, y, 255]);
    }
}

/// Convert blue-first BGR to RGBA with opaque alpha
pub fn bgr_to_rgba_into(bgr: &[u8], rgba: &mut [u8]) {
    for (dst, src) in rgba.chunks_exact_mut(4).zip(bgr.chunks_exact(3)) {
        dst.copy_from_slice(&[src[2], src[1], src[0], 255]);
    }
}

/// Normalize a captured frame into a pool-owned canonical frame
///
/// Validates the channel count, dimensions and buffer length first.
/// Nothing is acquired from the pool if validation fails, and the captured
/// buffer is never retained.
pub fn normalize(
    captured: &CapturedFrame<'_>,
    pool: &FrameBufferPool,
) -> FrameResult<CanonicalFrame> {
    let layout = captured.layout()?;
    let mut frame = pool.acquire(captured.width, captured.height, ChannelLayout::Rgba32)?;

    match layout {
        ChannelLayout::Gray8 => gray_to_rgba_into(captured.data, frame.data_mut()),
        ChannelLayout::Bgr24 => bgr_to_rgba_into(captured.data, frame.data_mut()),
        ChannelLayout::Rgba32 => frame.data_mut().copy_from_slice(captured.data),
    }

    CanonicalFrame::new(frame, captured.timestamp_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(data: &[u8], width: u32, height: u32, channels: u32) -> CapturedFrame<'_> {
        CapturedFrame {
            data,
            width,
            height,
            channels,
            timestamp_ms: 42,
        }
    }

    #[test]
    fn test_gray_to_rgba() {
        let pool = FrameBufferPool::new(1);
        let gray = [0u8, 128, 255, 7];
        let out = normalize(&captured(&gray, 2, 2, 1), &pool).unwrap();
        assert_eq!(
            out.data(),
            &[
                0, 0, 0, 255, 128, 128, 128, 255, 255, 255, 255, 255, 7, 7, 7, 255
            ]
        );
        assert_eq!(out.timestamp_ms(), 42);
    }

    #[test]
    fn test_bgr_to_rgba_swaps_channels() {
        let pool = FrameBufferPool::new(1);
        // One blue pixel, one red pixel
        let bgr = [255u8, 0, 0, 0, 0, 255];
        let out = normalize(&captured(&bgr, 2, 1, 3), &pool).unwrap();
        assert_eq!(out.data(), &[0, 0, 255, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn test_rgba_copied_unchanged() {
        let pool = FrameBufferPool::new(1);
        let rgba: Vec<u8> = (0..16).collect();
        let out = normalize(&captured(&rgba, 2, 2, 4), &pool).unwrap();
        assert_eq!(out.data(), rgba.as_slice());
    }

    #[test]
    fn test_rejected_frame_acquires_nothing() {
        let pool = FrameBufferPool::new(1);
        let data = [0u8; 8];
        assert!(normalize(&captured(&data, 2, 2, 2), &pool).is_err());
        assert_eq!(pool.stats().allocations, 0);
    }
}
