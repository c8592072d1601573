// SPDX-License-Identifier: GPL-3.0-only

//! Reusable frame buffers
//!
//! Buffers crossing the capture → transform → render boundary come from a
//! shared [`FrameBufferPool`] so steady-state streaming does not allocate
//! per frame. Free buffers are keyed by [`FrameShape`]; a request for a shape
//! with no free buffer allocates a new one.
//!
//! Ownership is enforced by moves: [`FrameBufferPool::acquire`] hands out an
//! owned [`Frame`] and [`FrameBufferPool::release`] takes it back, so a buffer
//! can never be held by the pool and a stage at the same time.

use crate::backends::camera::{ChannelLayout, Frame, FrameShape};
use crate::constants;
use crate::errors::{FrameError, FrameResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Allocation and reuse counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers created by the allocator
    pub allocations: u64,
    /// Requests served from the free list
    pub reuses: u64,
    /// Released buffers freed because the shape's free list was full
    pub discarded: u64,
}

/// Shared pool of frame buffers
pub struct FrameBufferPool {
    free: Mutex<HashMap<FrameShape, Vec<Vec<u8>>>>,
    capacity_per_shape: usize,
    allocations: AtomicU64,
    reuses: AtomicU64,
    discarded: AtomicU64,
}

impl FrameBufferPool {
    /// Create a pool that keeps at most `capacity_per_shape` free buffers per shape
    pub fn new(capacity_per_shape: usize) -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
            capacity_per_shape,
            allocations: AtomicU64::new(0),
            reuses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Get a buffer sized for `width x height` in `layout`
    ///
    /// Reuses a released buffer of the identical shape when one is free.
    /// Contents of a reused buffer are unspecified; callers overwrite them.
    pub fn acquire(&self, width: u32, height: u32, layout: ChannelLayout) -> FrameResult<Frame> {
        let shape = FrameShape {
            width,
            height,
            layout,
        };
        let len = layout.buffer_len(width, height)?;

        let recycled = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.get_mut(&shape).and_then(Vec::pop));

        if let Some(data) = recycled {
            self.reuses.fetch_add(1, Ordering::Relaxed);
            trace!(width, height, %layout, "Reusing pooled frame buffer");
            return Ok(Frame {
                width,
                height,
                layout,
                data,
            });
        }

        let frame = Frame::allocate(width, height, layout).inspect_err(|_| {
            warn!(width, height, %layout, bytes = len, "Frame buffer allocation failed");
        })?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        debug!(width, height, %layout, bytes = len, "Allocated frame buffer");
        Ok(frame)
    }

    /// Return ownership of a buffer to the pool
    ///
    /// The buffer is freed instead when its shape already has
    /// `capacity_per_shape` free buffers.
    pub fn release(&self, frame: Frame) {
        let shape = frame.shape();
        let Ok(mut free) = self.free.lock() else {
            return;
        };
        let list = free.entry(shape).or_default();
        if list.len() >= self.capacity_per_shape {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(?shape, "Pool full for shape, freeing buffer");
            return;
        }
        list.push(frame.data);
    }

    /// Number of free buffers currently held for a shape
    pub fn free_count(&self, shape: FrameShape) -> usize {
        self.free
            .lock()
            .map(|free| free.get(&shape).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Drop every free buffer
    ///
    /// Useful after a resolution change when the old shape will not return.
    pub fn clear(&self) {
        if let Ok(mut free) = self.free.lock() {
            free.clear();
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameBufferPool {
    fn default() -> Self {
        Self::new(constants::pool::DEFAULT_CAPACITY_PER_SHAPE)
    }
}

impl std::fmt::Debug for FrameBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferPool")
            .field("capacity_per_shape", &self.capacity_per_shape)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Reject an oversize request before it reaches the allocator
///
/// Used by sources that learn their dimensions from untrusted headers.
pub fn check_request(
    width: u32,
    height: u32,
    layout: ChannelLayout,
    max_bytes: usize,
) -> FrameResult<()> {
    let len = layout.buffer_len(width, height)?;
    if len > max_bytes {
        return Err(FrameError::Allocation { bytes: len });
    }
    Ok(())
}
