// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot handoff from the capture context to the render context
//!
//! The slot holds at most one frame. Publishing replaces whatever the render
//! context has not consumed yet, and the superseded buffer goes straight back
//! to the pool. There is no queue, so memory stays bounded and stale frames
//! are never shown out of order.

use crate::backends::camera::CanonicalFrame;
use crate::pipelines::pool::FrameBufferPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Latest-value slot shared by the capture and render loops
#[derive(Debug)]
pub struct LatestFrameSlot {
    /// Lock is held only to swap the option, never during GPU work
    frame: Mutex<Option<CanonicalFrame>>,
    pool: Arc<FrameBufferPool>,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new(pool: Arc<FrameBufferPool>) -> Self {
        Self {
            frame: Mutex::new(None),
            pool,
            published: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    /// Make `frame` the latest value
    ///
    /// Returns true if an unconsumed frame was replaced.
    pub fn publish(&self, frame: CanonicalFrame) -> bool {
        let previous = self
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);
        self.published.fetch_add(1, Ordering::Relaxed);

        match previous {
            Some(stale) => {
                trace!(
                    timestamp_ms = stale.timestamp_ms(),
                    "Superseded unconsumed frame"
                );
                self.superseded.fetch_add(1, Ordering::Relaxed);
                self.pool.release(stale.into_frame());
                true
            }
            None => false,
        }
    }

    /// Take the latest frame, leaving the slot empty
    pub fn take(&self) -> Option<CanonicalFrame> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Return a consumed frame's buffer to the pool
    pub fn recycle(&self, frame: CanonicalFrame) {
        self.pool.release(frame.into_frame());
    }

    /// Release any unconsumed frame back to the pool
    pub fn drain(&self) {
        if let Some(frame) = self.take() {
            self.recycle(frame);
        }
    }

    /// Whether a frame is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }
}
