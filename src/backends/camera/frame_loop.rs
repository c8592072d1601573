// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle for the capture and render loops
//!
//! Each pipeline context runs on its own named thread driven by a
//! [`LoopController`]. The controller owns the stop signal and the join
//! handle; stopping always waits for the current iteration to finish, so a
//! frame is never abandoned halfway through an upload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by a loop iteration to control the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run another iteration
    Continue,
    /// Exit the loop gracefully
    Stop,
}

/// Controller for a loop running on a dedicated thread
///
/// # Example
///
/// ```ignore
/// let mut controller = LoopController::start("capture", move || {
///     match source.next_frame() {
///         Some(frame) => {
///             coordinator.on_frame(&frame);
///             LoopAction::Continue
///         }
///         None => LoopAction::Stop,
///     }
/// });
///
/// controller.stop();
/// ```
pub struct LoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl LoopController {
    /// Start a loop that calls `loop_fn` until it returns `LoopAction::Stop`
    /// or the controller is stopped
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Start a loop whose state is created on the loop thread itself
    ///
    /// `init_fn` runs once on the new thread. The state it returns never
    /// leaves that thread, so it does not need to be `Send`; GPU objects
    /// that must stay on one context live here. If initialization fails the
    /// thread exits without running `loop_fn`. The state is dropped on the
    /// loop thread when the loop ends.
    pub fn start_with_init<S, I, F>(name: &str, init_fn: I, mut loop_fn: F) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting loop");

        let spawn_result = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Loop thread started, initializing");

                let mut state = match init_fn() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(name = %name_clone, error = %e, "Loop initialization failed");
                        return;
                    }
                };

                while !stop_signal_clone.load(Ordering::SeqCst) {
                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }

                drop(state);
                info!(name = %name_clone, "Loop thread exiting");
            });

        let thread_handle = match spawn_result {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn loop thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Start a loop that runs at a fixed cadence
    ///
    /// Each iteration is scheduled `interval` after the previous one was
    /// scheduled. An iteration that overruns is followed immediately by the
    /// next one instead of trying to catch up on missed ticks.
    pub fn start_paced<S, I, F>(
        name: &str,
        interval: Duration,
        init_fn: I,
        mut tick_fn: F,
    ) -> Self
    where
        S: 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let mut next_tick: Option<Instant> = None;
        Self::start_with_init(name, init_fn, move |state| {
            let now = Instant::now();
            if let Some(deadline) = next_tick
                && deadline > now
            {
                thread::sleep(deadline - now);
            }
            let scheduled = next_tick.map_or(now, |deadline| deadline.max(now));
            next_tick = Some(scheduled + interval);
            tick_fn(state)
        })
    }

    /// Check if the loop thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    ///
    /// Returns once the in-flight iteration has completed and the loop
    /// state has been dropped.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    ///
    /// Useful if the loop stops itself via `LoopAction::Stop`.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Loop thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "LoopController dropped, stopping loop");
            self.stop();
        }
    }
}
