//! The rendezvous between emitter and capture tasks of one variation: two
//! one-way latches, polled at a fixed interval. A fresh instance is created
//! for every variation (or sequential sub-iteration) and shared by `Arc`,
//! so no state can leak into the next task set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Latch polling interval. Experiment setup and teardown dominate latency,
/// so a busy-wait at this granularity costs nothing observable.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct AcquisitionSync {
    capture_may_start: AtomicBool,
    emission_may_stop: AtomicBool,
    aborted: AtomicBool,
}

/// Where the task set currently is in its lifecycle, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    AwaitingCapture,
    Streaming,
    Draining,
}

impl AcquisitionSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emitter side: playback is on the air, receivers may begin. In
    /// receive-only mode the orchestrator calls this instead.
    pub fn allow_capture(&self) {
        self.capture_may_start.store(true, Ordering::SeqCst);
    }

    pub fn capture_allowed(&self) -> bool {
        self.capture_may_start.load(Ordering::SeqCst)
    }

    /// Block until capture may start. Returns false if the variation was
    /// aborted by a failing emitter before the latch opened.
    pub fn wait_capture_go(&self) -> bool {
        loop {
            if self.capture_allowed() {
                return true;
            }
            if self.is_aborted() {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Capture side: all records are on disk, emitters may halt playback.
    /// Also raised on the capture failure path so emitters never poll
    /// forever. In transmit-only mode the operator interrupt raises it.
    pub fn release_emitters(&self) {
        self.emission_may_stop.store(true, Ordering::SeqCst);
    }

    pub fn emitters_released(&self) -> bool {
        self.emission_may_stop.load(Ordering::SeqCst)
    }

    /// Block until emission may stop.
    pub fn wait_release(&self) {
        while !self.emitters_released() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// A device task failed before the handshake completed; unblocks any
    /// task still waiting on the capture latch.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn stage(&self) -> SyncStage {
        if self.emitters_released() {
            SyncStage::Draining
        } else if self.capture_allowed() {
            SyncStage::Streaming
        } else {
            SyncStage::AwaitingCapture
        }
    }
}
