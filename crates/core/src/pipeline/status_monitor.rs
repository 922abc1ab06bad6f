use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::pipeline::listeners::StatusListener;

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Running,
}

/// Why a session left the running state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called or the consumer asked to shut down.
    Requested,
    /// A finite source ran out of frames.
    EndOfStream,
    /// Capture or detection failed mid-session.
    ProducerFault(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stop requested"),
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::ProducerFault(msg) => write!(f, "producer fault: {msg}"),
        }
    }
}

/// Level-triggered running/stopped flag shared by producer and consumer.
///
/// A monitor belongs to one session. It starts out stopped, enters running
/// once when the session starts, and never returns to running after a stop.
/// Reads are a single atomic load and safe to poll on every iteration.
pub struct StatusMonitor {
    state: AtomicU8,
    reason: Mutex<Option<StopReason>>,
}

impl StatusMonitor {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CREATED),
            reason: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    pub fn state(&self) -> LifecycleState {
        if self.is_running() {
            LifecycleState::Running
        } else {
            LifecycleState::Stopped
        }
    }

    /// `true` enters running (only from the initial state); `false` is a
    /// requested stop.
    pub fn set_running(&self, running: bool) {
        if running {
            if self
                .state
                .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                log::warn!("Ignoring restart of a stopped session monitor");
            }
        } else {
            self.stop(StopReason::Requested);
        }
    }

    /// Records an unrecoverable producer failure and stops.
    pub fn fail(&self, message: impl Into<String>) {
        self.stop(StopReason::ProducerFault(message.into()));
    }

    /// The first reason recorded for leaving the running state.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.reason
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn stop(&self, reason: StopReason) {
        {
            let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.state.store(STOPPED, Ordering::Release);
    }
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusListener for StatusMonitor {
    fn on_running(&self) {
        self.set_running(true);
    }

    fn on_stopped(&self, reason: StopReason) {
        self.stop(reason);
    }
}
