use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::shared::constants::FRAME_RATE_WINDOW;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Capture,
    Processing,
}

#[derive(Clone, Copy, Debug)]
struct FrameRateSample {
    timestamp: Duration,
    role: Role,
}

/// Sliding window over the most recent event timestamps of one role.
///
/// The rate is published to an atomic on every record, so readers never take
/// the history lock.
struct RateWindow {
    samples: Mutex<VecDeque<Duration>>,
    published: AtomicU64,
    capacity: usize,
}

impl RateWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            published: AtomicU64::new(0f64.to_bits()),
            capacity,
        }
    }

    fn record(&self, timestamp: Duration) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        // An earlier timestamp means the capture clock restarted.
        if samples.back().is_some_and(|last| timestamp < *last) {
            samples.clear();
        }
        samples.push_back(timestamp);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
        let rate = window_rate(&samples);
        self.published.store(rate.to_bits(), Ordering::Release);
    }

    fn rate(&self) -> f64 {
        f64::from_bits(self.published.load(Ordering::Acquire))
    }

    fn reset(&self) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.clear();
        self.published.store(0f64.to_bits(), Ordering::Release);
    }
}

fn window_rate(samples: &VecDeque<Duration>) -> f64 {
    let (Some(oldest), Some(newest)) = (samples.front(), samples.back()) else {
        return 0.0;
    };
    let span = newest.saturating_sub(*oldest).as_secs_f64();
    if samples.len() < 2 || span <= 0.0 {
        return 0.0;
    }
    (samples.len() - 1) as f64 / span
}

/// Rolling capture and processing frame-rate estimates.
///
/// Capture events are recorded by the producer, processing events by the
/// consumer; both may read either rate at any time. Each rate is the number
/// of intervals in the most recent window divided by the time they span, so
/// evenly spaced events converge to their true frequency once the window
/// holds two or more samples. With fewer samples the rate is `0.0`.
pub struct FrameRateTracker {
    capture: RateWindow,
    processing: RateWindow,
}

impl FrameRateTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            capture: RateWindow::new(window),
            processing: RateWindow::new(window),
        }
    }

    pub fn record_capture(&self, timestamp: Duration) {
        self.record(FrameRateSample {
            timestamp,
            role: Role::Capture,
        });
    }

    pub fn record_processed(&self, timestamp: Duration) {
        self.record(FrameRateSample {
            timestamp,
            role: Role::Processing,
        });
    }

    pub fn capture_rate(&self) -> f64 {
        self.capture.rate()
    }

    pub fn processing_rate(&self) -> f64 {
        self.processing.rate()
    }

    /// Forgets all history. Called at every session start.
    pub fn reset(&self) {
        self.capture.reset();
        self.processing.reset();
    }

    fn record(&self, sample: FrameRateSample) {
        match sample.role {
            Role::Capture => self.capture.record(sample.timestamp),
            Role::Processing => self.processing.record(sample.timestamp),
        }
    }
}

impl Default for FrameRateTracker {
    fn default() -> Self {
        Self::new(FRAME_RATE_WINDOW)
    }
}
