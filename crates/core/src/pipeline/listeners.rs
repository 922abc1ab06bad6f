use std::sync::Arc;

use crate::pipeline::frame_rate_tracker::FrameRateTracker;
use crate::pipeline::result_channel::{OverflowPolicy, PushOutcome, ResultChannel};
use crate::pipeline::status_monitor::{StatusMonitor, StopReason};
use crate::shared::face::ResultEnvelope;
use crate::shared::frame::Frame;

/// Receives frames and detection results from a detection session.
///
/// Called on the session's capture thread; implementations must return
/// quickly and never wait on the consumer.
pub trait ImageListener: Send + Sync {
    /// A new session is about to produce its first frame.
    fn on_session_start(&self) {}

    /// Every captured frame, including frames skipped for detection.
    fn on_image_capture(&self, _frame: &Frame) {}

    /// A processed frame together with its faces.
    fn on_image_results(&self, envelope: ResultEnvelope);
}

/// Receives lifecycle changes from a detection session.
pub trait StatusListener: Send + Sync {
    fn on_running(&self);

    fn on_stopped(&self, reason: StopReason);
}

/// The state shared between the capture thread and the consumer loop.
///
/// Cloning shares the same channel, monitor and tracker.
#[derive(Clone)]
pub struct PipelineHandles {
    pub channel: Arc<ResultChannel>,
    pub status: Arc<StatusMonitor>,
    pub rates: Arc<FrameRateTracker>,
}

impl PipelineHandles {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self {
            channel: Arc::new(ResultChannel::new(policy)),
            status: Arc::new(StatusMonitor::new()),
            rates: Arc::new(FrameRateTracker::default()),
        }
    }
}

impl Default for PipelineHandles {
    fn default() -> Self {
        Self::new(OverflowPolicy::default())
    }
}

impl ImageListener for PipelineHandles {
    fn on_session_start(&self) {
        self.rates.reset();
    }

    fn on_image_capture(&self, frame: &Frame) {
        self.rates.record_capture(frame.timestamp());
    }

    fn on_image_results(&self, envelope: ResultEnvelope) {
        let index = envelope.frame().index();
        match self.channel.push(envelope) {
            PushOutcome::Queued => {}
            PushOutcome::EvictedOldest => {
                log::trace!("Consumer behind; evicted oldest result to queue frame {index}")
            }
            PushOutcome::Rejected => {
                log::trace!("Consumer behind; discarded result for frame {index}")
            }
        }
    }
}

impl StatusListener for PipelineHandles {
    fn on_running(&self) {
        self.status.on_running();
    }

    fn on_stopped(&self, reason: StopReason) {
        self.status.on_stopped(reason);
    }
}
