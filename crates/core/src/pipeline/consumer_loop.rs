use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::domain::metrics_sink::MetricsSink;
use crate::output::domain::overlay_renderer::OverlayRenderer;
use crate::pipeline::listeners::PipelineHandles;
use crate::pipeline::pipeline_logger::{PipelineLogger, ProgressUpdate};
use crate::pipeline::result_channel::ChannelStats;
use crate::pipeline::status_monitor::StopReason;
use crate::shared::constants::DEFAULT_POLL_WAIT_MS;
use crate::shared::face::ResultEnvelope;

/// How the consumer waits when the channel is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollStrategy {
    /// Re-check immediately. Lowest latency, one core at 100%.
    BusySpin,
    /// Block on the channel for up to the given time.
    Wait(Duration),
}

impl Default for PollStrategy {
    fn default() -> Self {
        PollStrategy::Wait(Duration::from_millis(DEFAULT_POLL_WAIT_MS))
    }
}

/// What the consumer did before it returned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumerReport {
    pub processed: usize,
    pub render_failures: usize,
    pub sink_failures: usize,
    /// Results handled after the session stopped.
    pub drained_after_stop: usize,
    pub stop_reason: Option<StopReason>,
    pub channel: ChannelStats,
}

/// Drains results on the caller's thread while the session runs.
///
/// Each result updates the processing rate, is rendered (if a renderer is
/// set) and written to the sink, then reported through the logger. A failed
/// render or write is logged and counted; the loop keeps going.
pub struct ConsumerLoop {
    handles: PipelineHandles,
    sink: Box<dyn MetricsSink>,
    logger: Box<dyn PipelineLogger>,
    renderer: Option<Box<dyn OverlayRenderer>>,
    cancelled: Arc<AtomicBool>,
    poll: PollStrategy,
    drain_on_stop: bool,
}

impl ConsumerLoop {
    pub fn new(
        handles: PipelineHandles,
        sink: Box<dyn MetricsSink>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            handles,
            sink,
            logger,
            renderer: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            poll: PollStrategy::default(),
            drain_on_stop: true,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn OverlayRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Setting the flag makes `run` return at its next iteration.
    pub fn with_cancel(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_poll(mut self, poll: PollStrategy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_drain_on_stop(mut self, drain: bool) -> Self {
        self.drain_on_stop = drain;
        self
    }

    /// Runs until the session stops or the cancel flag is set.
    ///
    /// Call after the session has started; a monitor that is not running
    /// ends the loop immediately.
    pub fn run(mut self) -> ConsumerReport {
        let mut report = ConsumerReport::default();
        self.logger.info(&format!(
            "Buffering results with overflow policy {}",
            self.handles.channel.policy()
        ));

        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::debug!("Consumer cancelled");
                break;
            }
            if !self.handles.status.is_running() {
                break;
            }
            if let Some(envelope) = self.next_envelope() {
                self.handle(envelope, &mut report);
            }
        }

        if self.drain_on_stop {
            while let Some(envelope) = self.handles.channel.try_drain() {
                self.handle(envelope, &mut report);
                report.drained_after_stop += 1;
            }
        }

        if let Err(e) = self.sink.flush() {
            log::warn!("Failed to flush metrics: {e}");
            report.sink_failures += 1;
        }

        report.channel = self.handles.channel.stats();
        report.stop_reason = self.handles.status.stop_reason();
        self.logger.metric("dropped", report.channel.dropped() as f64);
        self.logger.summary();
        report
    }

    fn next_envelope(&self) -> Option<ResultEnvelope> {
        match self.poll {
            PollStrategy::BusySpin => {
                let envelope = self.handles.channel.try_drain();
                if envelope.is_none() {
                    std::hint::spin_loop();
                }
                envelope
            }
            PollStrategy::Wait(timeout) => self.handles.channel.drain_timeout(timeout),
        }
    }

    fn handle(&mut self, envelope: ResultEnvelope, report: &mut ConsumerReport) {
        let timestamp = envelope.timestamp();
        let rates = &self.handles.rates;
        rates.record_processed(timestamp);

        if let Some(renderer) = self.renderer.as_mut() {
            let started = Instant::now();
            if let Err(e) = renderer.render(envelope.frame(), envelope.faces()) {
                log::warn!("Overlay failed for frame {}: {e}", envelope.frame().index());
                report.render_failures += 1;
            }
            self.logger
                .timing("render", started.elapsed().as_secs_f64() * 1000.0);
        }

        let started = Instant::now();
        if let Err(e) = self.sink.append(timestamp, envelope.faces()) {
            log::warn!("Failed to write metrics for frame {}: {e}", envelope.frame().index());
            report.sink_failures += 1;
        }
        self.logger
            .timing("sink", started.elapsed().as_secs_f64() * 1000.0);

        self.logger
            .metric("queue_depth", self.handles.channel.size() as f64);
        self.logger.progress(&ProgressUpdate {
            timestamp,
            capture_fps: rates.capture_rate(),
            processing_fps: rates.processing_rate(),
            faces: envelope.faces().len(),
        });
        report.processed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::domain::metrics_sink::SinkError;
    use crate::output::domain::overlay_renderer::RenderError;
    use crate::output::infrastructure::image_overlay_renderer::ImageOverlayRenderer;
    use crate::pipeline::listeners::{ImageListener, StatusListener};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::pipeline::status_monitor::StatusMonitor;
    use crate::shared::face::{DetectionResult, Face, FaceId};
    use crate::shared::frame::Frame;
    use crate::shared::region::Region;
    use approx::assert_abs_diff_eq;
    use std::sync::Mutex;
    use std::thread;

    type Rows = Arc<Mutex<Vec<(Duration, usize)>>>;

    struct RecordingSink {
        rows: Rows,
        fail: bool,
    }

    impl MetricsSink for RecordingSink {
        fn append(&mut self, timestamp: Duration, faces: &DetectionResult) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Io(std::io::Error::other("disk full")));
            }
            self.rows.lock().unwrap().push((timestamp, faces.len()));
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    struct FailingOnIndex(usize);

    impl OverlayRenderer for FailingOnIndex {
        fn render(&mut self, frame: &Frame, _faces: &DetectionResult) -> Result<(), RenderError> {
            if frame.index() == self.0 {
                return Err(RenderError::UnsupportedFormat {
                    index: frame.index(),
                    channels: frame.channels(),
                });
            }
            Ok(())
        }
    }

    struct RecordingLogger(Arc<Mutex<Vec<String>>>);

    impl PipelineLogger for RecordingLogger {
        fn progress(&mut self, update: &ProgressUpdate) {
            self.0.lock().unwrap().push(update.line());
        }
        fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
        fn metric(&mut self, _name: &str, _value: f64) {}
        fn info(&mut self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn sink() -> (Box<dyn MetricsSink>, Rows) {
        let rows = Rows::default();
        let sink = RecordingSink {
            rows: rows.clone(),
            fail: false,
        };
        (Box::new(sink), rows)
    }

    fn envelope(index: usize, ms: u64, faces: usize) -> ResultEnvelope {
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, index, Duration::from_millis(ms));
        let result = (0..faces as u32)
            .map(|id| (FaceId(id), Face::new(Region::new(0, 0, 1, 1))))
            .collect();
        ResultEnvelope::new(frame, result)
    }

    fn running_handles() -> PipelineHandles {
        let handles = PipelineHandles::default();
        handles.status.set_running(true);
        handles
    }

    #[test]
    fn test_render_failure_does_not_block_later_results() {
        let handles = running_handles();
        for (i, ms) in [0, 33, 66].into_iter().enumerate() {
            handles.on_image_results(envelope(i, ms, 1));
        }
        handles.status.on_stopped(StopReason::EndOfStream);
        let (sink, rows) = sink();

        let report = ConsumerLoop::new(handles, sink, Box::new(NullPipelineLogger))
            .with_renderer(Box::new(FailingOnIndex(1)))
            .run();

        assert_eq!(report.processed, 3);
        assert_eq!(report.render_failures, 1);
        let rows = rows.lock().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].0, Duration::from_millis(66));
    }

    #[test]
    fn test_far_off_boxes_are_skipped_by_overlay() {
        let handles = running_handles();
        for (i, ms) in [0, 33].into_iter().enumerate() {
            let frame = Frame::new(vec![0u8; 3], 1, 1, 3, i, Duration::from_millis(ms));
            let faces = [(FaceId(0), Face::new(Region::new(i32::MAX - 5, 0, 100, 10)))]
                .into_iter()
                .collect();
            handles.on_image_results(ResultEnvelope::new(frame, faces));
        }
        handles.status.on_stopped(StopReason::EndOfStream);
        let (sink, rows) = sink();

        let report = ConsumerLoop::new(handles, sink, Box::new(NullPipelineLogger))
            .with_renderer(Box::new(ImageOverlayRenderer::new()))
            .run();

        assert_eq!(report.processed, 2);
        assert_eq!(report.render_failures, 0);
        assert_eq!(rows.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_logger_receives_policy_then_progress() {
        let handles = running_handles();
        handles.on_image_results(envelope(0, 1234, 1));
        handles.status.on_stopped(StopReason::EndOfStream);
        let (sink, _rows) = sink();
        let lines = Arc::new(Mutex::new(Vec::new()));

        ConsumerLoop::new(handles, sink, Box::new(RecordingLogger(lines.clone()))).run();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Buffering results with overflow policy"));
        assert!(lines[1].starts_with("timestamp: 1.23 cfps:"));
        assert!(lines[1].ends_with("faces: 1"));
    }

    #[test]
    fn test_sink_failures_are_counted() {
        let handles = running_handles();
        handles.on_image_results(envelope(0, 0, 0));
        handles.on_image_results(envelope(1, 10, 0));
        handles.status.set_running(false);
        let failing = RecordingSink {
            rows: Rows::default(),
            fail: true,
        };

        let report = ConsumerLoop::new(handles, Box::new(failing), Box::new(NullPipelineLogger)).run();

        assert_eq!(report.processed, 2);
        assert_eq!(report.sink_failures, 2);
    }

    #[test]
    fn test_results_reach_sink_in_capture_order() {
        let handles = running_handles();
        let producer = {
            let handles = handles.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    handles.on_image_results(envelope(i, i as u64 * 10, i % 3));
                }
                handles.status.on_stopped(StopReason::EndOfStream);
            })
        };
        let (sink, rows) = sink();

        let report = ConsumerLoop::new(handles.clone(), sink, Box::new(NullPipelineLogger))
            .with_poll(PollStrategy::BusySpin)
            .run();
        producer.join().unwrap();

        let rows = rows.lock().unwrap();
        assert_eq!(rows.len() as u64, 200 - report.channel.dropped());
        assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(report.stop_reason, Some(StopReason::EndOfStream));
    }

    #[test]
    fn test_stop_ends_waiting_loop() {
        let handles = running_handles();
        let status: Arc<StatusMonitor> = handles.status.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            status.set_running(false);
        });
        let (sink, _) = sink();

        let report = ConsumerLoop::new(handles, sink, Box::new(NullPipelineLogger)).run();
        stopper.join().unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(report.stop_reason, Some(StopReason::Requested));
    }

    #[test]
    fn test_cancel_flag_ends_loop_while_running() {
        let handles = running_handles();
        let cancelled = Arc::new(AtomicBool::new(true));
        let (sink, _) = sink();

        let report = ConsumerLoop::new(handles.clone(), sink, Box::new(NullPipelineLogger))
            .with_cancel(cancelled)
            .run();

        assert!(handles.status.is_running());
        assert_eq!(report.stop_reason, None);
    }

    #[test]
    fn test_without_drain_pending_results_are_left() {
        let handles = running_handles();
        handles.on_image_results(envelope(0, 0, 1));
        handles.on_image_results(envelope(1, 33, 1));
        handles.status.set_running(false);
        let (sink, rows) = sink();

        let report = ConsumerLoop::new(handles.clone(), sink, Box::new(NullPipelineLogger))
            .with_drain_on_stop(false)
            .run();

        assert_eq!(report.processed, 0);
        assert!(rows.lock().unwrap().is_empty());
        assert_eq!(handles.channel.size(), 2);
    }

    #[test]
    fn test_drain_after_stop_is_reported() {
        let handles = running_handles();
        handles.on_image_results(envelope(0, 0, 1));
        handles.status.set_running(false);
        let (sink, _) = sink();

        let report = ConsumerLoop::new(handles, sink, Box::new(NullPipelineLogger)).run();

        assert_eq!(report.drained_after_stop, 1);
    }

    #[test]
    fn test_processing_rate_from_drained_timestamps() {
        let handles = running_handles();
        for (i, ms) in [100, 133, 166].into_iter().enumerate() {
            handles.on_image_results(envelope(i, ms, 0));
        }
        handles.status.set_running(false);
        let (sink, _) = sink();

        ConsumerLoop::new(handles.clone(), sink, Box::new(NullPipelineLogger)).run();

        assert_abs_diff_eq!(handles.rates.processing_rate(), 30.0, epsilon = 0.5);
    }
}
