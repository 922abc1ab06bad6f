use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One diagnostic sample, emitted by the consumer for each processed result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub timestamp: Duration,
    pub capture_fps: f64,
    pub processing_fps: f64,
    pub faces: usize,
}

impl ProgressUpdate {
    /// `timestamp: 1.23 cfps: 29.97 pfps: 15.00 faces: 1`
    pub fn line(&self) -> String {
        format!(
            "timestamp: {:.2} cfps: {:.2} pfps: {:.2} faces: {}",
            self.timestamp.as_secs_f64(),
            self.capture_fps,
            self.processing_fps,
            self.faces
        )
    }
}

/// Cross-cutting logger for session events.
///
/// The consumer loop reports through this trait so the CLI, tests and any
/// embedding application can each decide where diagnostics go.
pub trait PipelineLogger: Send {
    /// Report one processed result.
    fn progress(&mut self, update: &ProgressUpdate);

    /// Record how long a named stage took for one result.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. queue depth).
    fn metric(&mut self, name: &str, value: f64);

    /// Report a one-off session event (start-up settings and the like).
    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _update: &ProgressUpdate) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and latest value of one timing or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: usize,
    pub total: f64,
    pub last: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Writes the per-result diagnostic line through the `log` crate and keeps
/// stage timings and metrics for a summary at shutdown.
///
/// Sessions run until stopped, so only aggregates are kept per key.
pub struct LogPipelineLogger {
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    processed: usize,
    faces_seen: usize,
    last: Option<ProgressUpdate>,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            processed: 0,
            faces_seen: 0,
            last: None,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.processed == 0 {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let elapsed_ms = elapsed * 1000.0;
        let mut lines = vec![format!(
            "Session summary ({} results, {} faces, {elapsed:.1}s):",
            self.processed, self.faces_seen
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            let pct = if elapsed_ms > 0.0 {
                agg.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  total {:7.0}ms  ({pct:4.1}%)",
                agg.mean(),
                agg.total
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1} last {:.0}", agg.mean(), agg.last));
        }

        if let Some(last) = &self.last {
            lines.push(format!(
                "  Final rates: cfps {:.2} pfps {:.2}",
                last.capture_fps, last.processing_fps
            ));
        }
        if elapsed > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} results/s",
                self.processed as f64 / elapsed
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<Aggregate> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<Aggregate> {
        self.metrics.get(name).copied()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, update: &ProgressUpdate) {
        self.processed += 1;
        self.faces_seen += update.faces;
        self.last = Some(*update);
        log::info!("{}", update.line());
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
