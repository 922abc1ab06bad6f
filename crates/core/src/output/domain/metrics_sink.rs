use std::time::Duration;

use thiserror::Error;

use crate::shared::face::DetectionResult;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to write metrics row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush metrics: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists per-frame face metrics as a time series.
///
/// One call per drained envelope, in drain order, so rows are
/// timestamp-ordered without sorting.
pub trait MetricsSink: Send {
    fn append(&mut self, timestamp: Duration, faces: &DetectionResult) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError>;
}
