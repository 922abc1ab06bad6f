use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("camera {camera_id} unavailable: {reason}")]
    Unavailable { camera_id: u32, reason: String },
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("camera disconnected: {0}")]
    Disconnected(String),
}

/// What the source reported when it was opened.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// `None` for live sources that run until stopped.
    pub frame_count: Option<usize>,
}

/// Produces frames from a camera or camera-like source.
///
/// Implementations handle device and decoding details; the pipeline only
/// sees timestamped [`Frame`]s. `next_frame` may block until the next frame
/// is due and returns `Ok(None)` once a finite source is exhausted.
pub trait FrameSource: Send {
    fn open(&mut self, camera_id: u32, fps: f64) -> Result<SourceInfo, SourceError>;

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Releases the device. Called from the capture thread after its last
    /// frame, never while a frame is being read.
    fn close(&mut self);
}
