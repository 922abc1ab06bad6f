use thiserror::Error;

use crate::detection::domain::capabilities::DetectionCapabilities;
use crate::detection::domain::face_detector_mode::FaceDetectorMode;
use crate::shared::face::DetectionResult;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detector rejected settings: {0}")]
    Configure(String),
    #[error("detection failed on frame {index}: {message}")]
    Frame { index: usize, message: String },
}

/// Settings handed to the detector once, before the first frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorSettings {
    pub max_faces: usize,
    pub mode: FaceDetectorMode,
    pub capabilities: DetectionCapabilities,
}

/// Domain interface for face and expression detection.
///
/// Implementations may be stateful (e.g., tracking face ids across frames),
/// hence `&mut self`.
pub trait FaceDetector: Send {
    fn configure(&mut self, _settings: &DetectorSettings) -> Result<(), DetectionError> {
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError>;
}
