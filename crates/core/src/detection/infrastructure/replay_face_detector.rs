use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::capabilities::{Capability, DetectionCapabilities};
use crate::detection::domain::face_detector::{DetectionError, DetectorSettings, FaceDetector};
use crate::shared::face::DetectionResult;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ReplayLoadError {
    #[error("failed to read detections from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid detections file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Replays pre-recorded detection results by frame index.
///
/// Stands in for a live detector when driving the pipeline from recorded
/// sessions or fixtures. Frames without a recording yield no faces. Scores
/// for capabilities that were not enabled at configure time are stripped.
pub struct ReplayFaceDetector {
    recordings: Arc<HashMap<usize, DetectionResult>>,
    capabilities: DetectionCapabilities,
}

impl ReplayFaceDetector {
    pub fn new(recordings: Arc<HashMap<usize, DetectionResult>>) -> Self {
        Self {
            recordings,
            capabilities: DetectionCapabilities::all(),
        }
    }

    /// A detector that never sees a face.
    pub fn empty() -> Self {
        Self::new(Arc::new(HashMap::new()))
    }

    /// Loads recordings from a JSON object mapping frame index to
    /// `{face_id: face}`.
    pub fn load(path: &Path) -> Result<Self, ReplayLoadError> {
        let json = fs::read_to_string(path).map_err(|e| ReplayLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let recordings: HashMap<usize, DetectionResult> =
            serde_json::from_str(&json).map_err(|e| ReplayLoadError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        log::info!(
            "Loaded recorded detections for {} frames from {}",
            recordings.len(),
            path.display()
        );
        Ok(Self::new(Arc::new(recordings)))
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn configure(&mut self, settings: &DetectorSettings) -> Result<(), DetectionError> {
        self.capabilities = settings.capabilities;
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError> {
        let mut faces = self
            .recordings
            .get(&frame.index())
            .cloned()
            .unwrap_or_default();
        let enabled = self.capabilities;
        for face in faces.values_mut() {
            face.scores.retain(|c: &Capability, _| enabled.contains(*c));
        }
        Ok(faces)
    }
}
