use crate::detection::domain::face_detector::{DetectionError, DetectorSettings, FaceDetector};
use crate::shared::face::{DetectionResult, FaceId};
use crate::shared::frame::Frame;

/// Decorator that caps the number of faces reported per frame.
///
/// When the inner detector reports more than `max_faces`, the largest faces
/// (by bounding-box area) are kept; ties go to the lower face id.
pub struct FaceLimitDetector {
    inner: Box<dyn FaceDetector>,
    max_faces: usize,
}

impl FaceLimitDetector {
    pub fn new(inner: Box<dyn FaceDetector>, max_faces: usize) -> Result<Self, &'static str> {
        if max_faces < 1 {
            return Err("max_faces must be >= 1");
        }
        Ok(Self { inner, max_faces })
    }

    fn limit(&self, faces: DetectionResult) -> DetectionResult {
        if faces.len() <= self.max_faces {
            return faces;
        }
        let mut ranked: Vec<(FaceId, i64)> =
            faces.iter().map(|(id, f)| (*id, f.bounds.area())).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let keep: Vec<FaceId> = ranked
            .into_iter()
            .take(self.max_faces)
            .map(|(id, _)| id)
            .collect();
        faces
            .into_iter()
            .filter(|(id, _)| keep.contains(id))
            .collect()
    }
}

impl FaceDetector for FaceLimitDetector {
    fn configure(&mut self, settings: &DetectorSettings) -> Result<(), DetectionError> {
        if settings.max_faces < 1 {
            return Err(DetectionError::Configure(
                "max_faces must be >= 1".to_string(),
            ));
        }
        self.max_faces = settings.max_faces;
        self.inner.configure(settings)
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, DetectionError> {
        let faces = self.inner.detect(frame)?;
        Ok(self.limit(faces))
    }
}
