use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceInfo};
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::infrastructure::face_limit_detector::FaceLimitDetector;
use crate::detection::infrastructure::frame_throttle::FrameThrottle;
use crate::pipeline::listeners::{ImageListener, StatusListener};
use crate::pipeline::session_config::{ConfigError, SessionConfig};
use crate::pipeline::status_monitor::StopReason;
use crate::shared::face::ResultEnvelope;

#[derive(Error, Debug)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(#[source] SourceError),
    #[error("Detector setup failed: {0}")]
    Detector(#[source] DetectionError),
    #[error("session was already started")]
    AlreadyStarted,
}

/// Owns a camera and a detector and runs them on a capture thread.
///
/// Every captured frame is reported to the image listener. Frames admitted
/// by the processing-rate throttle are run through the detector, and the
/// result is handed to the listener as an envelope. Lifecycle changes go to
/// the status listener. A session can be started once.
pub struct DetectionSession {
    config: SessionConfig,
    parts: Option<(Box<dyn FrameSource>, Box<dyn FaceDetector>)>,
    image_listener: Arc<dyn ImageListener>,
    status_listener: Arc<dyn StatusListener>,
    stop_requested: Arc<AtomicBool>,
    worker: Option<JoinHandle<Option<StopReason>>>,
}

impl DetectionSession {
    pub fn new(
        config: SessionConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        image_listener: Arc<dyn ImageListener>,
        status_listener: Arc<dyn StatusListener>,
    ) -> Self {
        Self {
            config,
            parts: Some((source, detector)),
            image_listener,
            status_listener,
            stop_requested: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validates the configuration, prepares the detector, opens the camera
    /// and starts capturing.
    ///
    /// Nothing is reported to the listeners unless every step succeeds.
    pub fn start(&mut self) -> Result<SourceInfo, StartError> {
        if self.parts.is_none() {
            return Err(StartError::AlreadyStarted);
        }
        self.config.validate()?;
        let throttle = FrameThrottle::new(self.config.processing_fps).map_err(|_| {
            ConfigError::InvalidFrameRate {
                name: "Processing framerate",
                value: self.config.processing_fps,
            }
        })?;
        let Some((mut source, detector)) = self.parts.take() else {
            return Err(StartError::AlreadyStarted);
        };

        let settings = self.config.detector_settings();
        let mut detector = FaceLimitDetector::new(detector, settings.max_faces)
            .map_err(|e| StartError::Detector(DetectionError::Configure(e.to_string())))?;
        detector.configure(&settings).map_err(StartError::Detector)?;
        log::info!("Max num of faces set to: {}", settings.max_faces);
        log::info!("Face detector mode set to: {}", settings.mode);

        let info = source
            .open(self.config.camera_id, self.config.camera_fps)
            .map_err(StartError::CameraUnavailable)?;
        log::info!(
            "Camera {} opened: {}x{} at {:.2} fps",
            self.config.camera_id,
            info.width,
            info.height,
            info.fps
        );

        self.image_listener.on_session_start();
        self.status_listener.on_running();

        let image_listener = self.image_listener.clone();
        let status_listener = self.status_listener.clone();
        let stop_requested = self.stop_requested.clone();
        self.worker = Some(std::thread::spawn(move || {
            let reason = capture_loop(
                &mut *source,
                &mut detector,
                throttle,
                &*image_listener,
                &stop_requested,
            );
            source.close();
            if let Some(reason) = &reason {
                status_listener.on_stopped(reason.clone());
            }
            reason
        }));
        Ok(info)
    }

    /// Whether the capture thread is still producing frames.
    pub fn is_capturing(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Stops capturing and waits for the capture thread to release the
    /// camera. Safe to call more than once and on a session that never
    /// started.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.stop_requested.store(true, Ordering::Release);
        match worker.join() {
            Ok(Some(reason)) => log::debug!("Capture thread had already ended: {reason}"),
            Ok(None) => self.status_listener.on_stopped(StopReason::Requested),
            Err(_) => {
                log::error!("Capture thread panicked");
                self.status_listener
                    .on_stopped(StopReason::ProducerFault("capture thread panicked".into()));
            }
        }
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Returns the reason capture ended on its own, or `None` when stopped on
/// request.
fn capture_loop(
    source: &mut dyn FrameSource,
    detector: &mut dyn FaceDetector,
    mut throttle: FrameThrottle,
    listener: &dyn ImageListener,
    stop_requested: &AtomicBool,
) -> Option<StopReason> {
    loop {
        if stop_requested.load(Ordering::Acquire) {
            return None;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("Camera reached end of stream");
                return Some(StopReason::EndOfStream);
            }
            Err(e) => {
                log::error!("Capture failed: {e}");
                return Some(StopReason::ProducerFault(e.to_string()));
            }
        };

        listener.on_image_capture(&frame);
        if !throttle.admit(frame.timestamp()) {
            continue;
        }

        match detector.detect(&frame) {
            Ok(faces) => listener.on_image_results(ResultEnvelope::new(frame, faces)),
            Err(e) => {
                log::error!("Detection failed: {e}");
                return Some(StopReason::ProducerFault(e.to_string()));
            }
        }
    }
}
