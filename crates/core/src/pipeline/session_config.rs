use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::capabilities::DetectionCapabilities;
use crate::detection::domain::face_detector::DetectorSettings;
use crate::detection::domain::face_detector_mode::FaceDetectorMode;
use crate::pipeline::result_channel::OverflowPolicy;
use crate::shared::constants::{
    DEFAULT_CAMERA_FPS, DEFAULT_CAMERA_ID, DEFAULT_DATA_DIR, DEFAULT_LICENSE_PATH,
    DEFAULT_MAX_FACES, DEFAULT_PROCESSING_FPS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Data folder doesn't exist: {}", .0.display())]
    MissingDataDir(PathBuf),
    #[error("License file doesn't exist: {}", .0.display())]
    MissingLicense(PathBuf),
    #[error("{name} must be a positive number, got {value}")]
    InvalidFrameRate { name: &'static str, value: f64 },
    #[error("Number of tracked faces must be at least 1")]
    InvalidMaxFaces,
    #[error("At least one detection capability must be enabled")]
    NoCapabilities,
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a detection session needs before it can start.
///
/// Loaded from an optional JSON file; missing fields take their defaults.
/// Validated once, before any device is opened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub camera_id: u32,
    pub camera_fps: f64,
    pub processing_fps: f64,
    pub max_faces: usize,
    pub face_mode: FaceDetectorMode,
    pub capabilities: DetectionCapabilities,
    /// Folder holding the detector's classifier assets.
    pub data_dir: PathBuf,
    pub license_path: PathBuf,
    pub overflow: OverflowPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            camera_id: DEFAULT_CAMERA_ID,
            camera_fps: DEFAULT_CAMERA_FPS,
            processing_fps: DEFAULT_PROCESSING_FPS,
            max_faces: DEFAULT_MAX_FACES,
            face_mode: FaceDetectorMode::default(),
            capabilities: DetectionCapabilities::all(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            license_path: PathBuf::from(DEFAULT_LICENSE_PATH),
            overflow: OverflowPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Platform config location, e.g. `~/.config/FaceCam/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCam").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Loads `explicit` if given (it must exist), otherwise the default
    /// location if a file is there, otherwise built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("Camera capture framerate", self.camera_fps),
            ("Processing framerate", self.processing_fps),
        ] {
            // The frame interval must fit in a `Duration`.
            let representable = Duration::try_from_secs_f64(1.0 / value).is_ok();
            if !(value.is_finite() && value > 0.0 && representable) {
                return Err(ConfigError::InvalidFrameRate { name, value });
            }
        }
        if self.max_faces < 1 {
            return Err(ConfigError::InvalidMaxFaces);
        }
        if self.capabilities.is_empty() {
            return Err(ConfigError::NoCapabilities);
        }
        if !self.data_dir.exists() {
            return Err(ConfigError::MissingDataDir(self.data_dir.clone()));
        }
        if !self.license_path.exists() {
            return Err(ConfigError::MissingLicense(self.license_path.clone()));
        }
        Ok(())
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            max_faces: self.max_faces,
            mode: self.face_mode,
            capabilities: self.capabilities,
        }
    }
}
