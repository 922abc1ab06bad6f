use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceInfo};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Plays a directory of still images back as a camera.
///
/// Files are ordered by name and decoded lazily with the `image` crate.
/// Each image becomes one RGB frame, timestamped at the requested capture
/// rate. The camera id is ignored: the directory is the device.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    fps: f64,
    index: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
            fps: 0.0,
            index: 0,
        }
    }

    fn list_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, camera_id: u32, fps: f64) -> Result<SourceInfo, SourceError> {
        let unavailable = |reason: String| SourceError::Unavailable { camera_id, reason };

        let files = Self::list_images(&self.dir)
            .map_err(|e| unavailable(format!("cannot read {}: {e}", self.dir.display())))?;
        let first = files
            .first()
            .ok_or_else(|| unavailable(format!("no images in {}", self.dir.display())))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| unavailable(format!("cannot decode {}: {e}", first.display())))?;

        log::debug!(
            "Image sequence {} opened: {} frames at {width}x{height}",
            self.dir.display(),
            files.len()
        );
        let frame_count = files.len();
        self.files = files;
        self.fps = fps;
        self.index = 0;

        Ok(SourceInfo {
            width,
            height,
            fps,
            frame_count: Some(frame_count),
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.files.get(self.index) else {
            return Ok(None);
        };
        let img = image::open(path)
            .map_err(|e| SourceError::Decode {
                path: path.clone(),
                source: e,
            })?
            .to_rgb8();

        let timestamp = Duration::from_secs_f64(self.index as f64 / self.fps);
        let frame = Frame::from_rgb(img, self.index, timestamp);
        self.index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.files.clear();
    }
}
