use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::{FrameSource, SourceError, SourceInfo};
use crate::shared::constants::{SYNTHETIC_FRAME_HEIGHT, SYNTHETIC_FRAME_WIDTH};
use crate::shared::frame::Frame;

/// A camera that renders a scrolling test pattern.
///
/// Used when no capture hardware is wired in. Paced cameras sleep until each
/// frame is due, so downstream frame rates match a real device; unpaced ones
/// emit frames as fast as they are pulled, with timestamps still spaced at
/// the configured rate.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    camera_count: u32,
    max_frames: Option<usize>,
    paced: bool,
    fps: f64,
    index: usize,
    started: Option<Instant>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            width: SYNTHETIC_FRAME_WIDTH,
            height: SYNTHETIC_FRAME_HEIGHT,
            camera_count: 1,
            max_frames: None,
            paced: true,
            fps: 0.0,
            index: 0,
            started: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Stop after `max_frames` frames instead of running until closed.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Number of attached cameras; ids `0..count` can be opened.
    pub fn with_camera_count(mut self, count: u32) -> Self {
        self.camera_count = count;
        self
    }

    fn render(&self, index: usize) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = index * 4;
        let mut data = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            for col in 0..w {
                data.push(((col + shift) % 256) as u8);
                data.push(((row + shift / 2) % 256) as u8);
                data.push(((col + row) % 256) as u8);
            }
        }
        data
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticCamera {
    fn open(&mut self, camera_id: u32, fps: f64) -> Result<SourceInfo, SourceError> {
        if camera_id >= self.camera_count {
            return Err(SourceError::Unavailable {
                camera_id,
                reason: format!("only {} synthetic camera(s) attached", self.camera_count),
            });
        }
        if !(fps.is_finite() && fps > 0.0) || Duration::try_from_secs_f64(1.0 / fps).is_err() {
            return Err(SourceError::Unavailable {
                camera_id,
                reason: format!("unsupported capture rate {fps}"),
            });
        }
        self.fps = fps;
        self.index = 0;
        self.started = Some(Instant::now());
        log::debug!(
            "Synthetic camera {camera_id} opened at {}x{} {fps:.2} fps",
            self.width,
            self.height
        );
        Ok(SourceInfo {
            width: self.width,
            height: self.height,
            fps,
            frame_count: self.max_frames,
        })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let started = self
            .started
            .ok_or_else(|| SourceError::Disconnected("camera is not open".to_string()))?;
        if self.max_frames.is_some_and(|max| self.index >= max) {
            return Ok(None);
        }

        let timestamp = Duration::try_from_secs_f64(self.index as f64 / self.fps).map_err(|_| {
            SourceError::Disconnected(format!("frame {} is past the clock range", self.index))
        })?;
        if self.paced {
            let elapsed = started.elapsed();
            if timestamp > elapsed {
                thread::sleep(timestamp - elapsed);
            }
        }

        let frame = Frame::new(
            self.render(self.index),
            self.width,
            self.height,
            3,
            self.index,
            timestamp,
        );
        self.index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.started = None;
    }
}
