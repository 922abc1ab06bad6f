use std::path::{Path, PathBuf};

use crate::output::domain::overlay_renderer::{OverlayRenderer, RenderError};
use crate::shared::face::{DetectionResult, FaceId};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

const BOX_THICKNESS: i32 = 2;

const PALETTE: &[[u8; 3]] = &[
    [0, 255, 0],
    [255, 64, 64],
    [64, 160, 255],
    [255, 200, 0],
    [200, 0, 255],
    [0, 255, 255],
];

/// Draws a colored box around every face into a copy of the frame.
///
/// The most recent annotated frame is kept as the display buffer. When a
/// snapshot directory is set, every `every`-th rendered frame is also saved
/// there as a PNG.
pub struct ImageOverlayRenderer {
    snapshot_dir: Option<PathBuf>,
    every: usize,
    rendered: usize,
    display: Option<Frame>,
}

impl ImageOverlayRenderer {
    pub fn new() -> Self {
        Self {
            snapshot_dir: None,
            every: 1,
            rendered: 0,
            display: None,
        }
    }

    pub fn with_snapshots(mut self, dir: &Path, every: usize) -> Self {
        self.snapshot_dir = Some(dir.to_path_buf());
        self.every = every.max(1);
        self
    }

    /// The last annotated frame.
    pub fn display(&self) -> Option<&Frame> {
        self.display.as_ref()
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    fn save(dir: &Path, frame: &Frame) -> Result<(), RenderError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("frame_{:06}.png", frame.index()));
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or(RenderError::UnsupportedFormat {
                index: frame.index(),
                channels: frame.channels(),
            })?;
        img.save(path)?;
        Ok(())
    }
}

impl Default for ImageOverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn color_for(id: FaceId) -> [u8; 3] {
    PALETTE[id.0 as usize % PALETTE.len()]
}

fn draw_box(frame: &mut Frame, region: Region, color: [u8; 3]) {
    let (w, h) = (frame.width(), frame.height());
    let Some(r) = region.clamp(w, h) else {
        return;
    };
    let mut pixels = frame.as_ndarray_mut();
    let t = BOX_THICKNESS.min(r.width).min(r.height);
    for y in r.y..r.y + r.height {
        for x in r.x..r.x + r.width {
            let on_edge = x < r.x + t || x >= r.x + r.width - t || y < r.y + t || y >= r.y + r.height - t;
            if on_edge {
                for (c, value) in color.iter().enumerate() {
                    pixels[[y as usize, x as usize, c]] = *value;
                }
            }
        }
    }
}

impl OverlayRenderer for ImageOverlayRenderer {
    fn render(&mut self, frame: &Frame, faces: &DetectionResult) -> Result<(), RenderError> {
        if frame.channels() != 3 {
            return Err(RenderError::UnsupportedFormat {
                index: frame.index(),
                channels: frame.channels(),
            });
        }

        let mut canvas = frame.clone();
        for (id, face) in faces {
            draw_box(&mut canvas, face.bounds, color_for(*id));
        }

        self.rendered += 1;
        if let Some(dir) = &self.snapshot_dir {
            if (self.rendered - 1) % self.every == 0 {
                Self::save(dir, &canvas)?;
            }
        }
        self.display = Some(canvas);
        Ok(())
    }
}
