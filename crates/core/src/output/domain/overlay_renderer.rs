use thiserror::Error;

use crate::shared::face::DetectionResult;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("frame {index} has {channels} channels, expected 3")]
    UnsupportedFormat { index: usize, channels: u8 },
    #[error("failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
    #[error("failed to prepare snapshot directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Draws detection results over a frame for display.
///
/// Renderers get a shared view of the frame and work on their own copy.
pub trait OverlayRenderer: Send {
    fn render(&mut self, frame: &Frame, faces: &DetectionResult) -> Result<(), RenderError>;
}
