use serde::{Deserialize, Serialize};

/// Detector-assigned bounding box of a face, in frame pixel coordinates.
///
/// Detectors may report boxes that extend past the frame edge; consumers that
/// touch pixels call [`Region::clamp`] first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Intersects the region with a `frame_w` x `frame_h` frame.
    ///
    /// Returns `None` when nothing of the region is visible.
    pub fn clamp(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        // Detector boxes are untrusted; widen so far-off edges cannot overflow.
        let x1 = i64::from(self.x).max(0);
        let y1 = i64::from(self.y).max(0);
        let x2 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(frame_w));
        let y2 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(frame_h));
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        let narrow = |v: i64| i32::try_from(v).unwrap_or(i32::MAX);
        Some(Region::new(narrow(x1), narrow(y1), narrow(x2 - x1), narrow(y2 - y1)))
    }
}
