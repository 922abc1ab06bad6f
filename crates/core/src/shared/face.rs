use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::domain::capabilities::Capability;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Tracker-assigned identifier of a face, stable across frames within one
/// session. Carries no meaning across sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Head pose in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Unknown => write!(f, "unknown"),
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub glasses: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emoji {
    Relaxed,
    Smiley,
    Laughing,
    Kissing,
    Disappointed,
    Rage,
    Smirk,
    Wink,
    StuckOutTongueWinkingEye,
    StuckOutTongue,
    Flushed,
    Scream,
    #[default]
    Unknown,
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Emoji::Relaxed => "relaxed",
            Emoji::Smiley => "smiley",
            Emoji::Laughing => "laughing",
            Emoji::Kissing => "kissing",
            Emoji::Disappointed => "disappointed",
            Emoji::Rage => "rage",
            Emoji::Smirk => "smirk",
            Emoji::Wink => "wink",
            Emoji::StuckOutTongueWinkingEye => "stuck_out_tongue_winking_eye",
            Emoji::StuckOutTongue => "stuck_out_tongue",
            Emoji::Flushed => "flushed",
            Emoji::Scream => "scream",
            Emoji::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Per-face attribute record reported by the detector for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub bounds: Region,
    /// Expression and emotion scores, keyed by the capability that produced
    /// them. Only enabled capabilities are present.
    #[serde(default)]
    pub scores: BTreeMap<Capability, f32>,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub interocular_distance: f32,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub dominant_emoji: Emoji,
}

impl Face {
    pub fn new(bounds: Region) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    pub fn with_score(mut self, capability: Capability, value: f32) -> Self {
        self.scores.insert(capability, value);
        self
    }

    pub fn score(&self, capability: Capability) -> Option<f32> {
        self.scores.get(&capability).copied()
    }
}

/// Faces found in one frame. An empty map is a valid result.
pub type DetectionResult = BTreeMap<FaceId, Face>;

/// The unit handed from producer to consumer: a frame together with the
/// faces detected in it.
///
/// Frame and result travel as one value, so a consumer can never observe one
/// without the other.
#[derive(Clone, Debug)]
pub struct ResultEnvelope {
    frame: Frame,
    faces: DetectionResult,
    timestamp: Duration,
}

impl ResultEnvelope {
    pub fn new(frame: Frame, faces: DetectionResult) -> Self {
        let timestamp = frame.timestamp();
        Self {
            frame,
            faces,
            timestamp,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn faces(&self) -> &DetectionResult {
        &self.faces
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn into_parts(self) -> (Frame, DetectionResult) {
        (self.frame, self.faces)
    }
}
