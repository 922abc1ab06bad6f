use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Detector tuning: the two modes are mutually exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceDetectorMode {
    /// Faces close to the camera, covering a large part of the frame.
    #[default]
    LargeFaces,
    /// Distant faces, e.g. a group in front of the camera.
    SmallFaces,
}

impl fmt::Display for FaceDetectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceDetectorMode::LargeFaces => write!(f, "LARGE_FACES"),
            FaceDetectorMode::SmallFaces => write!(f, "SMALL_FACES"),
        }
    }
}

impl FromStr for FaceDetectorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "large" | "large_faces" | "0" => Ok(FaceDetectorMode::LargeFaces),
            "small" | "small_faces" | "1" => Ok(FaceDetectorMode::SmallFaces),
            other => Err(format!(
                "Face detector mode must be 'large' or 'small', got '{other}'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("large", FaceDetectorMode::LargeFaces)]
    #[case("SMALL_FACES", FaceDetectorMode::SmallFaces)]
    #[case("0", FaceDetectorMode::LargeFaces)]
    #[case("1", FaceDetectorMode::SmallFaces)]
    fn test_parse(#[case] input: &str, #[case] expected: FaceDetectorMode) {
        assert_eq!(input.parse::<FaceDetectorMode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("medium".parse::<FaceDetectorMode>().is_err());
    }

    #[test]
    fn test_display_matches_log_names() {
        assert_eq!(FaceDetectorMode::LargeFaces.to_string(), "LARGE_FACES");
        assert_eq!(FaceDetectorMode::SmallFaces.to_string(), "SMALL_FACES");
    }
}
