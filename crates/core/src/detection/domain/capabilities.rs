use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single thing the detector can be asked to measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // Expressions
    Attention,
    Smile,
    ChinRaise,
    LipPress,
    InnerBrowRaise,
    LipPucker,
    LipCornerDepressor,
    UpperLipRaise,
    LipSuck,
    MouthOpen,
    NoseWrinkle,
    BrowFurrow,
    BrowRaise,
    EyeClosure,
    Smirk,
    // Emotions
    Engagement,
    Valence,
    Anger,
    Disgust,
    Joy,
    Sadness,
    Surprise,
    Contempt,
    // Appearance
    Gender,
    Glasses,
    Emojis,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityKind {
    Expression,
    Emotion,
    Appearance,
    Emoji,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::Attention,
        Capability::Smile,
        Capability::ChinRaise,
        Capability::LipPress,
        Capability::InnerBrowRaise,
        Capability::LipPucker,
        Capability::LipCornerDepressor,
        Capability::UpperLipRaise,
        Capability::LipSuck,
        Capability::MouthOpen,
        Capability::NoseWrinkle,
        Capability::BrowFurrow,
        Capability::BrowRaise,
        Capability::EyeClosure,
        Capability::Smirk,
        Capability::Engagement,
        Capability::Valence,
        Capability::Anger,
        Capability::Disgust,
        Capability::Joy,
        Capability::Sadness,
        Capability::Surprise,
        Capability::Contempt,
        Capability::Gender,
        Capability::Glasses,
        Capability::Emojis,
    ];

    pub fn kind(self) -> CapabilityKind {
        use Capability::*;
        match self {
            Attention | Smile | ChinRaise | LipPress | InnerBrowRaise | LipPucker
            | LipCornerDepressor | UpperLipRaise | LipSuck | MouthOpen | NoseWrinkle
            | BrowFurrow | BrowRaise | EyeClosure | Smirk => CapabilityKind::Expression,
            Engagement | Valence | Anger | Disgust | Joy | Sadness | Surprise | Contempt => {
                CapabilityKind::Emotion
            }
            Gender | Glasses => CapabilityKind::Appearance,
            Emojis => CapabilityKind::Emoji,
        }
    }

    /// Expressions and emotions carry a numeric score per face.
    pub fn is_scored(self) -> bool {
        matches!(
            self.kind(),
            CapabilityKind::Expression | CapabilityKind::Emotion
        )
    }

    /// Stable snake_case name, used for CSV headers and CLI parsing.
    pub fn name(self) -> &'static str {
        use Capability::*;
        match self {
            Attention => "attention",
            Smile => "smile",
            ChinRaise => "chin_raise",
            LipPress => "lip_press",
            InnerBrowRaise => "inner_brow_raise",
            LipPucker => "lip_pucker",
            LipCornerDepressor => "lip_corner_depressor",
            UpperLipRaise => "upper_lip_raise",
            LipSuck => "lip_suck",
            MouthOpen => "mouth_open",
            NoseWrinkle => "nose_wrinkle",
            BrowFurrow => "brow_furrow",
            BrowRaise => "brow_raise",
            EyeClosure => "eye_closure",
            Smirk => "smirk",
            Engagement => "engagement",
            Valence => "valence",
            Anger => "anger",
            Disgust => "disgust",
            Joy => "joy",
            Sadness => "sadness",
            Surprise => "surprise",
            Contempt => "contempt",
            Gender => "gender",
            Glasses => "glasses",
            Emojis => "emojis",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown detection capability '{s}'"))
    }
}

/// Set of enabled detector capabilities, stored as a bitmask.
///
/// Serialized as a list of capability names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Capability>", into = "Vec<Capability>")]
pub struct DetectionCapabilities(u32);

impl DetectionCapabilities {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Capability::ALL.iter().copied().collect()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Enabled capabilities in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.iter().copied().filter(|c| self.contains(*c))
    }

    /// Enabled capabilities that carry a per-face score.
    pub fn scored(&self) -> impl Iterator<Item = Capability> + '_ {
        self.iter().filter(|c| c.is_scored())
    }
}

impl FromIterator<Capability> for DetectionCapabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut caps = Self::empty();
        for c in iter {
            caps.insert(c);
        }
        caps
    }
}

impl From<Vec<Capability>> for DetectionCapabilities {
    fn from(list: Vec<Capability>) -> Self {
        list.into_iter().collect()
    }
}

impl From<DetectionCapabilities> for Vec<Capability> {
    fn from(caps: DetectionCapabilities) -> Self {
        caps.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_all_contains_every_capability() {
        let caps = DetectionCapabilities::all();
        assert_eq!(caps.len(), Capability::ALL.len());
        for c in Capability::ALL {
            assert!(caps.contains(*c));
        }
    }

    #[test]
    fn test_empty_has_nothing() {
        let caps = DetectionCapabilities::empty();
        assert!(caps.is_empty());
        assert_eq!(caps.iter().count(), 0);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut caps = DetectionCapabilities::empty().with(Capability::Smile);
        caps.insert(Capability::Joy);
        assert!(caps.contains(Capability::Smile));
        assert!(caps.contains(Capability::Joy));
        caps.remove(Capability::Smile);
        assert!(!caps.contains(Capability::Smile));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_scored_skips_appearance_and_emojis() {
        let caps = DetectionCapabilities::empty()
            .with(Capability::Gender)
            .with(Capability::Emojis)
            .with(Capability::Valence)
            .with(Capability::Smile);
        let scored: Vec<_> = caps.scored().collect();
        assert_eq!(scored, vec![Capability::Smile, Capability::Valence]);
    }

    #[test]
    fn test_iter_follows_declaration_order() {
        let caps: DetectionCapabilities = vec![Capability::Joy, Capability::Attention].into();
        let listed: Vec<_> = caps.iter().collect();
        assert_eq!(listed, vec![Capability::Attention, Capability::Joy]);
    }

    #[rstest]
    #[case("smile", Capability::Smile)]
    #[case("Brow-Furrow", Capability::BrowFurrow)]
    #[case(" lip_corner_depressor ", Capability::LipCornerDepressor)]
    fn test_parse_capability(#[case] input: &str, #[case] expected: Capability) {
        assert_eq!(input.parse::<Capability>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_capability_errors() {
        assert!("telepathy".parse::<Capability>().is_err());
    }

    #[test]
    fn test_serde_as_name_list() {
        let caps = DetectionCapabilities::empty()
            .with(Capability::Smile)
            .with(Capability::Glasses);
        let json = serde_json::to_string(&caps).unwrap();
        assert_eq!(json, r#"["smile","glasses"]"#);
        let back: DetectionCapabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caps);
    }
}
