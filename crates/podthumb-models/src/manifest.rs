//! Speaker manifest produced by the identification stage.
//!
//! The manifest is the only structured state persisted between runs. It is
//! written once per stage as pretty JSON and must round-trip losslessly.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::rect::NormalizedBox;

/// Root artifact of the identification stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerManifest {
    /// Speakers in the order the model reported them.
    pub speakers: Vec<Speaker>,
    /// Free-form pipeline note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SpeakerManifest {
    pub fn new(speakers: Vec<Speaker>) -> Self {
        Self {
            speakers,
            note: None,
        }
    }

    /// Look up a speaker by id.
    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }

    /// Serialize as the on-disk representation.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse the on-disk representation.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Total number of candidates across all speakers.
    pub fn candidate_count(&self) -> usize {
        self.speakers.iter().map(|s| s.frames.len()).sum()
    }
}

/// A distinct person detected in the video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    /// Stable slug, unique within a manifest (e.g. `speaker_1`).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub role: SpeakerRole,
    /// Short visual description.
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub note: String,
    /// Grouping confidence in `[0, 1]`.
    #[serde(default, deserialize_with = "de_confidence")]
    pub confidence: f64,
    /// Candidate frames, in the order the model proposed them.
    #[serde(default)]
    pub frames: Vec<FrameCandidate>,
}

impl Speaker {
    pub fn new(id: impl Into<String>, role: SpeakerRole) -> Self {
        Self {
            id: id.into(),
            role,
            ..Default::default()
        }
    }

    /// Reference image paths in preference order: every crop first, then the
    /// raw frame of each candidate that has no crop.
    pub fn reference_paths(&self) -> Vec<PathBuf> {
        let crops = self.frames.iter().filter_map(|f| f.crop_path.clone());
        let uncropped = self
            .frames
            .iter()
            .filter(|f| f.crop_path.is_none())
            .filter_map(|f| f.frame_path.clone());
        crops.chain(uncropped).collect()
    }
}

/// Likely role of a speaker.
///
/// Any unrecognized or missing value decodes as [`SpeakerRole::Unknown`];
/// models frequently echo the prompt's `host|guest|unknown` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpeakerRole {
    Host,
    Guest,
    #[default]
    Unknown,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Host => "host",
            SpeakerRole::Guest => "guest",
            SpeakerRole::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => SpeakerRole::Host,
            "guest" => SpeakerRole::Guest,
            _ => SpeakerRole::Unknown,
        }
    }
}

impl Serialize for SpeakerRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SpeakerRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => SpeakerRole::parse(&s),
            _ => SpeakerRole::Unknown,
        })
    }
}

/// A single `(timestamp, bbox)` proposal for a speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameCandidate {
    /// Timestamp in seconds; valid candidates lie in `[0, duration)`.
    pub timestamp_s: f64,
    #[serde(default)]
    pub bbox: NormalizedBox,
    /// Extracted frame, set after extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_path: Option<PathBuf>,
    /// Waist-up crop, set after a successful crop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_path: Option<PathBuf>,
    /// Reason the crop failed. Together with `crop_path` this distinguishes
    /// "cropping failed" from "cropping not attempted yet".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_error: Option<String>,
    /// Candidate was padded in rather than proposed by the model.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthesized: bool,
}

impl FrameCandidate {
    pub fn new(timestamp_s: f64, bbox: NormalizedBox) -> Self {
        Self {
            timestamp_s,
            bbox,
            frame_path: None,
            crop_path: None,
            crop_error: None,
            synthesized: false,
        }
    }

    /// Evenly spaced filler candidate with the default centered box.
    pub fn synthesized(timestamp_s: f64) -> Self {
        Self {
            synthesized: true,
            ..Self::new(timestamp_s, NormalizedBox::CENTERED)
        }
    }

    pub fn crop_attempted(&self) -> bool {
        self.crop_path.is_some() || self.crop_error.is_some()
    }

    /// Record a crop outcome, keeping the two fields mutually exclusive.
    pub fn record_crop(&mut self, outcome: Result<PathBuf, String>) {
        match outcome {
            Ok(path) => {
                self.crop_path = Some(path);
                self.crop_error = None;
            }
            Err(reason) => {
                self.crop_path = None;
                self.crop_error = Some(reason);
            }
        }
    }
}

fn de_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(0.0))
}

fn de_lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}
