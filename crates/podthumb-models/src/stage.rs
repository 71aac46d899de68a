use std::fmt;

use serde::{Deserialize, Serialize};

/// The four ordered pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Identify,
    ExtractAndCrop,
    Headshot,
    Compose,
}

impl Stage {
    /// All stages in execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::Identify,
        Stage::ExtractAndCrop,
        Stage::Headshot,
        Stage::Compose,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Identify => "identify",
            Stage::ExtractAndCrop => "extract_and_crop",
            Stage::Headshot => "headshot",
            Stage::Compose => "compose",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
