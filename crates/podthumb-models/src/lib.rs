//! Shared data models for the podthumb pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Speaker manifests produced by identification
//! - Normalized bounding boxes reported by the video model
//! - Pipeline stages and run summaries

pub mod manifest;
pub mod rect;
pub mod run;
pub mod stage;

// Re-export common types
pub use manifest::{FrameCandidate, Speaker, SpeakerManifest, SpeakerRole};
pub use rect::NormalizedBox;
pub use run::{RunId, RunOutcome, RunSummary, SpeakerOmission};
pub use stage::Stage;
