//! Run summaries reported by the orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::Stage;

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunOutcome {
    /// Still running (never observed by callers of a finished run).
    #[default]
    Running,
    /// Every stage completed.
    Completed,
    /// Stopped early without an error, e.g. too few headshots to compose.
    Partial { reason: String },
    /// A whole-stage failure aborted the run.
    Failed { stage: Stage, error: String },
}

/// A speaker that did not get a headshot, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerOmission {
    pub speaker_id: String,
    pub reason: String,
}

/// Record of how far a run progressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Completed stages, in completion order.
    pub stages_completed: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    /// Canonical headshot per speaker id.
    #[serde(default)]
    pub headshots: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub omissions: Vec<SpeakerOmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Remote model calls actually issued (cache hits excluded).
    pub remote_calls: u32,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            stages_completed: Vec::new(),
            manifest_path: None,
            headshots: BTreeMap::new(),
            omissions: Vec::new(),
            thumbnail: None,
            warnings: Vec::new(),
            remote_calls: 0,
            outcome: RunOutcome::Running,
        }
    }

    pub fn complete_stage(&mut self, stage: Stage) {
        if !self.stages_completed.contains(&stage) {
            self.stages_completed.push(stage);
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages_completed.len()
    }

    pub fn omit(&mut self, speaker_id: impl Into<String>, reason: impl Into<String>) {
        self.omissions.push(SpeakerOmission {
            speaker_id: speaker_id.into(),
            reason: reason.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_stage_is_idempotent_and_ordered() {
        let mut summary = RunSummary::new(RunId::new());
        summary.complete_stage(Stage::Identify);
        summary.complete_stage(Stage::ExtractAndCrop);
        summary.complete_stage(Stage::Identify);
        assert_eq!(
            summary.stages_completed,
            vec![Stage::Identify, Stage::ExtractAndCrop]
        );
        assert_eq!(summary.stage_count(), 2);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = RunOutcome::Failed {
            stage: Stage::Identify,
            error: "blocked".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["stage"], "identify");
    }

    #[test]
    fn test_finish_sets_timestamp() {
        let mut summary = RunSummary::new(RunId::new());
        summary.finish(RunOutcome::Completed);
        assert!(summary.finished_at.is_some());
        assert_eq!(summary.outcome, RunOutcome::Completed);
    }
}
