//! Pipeline error types.

use std::fmt;

use podthumb_gemini::GeminiError;
use podthumb_media::MediaError;
use podthumb_models::{RunSummary, Stage};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {message}")]
    Parse { message: String, raw: String },

    #[error("Schema error: {message}")]
    Schema { message: String, raw: String },

    #[error("Content blocked during {stage}: {reason}")]
    Blocked { stage: Stage, reason: String },

    #[error("No artifacts after {attempts} attempts: {diagnostic}")]
    NoArtifacts { attempts: u32, diagnostic: String },

    #[error("Gemini error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn schema(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn blocked(stage: Stage, reason: impl Into<String>) -> Self {
        Self::Blocked {
            stage,
            reason: reason.into(),
        }
    }

    /// Transport failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Gemini(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        match self {
            PipelineError::Config(_) => true,
            PipelineError::Gemini(e) => e.is_config_error(),
            PipelineError::Media(MediaError::FfmpegNotFound | MediaError::FfprobeNotFound) => true,
            _ => false,
        }
    }

    /// Raw model text for parse and schema failures.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PipelineError::Parse { raw, .. } | PipelineError::Schema { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// A run aborted by a whole-stage failure.
///
/// `Display` is the underlying error verbatim; the summary still lists the
/// stages that completed before the failure.
#[derive(Debug)]
pub struct RunFailure {
    pub summary: RunSummary,
    pub error: PipelineError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
