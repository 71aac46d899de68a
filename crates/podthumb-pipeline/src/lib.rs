//! Podcast thumbnail pipeline.
//!
//! This crate provides:
//! - Stage orchestration (identify, extract/crop, headshot, compose)
//! - Content-addressed stage caching and manifest TTL caching
//! - Validation of the identification model's JSON
//! - Retry with linear backoff for remote calls
//! - Standalone headshot and thumbnail operations

pub mod cache_key;
pub mod compose;
pub mod config;
pub mod error;
pub mod generate;
pub mod headshot;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod ports;
pub mod prompts;
pub mod retry;
pub mod stage_cache;
pub mod validate;

pub use cache_key::{CacheKey, Fingerprint};
pub use compose::ComposeRequest;
pub use config::{ConfigOverrides, OutputLayout, PipelineConfig};
pub use error::{PipelineError, PipelineResult, RunFailure};
pub use generate::{CallCounter, GenerationOutput, ImageStage};
pub use headshot::HeadshotRequest;
pub use logging::RunLogger;
pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use ports::{FfmpegFrameExtractor, FrameExtractor, ImageGenerator, SpeakerIdentifier};
pub use prompts::{identify_prompt, thumbnail_prompt, Template, HEADSHOT_PROMPT};
pub use retry::{CallOutcome, RetryPolicy, RetryResult};
pub use stage_cache::{artifact_paths, ArtifactCache, ManifestCache};
pub use validate::ResponseValidator;
