//! Gemini REST client for podthumb.
//!
//! This crate provides:
//! - `generateContent` calls for video understanding and image generation
//! - Files API resumable upload with readiness polling
//! - A single tagged-variant decoder for responses

pub mod client;
pub mod decode;
pub mod error;
pub mod files;
pub mod types;

pub use client::{
    GeminiClient, GeminiConfig, ImageRequest, PreparedVideo, VideoSource, DEFAULT_BASE_URL,
};
pub use decode::{decode_response, GenerationPayload, ResponseDiagnostics, BLOCK_FINISH_REASONS};
pub use error::{GeminiError, GeminiResult};
pub use types::{FileResource, FileState};
