//! Collaborator traits at the pipeline's external boundaries.
//!
//! The orchestrator only talks to these traits; production wires in ffmpeg
//! and the Gemini client, tests wire in in-process fakes.

use std::path::Path;

use async_trait::async_trait;
use podthumb_gemini::{GeminiClient, GenerationPayload, ImageRequest, PreparedVideo, VideoSource};
use podthumb_media::{extract_frames, get_duration, ExtractedFrame, FrameRequest};

use crate::error::PipelineResult;

/// Local still-frame extraction.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Video duration in seconds.
    async fn duration(&self, video: &Path) -> PipelineResult<f64>;

    /// Extract the requested frames into `out_dir`. Returns the subset that
    /// could be extracted, in request order, each tagged with its timestamp.
    async fn extract(
        &self,
        video: &Path,
        requests: &[FrameRequest],
        out_dir: &Path,
    ) -> PipelineResult<Vec<ExtractedFrame>>;
}

/// Remote video understanding.
#[async_trait]
pub trait SpeakerIdentifier: Send + Sync {
    /// Make the video referenceable by the model. Runs once per identification,
    /// outside the retry loop.
    async fn prepare(&self, source: &VideoSource) -> PipelineResult<PreparedVideo>;

    async fn identify(
        &self,
        model: &str,
        video: &PreparedVideo,
        prompt: &str,
    ) -> PipelineResult<GenerationPayload>;
}

/// Remote image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, model: &str, request: &ImageRequest) -> PipelineResult<GenerationPayload>;
}

/// ffmpeg/ffprobe on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegFrameExtractor;

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn duration(&self, video: &Path) -> PipelineResult<f64> {
        Ok(get_duration(video).await?)
    }

    async fn extract(
        &self,
        video: &Path,
        requests: &[FrameRequest],
        out_dir: &Path,
    ) -> PipelineResult<Vec<ExtractedFrame>> {
        Ok(extract_frames(video, requests, out_dir).await?)
    }
}

#[async_trait]
impl SpeakerIdentifier for GeminiClient {
    async fn prepare(&self, source: &VideoSource) -> PipelineResult<PreparedVideo> {
        Ok(self.prepare_video(source).await?)
    }

    async fn identify(
        &self,
        model: &str,
        video: &PreparedVideo,
        prompt: &str,
    ) -> PipelineResult<GenerationPayload> {
        Ok(self.identify_speakers(model, video, prompt).await?)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate(&self, model: &str, request: &ImageRequest) -> PipelineResult<GenerationPayload> {
        Ok(self.generate_images(model, request).await?)
    }
}
