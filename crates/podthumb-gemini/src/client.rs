//! Gemini `generateContent` client.

use std::path::PathBuf;
use std::time::Duration;

use podthumb_media::{mime_for_path, EncodedImage};
use reqwest::Client;
use tokio::fs;
use tracing::{debug, info};

use crate::decode::{decode_response, GenerationPayload};
use crate::error::{GeminiError, GeminiResult};
use crate::types::{
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig, Part,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Local videos up to this size are sent inline; larger ones are uploaded.
pub const DEFAULT_INLINE_LIMIT_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    pub inline_limit_bytes: u64,
    /// Delay between Files API state checks
    pub poll_interval: Duration,
    /// Maximum number of Files API state checks
    pub poll_attempts: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(600),
            inline_limit_bytes: DEFAULT_INLINE_LIMIT_BYTES,
            poll_interval: Duration::from_secs(1),
            poll_attempts: 60,
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    pub fn with_inline_limit(mut self, bytes: u64) -> Self {
        self.inline_limit_bytes = bytes;
        self
    }
}

/// Video input for identification. Local files and URLs are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Local(PathBuf),
    Url(String),
}

impl VideoSource {
    pub fn describe(&self) -> String {
        match self {
            VideoSource::Local(path) => path.display().to_string(),
            VideoSource::Url(url) => url.clone(),
        }
    }
}

/// A video resolved to the request part that references it.
///
/// Inlining or uploading happens while preparing, so one prepared video can
/// back any number of identification calls.
#[derive(Debug, Clone)]
pub struct PreparedVideo {
    part: Part,
    description: String,
}

impl PreparedVideo {
    /// Reference an already-hosted video by URI.
    pub fn remote(uri: impl Into<String>, mime_type: Option<String>) -> Self {
        let uri = uri.into();
        Self {
            description: uri.clone(),
            part: Part::file(mime_type, uri),
        }
    }

    pub fn describe(&self) -> &str {
        &self.description
    }
}

/// Parameters of one image-generation call.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub references: Vec<EncodedImage>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
    pub count: u32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, references: Vec<EncodedImage>) -> Self {
        Self {
            prompt: prompt.into(),
            references,
            aspect_ratio: None,
            image_size: None,
            count: 1,
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn with_image_size(mut self, image_size: impl Into<String>) -> Self {
        self.image_size = Some(image_size.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count.max(1);
        self
    }

    fn generation_config(&self) -> GenerationConfig {
        let image_config = (self.aspect_ratio.is_some() || self.image_size.is_some()).then(|| {
            ImageConfig {
                aspect_ratio: self.aspect_ratio.clone(),
                image_size: self.image_size.clone(),
            }
        });
        GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string()]),
            image_config,
            candidate_count: (self.count > 1).then_some(self.count),
            ..GenerationConfig::default()
        }
    }
}

/// Client for the Gemini REST API.
pub struct GeminiClient {
    pub(crate) http: Client,
    pub(crate) config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new client. An empty API key is a configuration error.
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::config(
                "Gemini API key is empty (set GEMINI_API_KEY or GOOGLE_API_KEY)",
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(GeminiError::Network)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Call `models/{model}:generateContent`.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, model
        );
        debug!(model = %model, "Calling Gemini generateContent");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::from_http_status(status, body));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            GeminiError::invalid_response(format!("undecodable generateContent body: {}", e))
        })
    }

    /// Ask the video model to identify speakers; the caller validates the text.
    pub async fn identify_speakers(
        &self,
        model: &str,
        video: &PreparedVideo,
        prompt: &str,
    ) -> GeminiResult<GenerationPayload> {
        let request = GenerateContentRequest::user(vec![video.part.clone(), Part::text(prompt)])
            .with_generation_config(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                ..GenerationConfig::default()
            });

        info!(model = %model, source = %video.describe(), "Requesting speaker identification");
        decode_response(self.generate_content(model, &request).await?)
    }

    /// Generate images from a prompt and reference images.
    pub async fn generate_images(
        &self,
        model: &str,
        request: &ImageRequest,
    ) -> GeminiResult<GenerationPayload> {
        let mut parts = Vec::with_capacity(request.references.len() + 1);
        parts.push(Part::text(request.prompt.clone()));
        parts.extend(request.references.iter().map(Part::image));

        let body = GenerateContentRequest::user(parts).with_generation_config(request.generation_config());

        info!(
            model = %model,
            references = request.references.len(),
            count = request.count,
            "Requesting image generation"
        );
        decode_response(self.generate_content(model, &body).await?)
    }

    /// Inline small local videos, upload large ones, pass URLs through.
    pub async fn prepare_video(&self, source: &VideoSource) -> GeminiResult<PreparedVideo> {
        let description = source.describe();
        let part = match source {
            VideoSource::Url(url) => Part::file(None, url.clone()),
            VideoSource::Local(path) => {
                let meta = fs::metadata(path).await.map_err(|e| {
                    GeminiError::config(format!("video not readable: {}: {}", path.display(), e))
                })?;
                let mime = mime_for_path(path);

                if meta.len() <= self.config.inline_limit_bytes {
                    debug!(bytes = meta.len(), "Sending video inline");
                    let bytes = fs::read(path).await?;
                    Part::inline(mime, &bytes)
                } else {
                    let uploaded = self.upload_file(path, mime).await?;
                    let active = self.wait_until_active(uploaded).await?;
                    let uri = active.uri.clone().ok_or_else(|| {
                        GeminiError::invalid_response(format!("file {} has no uri", active.name))
                    })?;
                    Part::file(
                        Some(active.mime_type.unwrap_or_else(|| mime.to_string())),
                        uri,
                    )
                }
            }
        };
        Ok(PreparedVideo { part, description })
    }
}
