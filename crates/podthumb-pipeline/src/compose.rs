//! Thumbnail composition from finished headshots and a title.

use std::path::{Path, PathBuf};

use podthumb_gemini::ImageRequest;
use podthumb_media::load_reference;
use podthumb_models::Stage;
use tracing::{info, warn};

use crate::cache_key::CacheKey;
use crate::error::{PipelineError, PipelineResult};
use crate::generate::{GenerationOutput, ImageStage};
use crate::prompts::{thumbnail_prompt, Template};
use crate::stage_cache::{artifact_paths, ArtifactCache};

/// Upper bound on headshots sent as likeness references.
pub const MAX_COMPOSE_REFERENCES: usize = 4;

#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub headshots: Vec<PathBuf>,
    pub title: String,
    pub background: Option<PathBuf>,
    pub style_reference: Option<PathBuf>,
    pub template: Template,
    pub model: String,
    pub aspect_ratio: String,
    /// Output template; the final file is `{stem}_{key10}.{ext}` beside it
    pub output: PathBuf,
    pub use_cache: bool,
}

impl ComposeRequest {
    pub fn new(headshots: Vec<PathBuf>, title: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            headshots,
            title: title.into(),
            background: None,
            style_reference: None,
            template: Template::default(),
            model: model.into(),
            aspect_ratio: "16:9".to_string(),
            output: PathBuf::from("artifacts/thumbnails/thumb.png"),
            use_cache: true,
        }
    }

    /// Headshots actually sent to the model.
    fn sent_headshots(&self) -> &[PathBuf] {
        &self.headshots[..self.headshots.len().min(MAX_COMPOSE_REFERENCES)]
    }

    fn cache_key(&self) -> CacheKey {
        let mut key = CacheKey::new(Stage::Compose.as_str())
            .param(&self.model)
            .param(&self.title)
            .param(&self.aspect_ratio)
            .param(self.template.as_str())
            .files(self.sent_headshots());
        if let Some(background) = &self.background {
            key = key.param("background").file(background);
        }
        if let Some(style) = &self.style_reference {
            key = key.param("style_reference").file(style);
        }
        key
    }

    fn output_parts(&self) -> (PathBuf, String, String) {
        let dir = self
            .output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "thumb".to_string());
        let ext = self
            .output
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "png".to_string());
        (dir, stem, ext)
    }
}

impl ImageStage<'_> {
    /// Compose a thumbnail. Needs at least two headshots.
    pub async fn thumbnail(&self, request: &ComposeRequest) -> PipelineResult<GenerationOutput> {
        if request.headshots.len() < 2 {
            return Err(PipelineError::config(format!(
                "at least two headshots are required for composition, got {}",
                request.headshots.len()
            )));
        }
        if request.title.trim().is_empty() {
            return Err(PipelineError::config("thumbnail title is empty"));
        }

        let key = request.cache_key().finish();
        let (dir, stem, ext) = request.output_parts();
        let expected = artifact_paths(&dir, &stem, &ext, &key, 1);

        let mut warnings = Vec::new();
        if request.headshots.len() > MAX_COMPOSE_REFERENCES {
            let message = format!(
                "compose references truncated from {} to {}",
                request.headshots.len(),
                MAX_COMPOSE_REFERENCES
            );
            warn!("{}", message);
            warnings.push(message);
        }

        if ArtifactCache::new(Stage::Compose, request.use_cache).is_hit(&expected) {
            info!(key = %key.short(), "Thumbnail cache hit");
            return Ok(GenerationOutput::cached(expected, warnings));
        }

        let mut references = Vec::new();
        let extras = [&request.background, &request.style_reference];
        let paths = request
            .sent_headshots()
            .iter()
            .chain(extras.into_iter().flatten());
        for path in paths {
            references.push(load_reference(path).await?);
        }

        let image_request = ImageRequest::new(
            thumbnail_prompt(&request.title, request.template),
            references,
        )
        .with_aspect_ratio(request.aspect_ratio.clone());

        let paths = self
            .generate(Stage::Compose, &request.model, &image_request, &expected)
            .await?;

        Ok(GenerationOutput {
            paths,
            cache_hit: false,
            warnings,
        })
    }
}
