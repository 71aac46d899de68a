//! Headshot generation from reference frames.

use std::path::{Path, PathBuf};

use podthumb_gemini::ImageRequest;
use podthumb_media::prepare_reference;
use podthumb_models::Stage;
use tracing::{info, warn};

use crate::cache_key::CacheKey;
use crate::error::{PipelineError, PipelineResult};
use crate::generate::{GenerationOutput, ImageStage};
use crate::prompts::HEADSHOT_PROMPT;
use crate::stage_cache::{artifact_paths, ArtifactCache};

/// Upper bound on references sent in one headshot call.
pub const MAX_REFERENCE_IMAGES: usize = 14;

#[derive(Debug, Clone)]
pub struct HeadshotRequest {
    pub references: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub image_size: String,
    pub count: u32,
    /// Fixed output stem; defaults to `{first reference stem}_headshot`
    pub output_name: Option<String>,
    /// Square-center-crop (and upscale) references before sending
    pub crop_square: bool,
    pub use_cache: bool,
}

impl HeadshotRequest {
    pub fn new(references: Vec<PathBuf>, out_dir: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            references,
            out_dir: out_dir.into(),
            prompt: HEADSHOT_PROMPT.to_string(),
            model: model.into(),
            aspect_ratio: "1:1".to_string(),
            image_size: "1K".to_string(),
            count: 1,
            output_name: None,
            crop_square: true,
            use_cache: true,
        }
    }

    fn output_stem(&self) -> String {
        if let Some(stem) = self
            .output_name
            .as_deref()
            .map(Path::new)
            .and_then(Path::file_stem)
        {
            return stem.to_string_lossy().to_string();
        }
        let first = self
            .references
            .first()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference".to_string());
        format!("{}_headshot", first)
    }

    fn cache_key(&self, references: &[PathBuf]) -> CacheKey {
        CacheKey::new(Stage::Headshot.as_str())
            .param(&self.model)
            .param(&self.prompt)
            .param(&self.aspect_ratio)
            .param(&self.image_size)
            .number(self.count)
            .flag(self.crop_square)
            .files(references)
    }
}

impl ImageStage<'_> {
    /// Generate `request.count` headshots, reusing outputs cached under the
    /// same inputs.
    pub async fn headshots(&self, request: &HeadshotRequest) -> PipelineResult<GenerationOutput> {
        if request.references.is_empty() {
            return Err(PipelineError::config(
                "at least one reference frame is required for headshot generation",
            ));
        }

        let mut warnings = Vec::new();
        let mut references = request.references.clone();
        if references.len() > MAX_REFERENCE_IMAGES {
            let message = format!(
                "headshot references truncated from {} to {}",
                references.len(),
                MAX_REFERENCE_IMAGES
            );
            warn!("{}", message);
            warnings.push(message);
            references.truncate(MAX_REFERENCE_IMAGES);
        }

        let key = request.cache_key(&references).finish();
        let expected = artifact_paths(
            &request.out_dir,
            &request.output_stem(),
            "png",
            &key,
            request.count,
        );

        if ArtifactCache::new(Stage::Headshot, request.use_cache).is_hit(&expected) {
            info!(key = %key.short(), "Headshot cache hit");
            return Ok(GenerationOutput::cached(expected, warnings));
        }

        let mut encoded = Vec::with_capacity(references.len());
        for path in &references {
            encoded.push(prepare_reference(path, request.crop_square)?);
        }

        let image_request = ImageRequest::new(request.prompt.clone(), encoded)
            .with_aspect_ratio(request.aspect_ratio.clone())
            .with_image_size(request.image_size.clone())
            .with_count(request.count);

        let paths = self
            .generate(Stage::Headshot, &request.model, &image_request, &expected)
            .await?;

        Ok(GenerationOutput {
            paths,
            cache_hit: false,
            warnings,
        })
    }
}
