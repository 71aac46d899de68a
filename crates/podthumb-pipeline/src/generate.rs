//! Cached, retried image generation shared by the headshot and compose stages.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use podthumb_gemini::{GenerationPayload, ImageRequest};
use podthumb_media::save_generated_image;
use podthumb_models::Stage;
use tracing::{debug, info, warn};

use crate::error::PipelineResult;
use crate::metrics;
use crate::ports::ImageGenerator;
use crate::retry::{CallOutcome, RetryPolicy};

/// Shared count of remote calls actually issued.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Paths produced (or found) by a generation, plus anything worth reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub paths: Vec<PathBuf>,
    pub cache_hit: bool,
    pub warnings: Vec<String>,
}

impl GenerationOutput {
    pub(crate) fn cached(paths: Vec<PathBuf>, warnings: Vec<String>) -> Self {
        Self {
            paths,
            cache_hit: true,
            warnings,
        }
    }

    pub fn first(&self) -> Option<&PathBuf> {
        self.paths.first()
    }
}

/// Image generation with retry and call accounting.
pub struct ImageStage<'a> {
    pub(crate) generator: &'a dyn ImageGenerator,
    pub(crate) retry: &'a RetryPolicy,
    pub(crate) calls: &'a CallCounter,
}

impl<'a> ImageStage<'a> {
    pub fn new(
        generator: &'a dyn ImageGenerator,
        retry: &'a RetryPolicy,
        calls: &'a CallCounter,
    ) -> Self {
        Self {
            generator,
            retry,
            calls,
        }
    }

    /// Call the model until it returns at least one image, then write images
    /// to `expected` in order. Returns the paths actually written.
    pub(crate) async fn generate(
        &self,
        stage: Stage,
        model: &str,
        request: &ImageRequest,
        expected: &[PathBuf],
    ) -> PipelineResult<Vec<PathBuf>> {
        let generator = self.generator;
        let calls = self.calls;

        let result = self
            .retry
            .run(stage, |attempt| async move {
                calls.increment();
                metrics::record_remote_call(stage);
                debug!(stage = %stage, model = %model, attempt, "Issuing image generation call");

                let outcome = match generator.generate(model, request).await? {
                    GenerationPayload::Blocked { reason } => CallOutcome::Blocked(reason),
                    GenerationPayload::Content {
                        images,
                        diagnostics,
                        ..
                    } => {
                        if images.is_empty() {
                            CallOutcome::Empty(format!("model returned no images ({})", diagnostics))
                        } else {
                            CallOutcome::Produced(images)
                        }
                    }
                };
                Ok(outcome)
            })
            .await;

        let images = result.into_result()?;
        if images.len() < expected.len() {
            warn!(
                stage = %stage,
                requested = expected.len(),
                returned = images.len(),
                "Model returned fewer images than requested"
            );
        }

        let mut written = Vec::with_capacity(expected.len());
        for (image, path) in images.iter().zip(expected) {
            save_generated_image(image, path).await?;
            written.push(path.clone());
        }

        info!(stage = %stage, outputs = written.len(), "Saved generated images");
        Ok(written)
    }
}
