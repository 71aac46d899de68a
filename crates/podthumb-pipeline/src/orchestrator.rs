//! Pipeline orchestration.
//!
//! `IDENTIFY -> EXTRACT_AND_CROP -> HEADSHOT -> COMPOSE`, strictly in order.
//! Every remote call is gated by a stage cache, so re-running with unchanged
//! inputs issues no remote calls. The manifest and the files it points to are
//! the only state carried between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use podthumb_gemini::{GeminiClient, GenerationPayload, VideoSource};
use podthumb_media::{copy_file, crop_frame, FrameRequest};
use podthumb_models::{
    FrameCandidate, RunId, RunOutcome, RunSummary, Speaker, SpeakerManifest, Stage,
};
use tracing::{debug, info, warn, Instrument};

use crate::compose::ComposeRequest;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, RunFailure};
use crate::generate::{CallCounter, ImageStage};
use crate::headshot::HeadshotRequest;
use crate::logging::RunLogger;
use crate::metrics;
use crate::ports::{FfmpegFrameExtractor, FrameExtractor, ImageGenerator, SpeakerIdentifier};
use crate::prompts::identify_prompt;
use crate::retry::CallOutcome;
use crate::stage_cache::ManifestCache;
use crate::validate::ResponseValidator;

/// Smallest distance kept between a synthesized timestamp and the safe-range end.
const SAFE_RANGE_EPSILON_S: f64 = 0.001;

type StageResult<T> = Result<T, (Stage, PipelineError)>;

trait AtStage<T> {
    fn at(self, stage: Stage) -> StageResult<T>;
}

impl<T> AtStage<T> for PipelineResult<T> {
    fn at(self, stage: Stage) -> StageResult<T> {
        self.map_err(|e| (stage, e))
    }
}

/// External collaborators used by the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn FrameExtractor>,
    pub identifier: Arc<dyn SpeakerIdentifier>,
    pub generator: Arc<dyn ImageGenerator>,
}

impl Collaborators {
    /// ffmpeg for frames, one Gemini client for both remote models.
    pub fn production(config: &PipelineConfig) -> PipelineResult<Self> {
        let client = Arc::new(GeminiClient::new(config.gemini_config()?)?);
        Ok(Self {
            extractor: Arc::new(FfmpegFrameExtractor),
            identifier: client.clone(),
            generator: client,
        })
    }
}

/// Per-invocation bookkeeping.
struct RunContext {
    summary: RunSummary,
    logger: RunLogger,
    calls: CallCounter,
}

impl RunContext {
    fn new(operation: &str) -> Self {
        let run_id = RunId::new();
        Self {
            logger: RunLogger::new(&run_id, operation),
            summary: RunSummary::new(run_id),
            calls: CallCounter::new(),
        }
    }

    fn warn(&mut self, message: String) {
        self.logger.log_warning(&message);
        self.summary.warn(message);
    }

    fn finish(mut self, outcome: RunOutcome) -> RunSummary {
        self.summary.remote_calls = self.calls.get();
        self.summary.finish(outcome);
        self.logger.log_completion(&format!(
            "{} stages, {} remote calls",
            self.summary.stage_count(),
            self.summary.remote_calls
        ));
        self.summary
    }

    fn fail(mut self, stage: Stage, error: PipelineError) -> RunFailure {
        self.logger
            .log_error(&format!("stage {} failed: {}", stage, error));
        self.summary.remote_calls = self.calls.get();
        self.summary.finish(RunOutcome::Failed {
            stage,
            error: error.to_string(),
        });
        RunFailure {
            summary: self.summary,
            error,
        }
    }
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    collaborators: Collaborators,
    validator: ResponseValidator,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            validator: ResponseValidator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn manifest_cache(&self) -> ManifestCache {
        ManifestCache::new(&self.config.layout.manifest_path, self.config.manifest_ttl)
    }

    /// Full pipeline from a local video to a composed thumbnail.
    pub async fn run(&self, source: VideoSource, title: &str) -> Result<RunSummary, RunFailure> {
        let mut ctx = RunContext::new("run");
        ctx.logger.log_start(&source.describe());
        let span = ctx.logger.create_span();

        match self.run_stages(&mut ctx, &source, title).instrument(span).await {
            Ok(outcome) => Ok(ctx.finish(outcome)),
            Err((stage, error)) => Err(ctx.fail(stage, error)),
        }
    }

    /// Identify speakers and, for local videos, extract and crop their frames.
    pub async fn sample(
        &self,
        source: VideoSource,
    ) -> Result<(SpeakerManifest, RunSummary), RunFailure> {
        let mut ctx = RunContext::new("sample");
        ctx.logger.log_start(&source.describe());
        let span = ctx.logger.create_span();

        match self.sample_stages(&mut ctx, &source).instrument(span).await {
            Ok((manifest, outcome)) => Ok((manifest, ctx.finish(outcome))),
            Err((stage, error)) => Err(ctx.fail(stage, error)),
        }
    }

    async fn run_stages(
        &self,
        ctx: &mut RunContext,
        source: &VideoSource,
        title: &str,
    ) -> StageResult<RunOutcome> {
        let video = match source {
            VideoSource::Local(path) => path.clone(),
            VideoSource::Url(_) => {
                return Err((
                    Stage::Identify,
                    PipelineError::config("a full run needs a local video file for frame extraction"),
                ))
            }
        };
        if title.trim().is_empty() {
            return Err((Stage::Compose, PipelineError::config("thumbnail title is empty")));
        }
        ensure_video_exists(&video).at(Stage::Identify)?;

        let mut manifest = self.identify_stage(ctx, source).await?;
        self.extract_stage(ctx, &video, &mut manifest).await?;
        let headshots = self.headshot_stage(ctx, &manifest).await?;

        if headshots.len() < 2 {
            let reason = format!(
                "composition needs at least 2 headshots, only {} available",
                headshots.len()
            );
            ctx.warn(reason.clone());
            return Ok(RunOutcome::Partial { reason });
        }

        self.compose_stage(ctx, &headshots, title).await?;
        Ok(RunOutcome::Completed)
    }

    async fn sample_stages(
        &self,
        ctx: &mut RunContext,
        source: &VideoSource,
    ) -> StageResult<(SpeakerManifest, RunOutcome)> {
        if let VideoSource::Local(video) = source {
            ensure_video_exists(video).at(Stage::Identify)?;
        }

        let mut manifest = self.identify_stage(ctx, source).await?;

        match source {
            VideoSource::Local(video) => {
                self.extract_stage(ctx, video, &mut manifest).await?;
                Ok((manifest, RunOutcome::Completed))
            }
            VideoSource::Url(_) => {
                let reason = "frame extraction skipped: input is a URL, not a local file".to_string();
                ctx.warn(reason.clone());
                Ok((manifest, RunOutcome::Partial { reason }))
            }
        }
    }

    async fn identify_stage(
        &self,
        ctx: &mut RunContext,
        source: &VideoSource,
    ) -> StageResult<SpeakerManifest> {
        let stage = Stage::Identify;
        let started = Instant::now();
        let cache = self.manifest_cache();
        ctx.summary.manifest_path = Some(cache.path().to_path_buf());

        if let Some(manifest) = cache.load_fresh().await {
            ctx.logger.log_stage(stage, "reusing cached speaker manifest");
            ctx.summary.complete_stage(stage);
            return Ok(manifest);
        }

        ctx.logger.log_stage(stage, "requesting speaker identification");
        let prompt = identify_prompt(self.config.timestamps_per_speaker);
        let identifier = &*self.collaborators.identifier;
        let video = identifier.prepare(source).await.at(stage)?;
        let video_ref = &video;
        let model = self.config.identify_model.as_str();
        let calls = &ctx.calls;
        let prompt_ref = prompt.as_str();

        let result = self
            .config
            .retry_policy("identify")
            .run(stage, |attempt| async move {
                calls.increment();
                metrics::record_remote_call(stage);
                debug!(attempt, model = %model, "Issuing identification call");

                let payload = identifier.identify(model, video_ref, prompt_ref).await?;
                let outcome = match &payload {
                    GenerationPayload::Blocked { reason } => CallOutcome::Blocked(reason.clone()),
                    GenerationPayload::Content { diagnostics, .. } => match payload.text() {
                        Some(text) => CallOutcome::Produced(text),
                        None => CallOutcome::Empty(format!("model returned no text ({})", diagnostics)),
                    },
                };
                Ok(outcome)
            })
            .await;

        let text = result.into_result().at(stage)?;
        let manifest = self.validator.validate_text(&text).at(stage)?;
        cache.store(&manifest).await.at(stage)?;

        info!(
            speakers = manifest.speakers.len(),
            candidates = manifest.candidate_count(),
            "Speaker manifest written"
        );
        metrics::record_stage_latency(stage, started.elapsed());
        ctx.summary.complete_stage(stage);
        Ok(manifest)
    }

    async fn extract_stage(
        &self,
        ctx: &mut RunContext,
        video: &Path,
        manifest: &mut SpeakerManifest,
    ) -> StageResult<()> {
        let stage = Stage::ExtractAndCrop;
        let started = Instant::now();
        ctx.logger.log_stage(stage, "extracting and cropping frames");

        let duration = self.collaborators.extractor.duration(video).await.at(stage)?;
        for speaker in manifest.speakers.iter_mut() {
            self.prepare_candidates(speaker, duration);
            self.extract_speaker(video, speaker).await.at(stage)?;
            self.crop_speaker(speaker);
        }

        self.manifest_cache().store(manifest).await.at(stage)?;
        metrics::record_stage_latency(stage, started.elapsed());
        ctx.summary.complete_stage(stage);
        Ok(())
    }

    /// Drop out-of-range candidates and pad up to the requested count.
    fn prepare_candidates(&self, speaker: &mut Speaker, duration: f64) {
        let margin = self.config.timestamp_margin_s;
        let before = speaker.frames.len();
        speaker
            .frames
            .retain(|c| c.timestamp_s.is_finite() && c.timestamp_s >= 0.0 && c.timestamp_s < duration - margin);
        if speaker.frames.len() < before {
            warn!(
                speaker_id = %speaker.id,
                dropped = before - speaker.frames.len(),
                duration_s = duration,
                "Dropped candidates outside the video"
            );
        }

        let wanted = self.config.timestamps_per_speaker;
        if speaker.frames.len() < wanted {
            let missing = wanted - speaker.frames.len();
            for ts in synthesized_timestamps(duration, margin, missing) {
                speaker.frames.push(FrameCandidate::synthesized(ts));
            }
            debug!(speaker_id = %speaker.id, synthesized = missing, "Padded candidates");
        }
    }

    async fn extract_speaker(&self, video: &Path, speaker: &mut Speaker) -> PipelineResult<()> {
        let frames_dir = self.config.layout.frames_dir.join(&speaker.id);

        let mut pending = Vec::new();
        for (index, candidate) in speaker.frames.iter_mut().enumerate() {
            let on_disk = candidate.frame_path.as_ref().is_some_and(|p| p.is_file());
            if !on_disk {
                candidate.frame_path = None;
                candidate.crop_path = None;
                candidate.crop_error = None;
                pending.push(index);
            }
        }
        if pending.is_empty() {
            debug!(speaker_id = %speaker.id, "All frames already extracted");
            return Ok(());
        }

        let requests: Vec<FrameRequest> = pending
            .iter()
            .map(|&i| FrameRequest::new(i, speaker.frames[i].timestamp_s))
            .collect();
        let extracted = self
            .collaborators
            .extractor
            .extract(video, &requests, &frames_dir)
            .await?;

        // The extractor returns a subset; pair by timestamp, never by position.
        for frame in extracted {
            let slot = pending.iter().copied().find(|&i| {
                let c = &speaker.frames[i];
                c.frame_path.is_none() && c.timestamp_s == frame.timestamp_s
            });
            if let Some(i) = slot {
                speaker.frames[i].frame_path = Some(frame.path);
            }
        }

        let missing = speaker.frames.iter().filter(|c| c.frame_path.is_none()).count();
        if missing > 0 {
            warn!(speaker_id = %speaker.id, missing, "Some frames could not be extracted");
        }
        Ok(())
    }

    fn crop_speaker(&self, speaker: &mut Speaker) {
        let crops_dir = self.config.layout.crops_dir.join(&speaker.id);

        for candidate in speaker.frames.iter_mut() {
            let Some(frame) = candidate.frame_path.clone() else {
                continue;
            };
            let crop_on_disk = candidate.crop_path.as_ref().is_some_and(|p| p.is_file());
            if crop_on_disk || candidate.crop_error.is_some() {
                continue;
            }

            let outcome = crop_frame(&frame, &candidate.bbox, &crops_dir, &self.config.crop)
                .map_err(|e| e.to_string());
            if let Err(reason) = &outcome {
                warn!(
                    speaker_id = %speaker.id,
                    timestamp_s = candidate.timestamp_s,
                    error = %reason,
                    "Crop failed"
                );
            }
            candidate.record_crop(outcome);
        }
    }

    /// Returns `(speaker_id, canonical headshot)` in manifest order.
    async fn headshot_stage(
        &self,
        ctx: &mut RunContext,
        manifest: &SpeakerManifest,
    ) -> StageResult<Vec<(String, PathBuf)>> {
        let stage = Stage::Headshot;
        let started = Instant::now();
        ctx.logger.log_stage(stage, "generating headshots");

        let retry = self.config.retry_policy("headshot");
        let calls = ctx.calls.clone();
        let images = ImageStage::new(&*self.collaborators.generator, &retry, &calls);
        let layout = &self.config.layout;
        let mut completed = Vec::new();

        for speaker in &manifest.speakers {
            let canonical = layout.canonical_headshot(&speaker.id);
            if canonical.is_file() {
                debug!(speaker_id = %speaker.id, "Headshot already present");
                ctx.summary.headshots.insert(speaker.id.clone(), canonical.clone());
                completed.push((speaker.id.clone(), canonical));
                continue;
            }

            let mut references: Vec<PathBuf> = speaker
                .reference_paths()
                .into_iter()
                .filter(|p| p.is_file())
                .collect();
            if references.is_empty() {
                ctx.summary.omit(&speaker.id, "no usable reference frames");
                ctx.logger
                    .log_warning(&format!("speaker {} has no usable reference frames", speaker.id));
                continue;
            }
            let limit = self.config.max_headshot_references;
            if references.len() > limit {
                ctx.warn(format!(
                    "speaker {}: using {} of {} reference frames",
                    speaker.id,
                    limit,
                    references.len()
                ));
                references.truncate(limit);
            }

            let mut request = HeadshotRequest::new(
                references,
                layout.generated_headshots_dir(),
                &self.config.headshot_model,
            );
            request.output_name = Some(format!("{}_headshot", speaker.id));
            request.aspect_ratio = self.config.headshot_aspect_ratio.clone();
            request.image_size = self.config.headshot_image_size.clone();
            request.use_cache = self.config.use_cache;

            let generated = match images.headshots(&request).await {
                Ok(output) => output,
                Err(e) => {
                    ctx.summary.omit(&speaker.id, e.to_string());
                    ctx.logger
                        .log_warning(&format!("headshot for {} failed: {}", speaker.id, e));
                    continue;
                }
            };
            for message in generated.warnings.iter() {
                ctx.summary.warn(message.clone());
            }

            let Some(first) = generated.first() else {
                ctx.summary.omit(&speaker.id, "model returned no images");
                continue;
            };
            if let Err(e) = copy_file(first, &canonical).await {
                ctx.summary
                    .omit(&speaker.id, format!("could not store headshot: {}", e));
                continue;
            }

            info!(speaker_id = %speaker.id, path = %canonical.display(), "Headshot ready");
            ctx.summary.headshots.insert(speaker.id.clone(), canonical.clone());
            completed.push((speaker.id.clone(), canonical));
        }

        metrics::record_stage_latency(stage, started.elapsed());
        ctx.summary.complete_stage(stage);
        Ok(completed)
    }

    async fn compose_stage(
        &self,
        ctx: &mut RunContext,
        headshots: &[(String, PathBuf)],
        title: &str,
    ) -> StageResult<()> {
        let stage = Stage::Compose;
        let started = Instant::now();
        ctx.logger.log_stage(stage, "composing thumbnail");

        let retry = self.config.retry_policy("compose");
        let calls = ctx.calls.clone();
        let images = ImageStage::new(&*self.collaborators.generator, &retry, &calls);

        let mut request = ComposeRequest::new(
            headshots.iter().take(2).map(|(_, p)| p.clone()).collect(),
            title,
            &self.config.compose_model,
        );
        request.template = self.config.template;
        request.aspect_ratio = self.config.thumbnail_aspect_ratio.clone();
        request.output = self.config.layout.thumbnails_dir.join("thumb.png");
        request.use_cache = self.config.use_cache;

        let output = images.thumbnail(&request).await.at(stage)?;
        let thumbnail = output.first().cloned().ok_or_else(|| {
            (
                stage,
                PipelineError::NoArtifacts {
                    attempts: 0,
                    diagnostic: "no thumbnail was written".to_string(),
                },
            )
        })?;

        info!(path = %thumbnail.display(), cache_hit = output.cache_hit, "Thumbnail ready");
        ctx.summary.thumbnail = Some(thumbnail);
        metrics::record_stage_latency(stage, started.elapsed());
        ctx.summary.complete_stage(stage);
        Ok(())
    }
}

fn ensure_video_exists(video: &Path) -> PipelineResult<()> {
    if video.is_file() {
        Ok(())
    } else {
        Err(PipelineError::config(format!(
            "video not found: {}",
            video.display()
        )))
    }
}

/// `missing` evenly spaced timestamps, `duration * k / (missing + 1)`, kept
/// inside `[0, duration - margin)`.
pub fn synthesized_timestamps(duration: f64, margin: f64, missing: usize) -> Vec<f64> {
    let limit = (duration - margin - SAFE_RANGE_EPSILON_S).max(0.0);
    (1..=missing)
        .map(|k| (duration * k as f64 / (missing + 1) as f64).clamp(0.0, limit))
        .collect()
}
