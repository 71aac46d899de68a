//! In-process collaborators for orchestrator tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use podthumb_gemini::{
    GenerationPayload, ImageRequest, PreparedVideo, ResponseDiagnostics, VideoSource,
};
use podthumb_media::{EncodedImage, ExtractedFrame, FrameRequest};
use podthumb_pipeline::{
    Collaborators, FrameExtractor, ImageGenerator, OutputLayout, PipelineConfig,
    PipelineOrchestrator, PipelineResult, SpeakerIdentifier,
};
use tempfile::TempDir;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 90])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Write a solid image; the format follows the extension.
pub fn write_image(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb([60, 90, 140]))
        .save(path)
        .unwrap();
}

pub fn text_payload(text: &str) -> GenerationPayload {
    GenerationPayload::Content {
        texts: vec![text.to_string()],
        images: vec![],
        diagnostics: ResponseDiagnostics::default(),
    }
}

pub fn empty_payload() -> GenerationPayload {
    GenerationPayload::Content {
        texts: vec![],
        images: vec![],
        diagnostics: ResponseDiagnostics::default(),
    }
}

pub fn blocked_payload(reason: &str) -> GenerationPayload {
    GenerationPayload::Blocked {
        reason: reason.to_string(),
    }
}

/// Identification JSON with one speaker per `(id, timestamps)` entry.
pub fn speakers_json(speakers: &[(&str, &[f64])]) -> String {
    let entries: Vec<serde_json::Value> = speakers
        .iter()
        .map(|(id, timestamps)| {
            let frames: Vec<serde_json::Value> = timestamps
                .iter()
                .map(|ts| {
                    serde_json::json!({
                        "timestamp_s": ts,
                        "bbox": {"x1": 0.35, "y1": 0.2, "x2": 0.55, "y2": 0.6}
                    })
                })
                .collect();
            serde_json::json!({
                "id": id,
                "role": "guest",
                "note": "test speaker",
                "confidence": 0.9,
                "frames": frames
            })
        })
        .collect();
    serde_json::json!({ "speakers": entries }).to_string()
}

/// Writes a 640x360 JPEG per in-range timestamp.
pub struct FakeExtractor {
    pub duration: f64,
    pub extract_calls: AtomicU32,
    /// Skip every second request on the next call only.
    drop_alternate: AtomicBool,
}

impl FakeExtractor {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            extract_calls: AtomicU32::new(0),
            drop_alternate: AtomicBool::new(false),
        }
    }

    /// First call returns only every other requested frame.
    pub fn dropping_alternate(duration: f64) -> Self {
        let extractor = Self::new(duration);
        extractor.drop_alternate.store(true, Ordering::SeqCst);
        extractor
    }

    pub fn extract_calls(&self) -> u32 {
        self.extract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn duration(&self, _video: &Path) -> PipelineResult<f64> {
        Ok(self.duration)
    }

    async fn extract(
        &self,
        _video: &Path,
        requests: &[FrameRequest],
        out_dir: &Path,
    ) -> PipelineResult<Vec<ExtractedFrame>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let drop_alternate = self.drop_alternate.swap(false, Ordering::SeqCst);
        std::fs::create_dir_all(out_dir)?;

        let mut frames = Vec::new();
        for (position, request) in requests.iter().enumerate() {
            let ts = request.timestamp_s;
            if ts < 0.0 || ts >= self.duration || (drop_alternate && position % 2 == 1) {
                continue;
            }
            let path = out_dir.join(request.file_name());
            write_image(&path, 640, 360);
            frames.push(ExtractedFrame {
                timestamp_s: ts,
                path,
            });
        }
        Ok(frames)
    }
}

/// Replays scripted payloads; the last one repeats.
pub struct FakeIdentifier {
    responses: Vec<GenerationPayload>,
    calls: AtomicU32,
}

impl FakeIdentifier {
    pub fn new(responses: Vec<GenerationPayload>) -> Self {
        Self {
            responses,
            calls: AtomicU32::new(0),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![text_payload(text)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeakerIdentifier for FakeIdentifier {
    async fn prepare(&self, source: &VideoSource) -> PipelineResult<PreparedVideo> {
        Ok(PreparedVideo::remote(source.describe(), None))
    }

    async fn identify(
        &self,
        _model: &str,
        _video: &PreparedVideo,
        _prompt: &str,
    ) -> PipelineResult<GenerationPayload> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let index = call.min(self.responses.len().saturating_sub(1));
        Ok(self.responses[index].clone())
    }
}

/// Returns `request.count` small PNGs per call, or a block.
pub struct FakeGenerator {
    blocked: bool,
    calls: AtomicU32,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            blocked: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn blocking() -> Self {
        Self {
            blocked: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, _model: &str, request: &ImageRequest) -> PipelineResult<GenerationPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.blocked {
            return Ok(blocked_payload("IMAGE_SAFETY"));
        }
        let images = (0..request.count.max(1))
            .map(|_| EncodedImage::png(png_bytes(64, 64)))
            .collect();
        Ok(GenerationPayload::Content {
            texts: vec![],
            images,
            diagnostics: ResponseDiagnostics::default(),
        })
    }
}

/// A temporary output root plus a dummy local video.
pub struct Workspace {
    pub dir: TempDir,
    pub video: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("episode.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        Self { dir, video }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            layout: OutputLayout::under(self.dir.path()),
            retry_base_delay: Duration::from_millis(1),
            ..PipelineConfig::default()
        }
    }

    pub fn source(&self) -> VideoSource {
        VideoSource::Local(self.video.clone())
    }
}

pub struct Harness {
    pub extractor: Arc<FakeExtractor>,
    pub identifier: Arc<FakeIdentifier>,
    pub generator: Arc<FakeGenerator>,
}

impl Harness {
    pub fn new(identifier: FakeIdentifier, generator: FakeGenerator) -> Self {
        Self {
            extractor: Arc::new(FakeExtractor::new(100.0)),
            identifier: Arc::new(identifier),
            generator: Arc::new(generator),
        }
    }

    pub fn with_extractor(mut self, extractor: FakeExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn orchestrator(&self, config: PipelineConfig) -> PipelineOrchestrator {
        let collaborators = Collaborators {
            extractor: self.extractor.clone(),
            identifier: self.identifier.clone(),
            generator: self.generator.clone(),
        };
        PipelineOrchestrator::new(config, collaborators)
    }
}
