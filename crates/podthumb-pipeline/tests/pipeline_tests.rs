//! End-to-end orchestrator tests against in-process collaborators.

mod common;

use podthumb_gemini::VideoSource;
use podthumb_models::{NormalizedBox, RunOutcome, Stage};
use podthumb_pipeline::PipelineError;

use common::*;

const TITLE: &str = "Why Sleep Beats Caffeine";

fn two_speakers() -> String {
    speakers_json(&[("host", &[12.0, 30.5]), ("guest", &[44.0, 61.25])])
}

#[tokio::test]
async fn test_full_run_completes() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.stages_completed, Stage::ORDER.to_vec());
    assert_eq!(summary.headshots.len(), 2);
    assert!(summary.headshots.values().all(|p| p.is_file()));
    assert!(summary.thumbnail.as_ref().is_some_and(|p| p.is_file()));
    assert!(summary.omissions.is_empty());
    // identify + 2 headshots + compose
    assert_eq!(summary.remote_calls, 4);

    let layout = &orchestrator.config().layout;
    assert!(layout.manifest_path.is_file());
    assert_eq!(summary.headshots["host"], layout.canonical_headshot("host"));
}

#[tokio::test]
async fn test_second_run_makes_no_remote_calls() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let first = orchestrator.run(ws.source(), TITLE).await.unwrap();
    let second = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert_eq!(second.remote_calls, 0);
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(first.thumbnail, second.thumbnail);
    assert_eq!(first.headshots, second.headshots);

    assert_eq!(harness.identifier.calls(), 1);
    assert_eq!(harness.generator.calls(), 3);
    assert_eq!(harness.extractor.extract_calls(), 2);
}

#[tokio::test]
async fn test_existing_headshot_skips_generation() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let config = ws.config();
    let existing = config.layout.canonical_headshot("host");
    write_image(&existing, 32, 32);
    let orchestrator = harness.orchestrator(config);

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    // guest headshot + compose
    assert_eq!(harness.generator.calls(), 2);
    assert_eq!(summary.headshots["host"], existing);
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_title_change_recomposes_only() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let first = orchestrator.run(ws.source(), TITLE).await.unwrap();
    let second = orchestrator.run(ws.source(), "A Different Title").await.unwrap();

    assert_eq!(second.remote_calls, 1);
    assert_ne!(first.thumbnail, second.thumbnail);
}

#[tokio::test]
async fn test_padding_synthesizes_centered_candidates() {
    let ws = Workspace::new();
    // 150s is past the end of the 100s video
    let json = speakers_json(&[("host", &[10.0, 150.0])]);
    let harness = Harness::new(FakeIdentifier::text(&json), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let (manifest, summary) = orchestrator.sample(ws.source()).await.unwrap();

    let frames = &manifest.speakers[0].frames;
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].timestamp_s, 10.0);
    assert!(!frames[0].synthesized);

    let synthesized: Vec<_> = frames.iter().filter(|c| c.synthesized).collect();
    assert_eq!(synthesized.len(), 3);
    assert_eq!(
        synthesized.iter().map(|c| c.timestamp_s).collect::<Vec<_>>(),
        vec![25.0, 50.0, 75.0]
    );
    assert!(synthesized.iter().all(|c| c.bbox == NormalizedBox::CENTERED));

    assert!(frames.iter().all(|c| c.frame_path.is_some()));
    assert!(frames.iter().all(|c| c.crop_path.as_ref().is_some_and(|p| p.is_file())));
    assert_eq!(
        summary.stages_completed,
        vec![Stage::Identify, Stage::ExtractAndCrop]
    );
    assert_eq!(harness.generator.calls(), 0);
}

#[tokio::test]
async fn test_malformed_frame_proposals_are_padded() {
    let ws = Workspace::new();
    let json = r#"{"speakers": [{"id": "host", "frames": [
        {"timestamp_s": 10.0, "bbox": {"x1": 0.3, "y1": 0.2, "x2": 0.6}},
        {"timestamp_s": "later", "bbox": null}
    ]}]}"#;
    let harness = Harness::new(FakeIdentifier::text(json), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let (manifest, _) = orchestrator.sample(ws.source()).await.unwrap();

    let frames = &manifest.speakers[0].frames;
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].timestamp_s, 10.0);
    assert_eq!(frames[0].bbox, NormalizedBox::new(0.3, 0.2, 0.6, 1.0));
    assert_eq!(frames.iter().filter(|c| c.synthesized).count(), 3);
    assert_eq!(harness.identifier.calls(), 1);
}

#[tokio::test]
async fn test_partial_extraction_pairs_by_timestamp_and_resumes() {
    let ws = Workspace::new();
    let json = speakers_json(&[("host", &[10.0, 20.0, 30.0, 40.0])]);
    let harness = Harness::new(FakeIdentifier::text(&json), FakeGenerator::new())
        .with_extractor(FakeExtractor::dropping_alternate(100.0));
    let orchestrator = harness.orchestrator(ws.config());

    let (first, _) = orchestrator.sample(ws.source()).await.unwrap();
    let frames = &first.speakers[0].frames;
    let extracted: Vec<bool> = frames.iter().map(|c| c.frame_path.is_some()).collect();
    assert_eq!(extracted, vec![true, false, true, false]);

    let name = |i: usize, manifest: &podthumb_models::SpeakerManifest| {
        manifest.speakers[0].frames[i]
            .frame_path
            .as_ref()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string()
    };
    assert_eq!(name(2, &first), "frame_002_30p000.jpg");
    assert!(frames[1].crop_path.is_none());
    assert!(frames[1].crop_error.is_none());

    // The cached manifest is reused and only the gaps are extracted.
    let (second, summary) = orchestrator.sample(ws.source()).await.unwrap();
    assert_eq!(summary.remote_calls, 0);
    assert_eq!(harness.extractor.extract_calls(), 2);
    assert!(second.speakers[0].frames.iter().all(|c| c.frame_path.is_some()));
    assert_eq!(name(1, &second), "frame_001_20p000.jpg");
    assert_eq!(name(3, &second), "frame_003_40p000.jpg");
    assert_eq!(name(2, &second), "frame_002_30p000.jpg");
}

#[tokio::test]
async fn test_degenerate_box_records_crop_error() {
    let ws = Workspace::new();
    let json = r#"{"speakers": [{"id": "host", "frames": [
        {"timestamp_s": 5.0, "bbox": {"x1": 0.5, "y1": 0.5, "x2": 0.5, "y2": 0.5}}
    ]}]}"#;
    let harness = Harness::new(FakeIdentifier::text(json), FakeGenerator::new());
    let mut config = ws.config();
    config.timestamps_per_speaker = 1;
    let orchestrator = harness.orchestrator(config);

    let (manifest, _) = orchestrator.sample(ws.source()).await.unwrap();

    let candidate = &manifest.speakers[0].frames[0];
    assert!(candidate.frame_path.is_some());
    assert!(candidate.crop_path.is_none());
    assert!(candidate.crop_error.is_some());
}

#[tokio::test]
async fn test_schema_rejection_fails_identify() {
    let ws = Workspace::new();
    let harness = Harness::new(
        FakeIdentifier::text(r#"{"speakers": "not-a-list"}"#),
        FakeGenerator::new(),
    );
    let orchestrator = harness.orchestrator(ws.config());

    let failure = orchestrator.run(ws.source(), TITLE).await.unwrap_err();

    assert!(matches!(failure.error, PipelineError::Schema { .. }));
    assert_eq!(
        failure.error.raw_response(),
        Some(r#"{"speakers": "not-a-list"}"#)
    );
    assert!(failure.summary.stages_completed.is_empty());
    assert!(matches!(
        failure.summary.outcome,
        RunOutcome::Failed {
            stage: Stage::Identify,
            ..
        }
    ));
    assert_eq!(harness.identifier.calls(), 1);
}

#[tokio::test]
async fn test_blocked_identify_is_not_retried() {
    let ws = Workspace::new();
    let harness = Harness::new(
        FakeIdentifier::new(vec![blocked_payload("SAFETY")]),
        FakeGenerator::new(),
    );
    let orchestrator = harness.orchestrator(ws.config());

    let failure = orchestrator.run(ws.source(), TITLE).await.unwrap_err();

    assert!(matches!(
        failure.error,
        PipelineError::Blocked {
            stage: Stage::Identify,
            ..
        }
    ));
    assert!(failure.to_string().contains("SAFETY"));
    assert!(failure.summary.stages_completed.is_empty());
    assert_eq!(failure.summary.remote_calls, 1);
    assert_eq!(harness.identifier.calls(), 1);
}

#[tokio::test]
async fn test_empty_identify_text_is_retried() {
    let ws = Workspace::new();
    let harness = Harness::new(
        FakeIdentifier::new(vec![empty_payload(), text_payload(&two_speakers())]),
        FakeGenerator::new(),
    );
    let orchestrator = harness.orchestrator(ws.config());

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert_eq!(harness.identifier.calls(), 2);
    assert_eq!(summary.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_empty_identify_text_exhausts_attempts() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::new(vec![empty_payload()]), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let failure = orchestrator.run(ws.source(), TITLE).await.unwrap_err();

    assert!(matches!(
        failure.error,
        PipelineError::NoArtifacts { attempts: 3, .. }
    ));
    assert_eq!(harness.identifier.calls(), 3);
}

#[tokio::test]
async fn test_single_headshot_is_partial() {
    let ws = Workspace::new();
    let json = speakers_json(&[("host", &[12.0])]);
    let harness = Harness::new(FakeIdentifier::text(&json), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert!(matches!(summary.outcome, RunOutcome::Partial { .. }));
    assert!(summary.thumbnail.is_none());
    assert_eq!(
        summary.stages_completed,
        vec![Stage::Identify, Stage::ExtractAndCrop, Stage::Headshot]
    );
    assert!(!summary.warnings.is_empty());
}

#[tokio::test]
async fn test_blocked_headshots_become_omissions() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::blocking());
    let orchestrator = harness.orchestrator(ws.config());

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert_eq!(summary.omissions.len(), 2);
    assert!(summary.headshots.is_empty());
    assert!(matches!(summary.outcome, RunOutcome::Partial { .. }));
    // blocked content is not retried
    assert_eq!(harness.generator.calls(), 2);
}

#[tokio::test]
async fn test_reference_truncation_is_reported() {
    let ws = Workspace::new();
    let json = speakers_json(&[("host", &[5.0, 10.0, 15.0, 20.0]), ("guest", &[25.0])]);
    let harness = Harness::new(FakeIdentifier::text(&json), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let summary = orchestrator.run(ws.source(), TITLE).await.unwrap();

    assert!(summary
        .warnings
        .iter()
        .any(|w| w.contains("host") && w.contains("3 of 4")));
}

#[tokio::test]
async fn test_url_sample_skips_extraction() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let (manifest, summary) = orchestrator
        .sample(VideoSource::Url("https://example.com/episode".to_string()))
        .await
        .unwrap();

    assert_eq!(manifest.speakers.len(), 2);
    assert_eq!(summary.stages_completed, vec![Stage::Identify]);
    assert!(matches!(summary.outcome, RunOutcome::Partial { .. }));
    assert_eq!(harness.extractor.extract_calls(), 0);
}

#[tokio::test]
async fn test_url_run_is_config_error() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let failure = orchestrator
        .run(VideoSource::Url("https://example.com/episode".to_string()), TITLE)
        .await
        .unwrap_err();

    assert!(failure.error.is_config_error());
    assert_eq!(harness.identifier.calls(), 0);
}

#[tokio::test]
async fn test_missing_video_is_config_error() {
    let ws = Workspace::new();
    let harness = Harness::new(FakeIdentifier::text(&two_speakers()), FakeGenerator::new());
    let orchestrator = harness.orchestrator(ws.config());

    let failure = orchestrator
        .run(VideoSource::Local(ws.dir.path().join("missing.mp4")), TITLE)
        .await
        .unwrap_err();

    assert!(failure.error.is_config_error());
    assert_eq!(failure.summary.remote_calls, 0);
}
