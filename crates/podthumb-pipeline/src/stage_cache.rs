//! Stage memoization on top of the filesystem.
//!
//! There is no cache index: an artifact cache entry exists iff every
//! expected output file exists, and the manifest entry is the manifest file
//! itself, valid while younger than its TTL.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use podthumb_media::write_atomic;
use podthumb_models::{SpeakerManifest, Stage};
use tracing::debug;

use crate::cache_key::Fingerprint;
use crate::error::PipelineResult;
use crate::metrics;

/// Expected outputs for a content-addressed generation.
///
/// One output is `{dir}/{stem}_{key10}.{ext}`; several are numbered
/// `{dir}/{stem}_{key10}_{n}.{ext}` from 1.
pub fn artifact_paths(
    dir: &Path,
    stem: &str,
    ext: &str,
    key: &Fingerprint,
    count: u32,
) -> Vec<PathBuf> {
    if count <= 1 {
        return vec![dir.join(format!("{}_{}.{}", stem, key.short(), ext))];
    }
    (1..=count)
        .map(|n| dir.join(format!("{}_{}_{}.{}", stem, key.short(), n, ext)))
        .collect()
}

/// Existence-based cache for generated images.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactCache {
    stage: Stage,
    enabled: bool,
}

impl ArtifactCache {
    pub fn new(stage: Stage, enabled: bool) -> Self {
        Self { stage, enabled }
    }

    /// `true` only when caching is enabled and every expected output exists.
    pub fn is_hit(&self, expected: &[PathBuf]) -> bool {
        let hit = self.enabled && !expected.is_empty() && expected.iter().all(|p| p.is_file());
        metrics::record_cache(self.stage, hit);
        debug!(
            stage = %self.stage,
            hit,
            enabled = self.enabled,
            outputs = expected.len(),
            "Artifact cache lookup"
        );
        hit
    }
}

/// TTL cache for the speaker manifest.
#[derive(Debug, Clone)]
pub struct ManifestCache {
    path: PathBuf,
    ttl: Duration,
}

impl ManifestCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh, parseable manifest. Missing, expired and corrupt files are
    /// all misses.
    pub async fn load_fresh(&self) -> Option<SpeakerManifest> {
        let manifest = self.try_load_fresh().await;
        metrics::record_cache(Stage::Identify, manifest.is_some());
        manifest
    }

    async fn try_load_fresh(&self) -> Option<SpeakerManifest> {
        let meta = tokio::fs::metadata(&self.path).await.ok()?;
        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();
        if age >= self.ttl {
            debug!(path = %self.path.display(), age_secs = age.as_secs(), "Manifest expired");
            return None;
        }

        let text = tokio::fs::read_to_string(&self.path).await.ok()?;
        match SpeakerManifest::from_json(&text) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Ignoring corrupt manifest");
                None
            }
        }
    }

    /// Serialize once and replace the file atomically.
    pub async fn store(&self, manifest: &SpeakerManifest) -> PipelineResult<()> {
        let json = manifest.to_pretty_json()?;
        write_atomic(&self.path, json).await?;
        debug!(path = %self.path.display(), speakers = manifest.speakers.len(), "Manifest written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_key::CacheKey;
    use podthumb_models::{Speaker, SpeakerRole};
    use tempfile::TempDir;

    fn manifest() -> SpeakerManifest {
        SpeakerManifest::new(vec![Speaker::new("speaker_1", SpeakerRole::Host)])
    }

    #[test]
    fn test_artifact_paths() {
        let key = CacheKey::new("headshot").param("m").finish();
        let one = artifact_paths(Path::new("/out"), "thumb", "png", &key, 1);
        assert_eq!(
            one,
            vec![PathBuf::from(format!("/out/thumb_{}.png", key.short()))]
        );

        let three = artifact_paths(Path::new("/out"), "thumb", "png", &key, 3);
        assert_eq!(three.len(), 3);
        assert!(three[2].ends_with(format!("thumb_{}_3.png", key.short())));
    }

    #[test]
    fn test_artifact_hit_requires_all_outputs() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::new("headshot").finish();
        let paths = artifact_paths(dir.path(), "h", "png", &key, 2);
        let cache = ArtifactCache::new(Stage::Headshot, true);

        std::fs::write(&paths[0], b"x").unwrap();
        assert!(!cache.is_hit(&paths));

        std::fs::write(&paths[1], b"x").unwrap();
        assert!(cache.is_hit(&paths));
        assert!(!ArtifactCache::new(Stage::Headshot, false).is_hit(&paths));
    }

    #[tokio::test]
    async fn test_manifest_round_trip_within_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(
            dir.path().join("manifests/speakers.json"),
            Duration::from_secs(3600),
        );

        assert!(cache.load_fresh().await.is_none());
        tokio_test::assert_ok!(cache.store(&manifest()).await);
        assert_eq!(cache.load_fresh().await, Some(manifest()));
    }

    #[tokio::test]
    async fn test_expired_manifest_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(dir.path().join("speakers.json"), Duration::ZERO);
        cache.store(&manifest()).await.unwrap();
        assert!(cache.load_fresh().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_miss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("speakers.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = ManifestCache::new(&path, Duration::from_secs(3600));
        assert!(cache.load_fresh().await.is_none());
    }
}
