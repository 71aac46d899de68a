//! Pipeline configuration.
//!
//! Resolved once at process start from `.env` files, the process environment
//! and command-line overrides (highest precedence), then passed by value.

use std::path::{Path, PathBuf};
use std::time::Duration;

use podthumb_gemini::{GeminiConfig, DEFAULT_BASE_URL};
use podthumb_media::CropConfig;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::prompts::Template;
use crate::retry::RetryPolicy;

pub const DEFAULT_IDENTIFY_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_HEADSHOT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_COMPOSE_MODEL: &str = "gemini-3-pro-image-preview";

/// Where the pipeline reads and writes its persisted state.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub manifest_path: PathBuf,
    pub frames_dir: PathBuf,
    pub crops_dir: PathBuf,
    /// Canonical per-speaker headshots live directly in this directory.
    pub headshots_dir: PathBuf,
    pub thumbnails_dir: PathBuf,
}

impl OutputLayout {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            manifest_path: root.join("manifests").join("speakers.json"),
            frames_dir: root.join("artifacts").join("frames"),
            crops_dir: root.join("artifacts").join("crops"),
            headshots_dir: root.join("artifacts").join("headshots"),
            thumbnails_dir: root.join("artifacts").join("thumbnails"),
        }
    }

    /// Content-addressed generation outputs, kept apart from canonical headshots.
    pub fn generated_headshots_dir(&self) -> PathBuf {
        self.headshots_dir.join("generated")
    }

    pub fn canonical_headshot(&self, speaker_id: &str) -> PathBuf {
        self.headshots_dir.join(format!("{}.png", speaker_id))
    }
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self::under(".")
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Gemini API key; only required once a remote call is about to happen
    pub api_key: Option<String>,
    pub gemini_base_url: String,
    pub identify_model: String,
    pub headshot_model: String,
    pub compose_model: String,
    /// Maximum age of a reusable speaker manifest
    pub manifest_ttl: Duration,
    /// Linear backoff unit between generation attempts
    pub retry_base_delay: Duration,
    pub max_attempts: u32,
    pub timestamps_per_speaker: usize,
    /// Candidates closer than this to the end of the video are dropped
    pub timestamp_margin_s: f64,
    pub max_headshot_references: usize,
    pub headshot_aspect_ratio: String,
    pub headshot_image_size: String,
    pub thumbnail_aspect_ratio: String,
    pub template: Template,
    pub crop: CropConfig,
    pub layout: OutputLayout,
    pub use_cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            identify_model: DEFAULT_IDENTIFY_MODEL.to_string(),
            headshot_model: DEFAULT_HEADSHOT_MODEL.to_string(),
            compose_model: DEFAULT_COMPOSE_MODEL.to_string(),
            manifest_ttl: Duration::from_secs(24 * 60 * 60),
            retry_base_delay: Duration::from_secs(2),
            max_attempts: 3,
            timestamps_per_speaker: 4,
            timestamp_margin_s: 0.5,
            max_headshot_references: 3,
            headshot_aspect_ratio: "1:1".to_string(),
            headshot_image_size: "1K".to_string(),
            thumbnail_aspect_ratio: "16:9".to_string(),
            template: Template::default(),
            crop: CropConfig::default(),
            layout: OutputLayout::default(),
            use_cache: true,
        }
    }
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub identify_model: Option<String>,
    pub headshot_model: Option<String>,
    pub compose_model: Option<String>,
    pub output_root: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub frames_dir: Option<PathBuf>,
    pub timestamps_per_speaker: Option<usize>,
    pub template: Option<Template>,
    pub use_cache: Option<bool>,
}

impl PipelineConfig {
    /// Load `.env` candidates, then resolve from the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> PipelineResult<Self> {
        let loaded = load_env_files();
        debug!(files = ?loaded, "Loaded environment files");
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Resolve from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F, overrides: ConfigOverrides) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let template = match overrides.template {
            Some(t) => t,
            None => match var("PODTHUMB_TEMPLATE") {
                Some(name) => name.parse().map_err(PipelineError::config)?,
                None => defaults.template,
            },
        };

        let mut layout = overrides
            .output_root
            .map(OutputLayout::under)
            .unwrap_or(defaults.layout);
        if let Some(path) = overrides.manifest_path {
            layout.manifest_path = path;
        }
        if let Some(dir) = overrides.frames_dir {
            layout.frames_dir = dir;
        }

        Ok(Self {
            api_key: overrides
                .api_key
                .or_else(|| var("GEMINI_API_KEY"))
                .or_else(|| var("GOOGLE_API_KEY")),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            identify_model: overrides
                .identify_model
                .or_else(|| var("PODTHUMB_IDENTIFY_MODEL"))
                .unwrap_or(defaults.identify_model),
            headshot_model: overrides
                .headshot_model
                .or_else(|| var("PODTHUMB_HEADSHOT_MODEL"))
                .unwrap_or(defaults.headshot_model),
            compose_model: overrides
                .compose_model
                .or_else(|| var("PODTHUMB_COMPOSE_MODEL"))
                .unwrap_or(defaults.compose_model),
            manifest_ttl: var("PODTHUMB_MANIFEST_TTL_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.manifest_ttl),
            retry_base_delay: var("PODTHUMB_RETRY_BASE_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            timestamps_per_speaker: overrides
                .timestamps_per_speaker
                .unwrap_or(defaults.timestamps_per_speaker),
            template,
            layout,
            use_cache: overrides.use_cache.unwrap_or(defaults.use_cache),
            ..defaults
        })
    }

    /// The API key, or a configuration error naming the variables to set.
    pub fn require_api_key(&self) -> PipelineResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| PipelineError::config("Set GEMINI_API_KEY (or GOOGLE_API_KEY)"))
    }

    pub fn gemini_config(&self) -> PipelineResult<GeminiConfig> {
        Ok(GeminiConfig::new(self.require_api_key()?).with_base_url(&self.gemini_base_url))
    }

    pub fn retry_policy(&self, operation: &str) -> RetryPolicy {
        RetryPolicy::new(operation)
            .with_max_attempts(self.max_attempts)
            .with_base_delay(self.retry_base_delay)
    }
}

/// `.env` candidates in load order. Earlier files win over later ones and the
/// process environment wins over all of them.
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(".env")];
    if let Ok(path) = std::env::var("PODTHUMB_ENV_FILE") {
        candidates.push(PathBuf::from(path));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(
            Path::new(&home)
                .join(".config")
                .join("podthumb")
                .join(".env"),
        );
    }
    candidates
}

/// Load every existing candidate without overriding variables already set.
pub fn load_env_files() -> Vec<PathBuf> {
    env_file_candidates()
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| dotenvy::from_path(path).is_ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_lookup(lookup(&[]), ConfigOverrides::default()).unwrap();
        assert_eq!(config.identify_model, DEFAULT_IDENTIFY_MODEL);
        assert_eq!(config.manifest_ttl, Duration::from_secs(86_400));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timestamps_per_speaker, 4);
        assert!(config.api_key.is_none());
        assert!(config.require_api_key().unwrap_err().is_config_error());
    }

    #[test]
    fn test_google_key_fallback_and_env_values() {
        let config = PipelineConfig::from_lookup(
            lookup(&[
                ("GOOGLE_API_KEY", "g-key"),
                ("PODTHUMB_HEADSHOT_MODEL", "custom-image"),
                ("PODTHUMB_MANIFEST_TTL_SECS", "60"),
                ("PODTHUMB_RETRY_BASE_MS", "10"),
                ("GEMINI_BASE_URL", "http://localhost:9999"),
            ]),
            ConfigOverrides::default(),
        )
        .unwrap();

        assert_eq!(config.require_api_key().unwrap(), "g-key");
        assert_eq!(config.headshot_model, "custom-image");
        assert_eq!(config.manifest_ttl, Duration::from_secs(60));
        assert_eq!(config.retry_base_delay, Duration::from_millis(10));
        assert_eq!(config.gemini_config().unwrap().base_url, "http://localhost:9999");
    }

    #[test]
    fn test_overrides_win_over_environment() {
        let config = PipelineConfig::from_lookup(
            lookup(&[("GEMINI_API_KEY", "env-key"), ("PODTHUMB_IDENTIFY_MODEL", "env-model")]),
            ConfigOverrides {
                api_key: Some("flag-key".to_string()),
                identify_model: Some("flag-model".to_string()),
                output_root: Some(PathBuf::from("/tmp/out")),
                use_cache: Some(false),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("flag-key"));
        assert_eq!(config.identify_model, "flag-model");
        assert_eq!(
            config.layout.manifest_path,
            PathBuf::from("/tmp/out/manifests/speakers.json")
        );
        assert!(!config.use_cache);
    }

    #[test]
    fn test_unknown_template_is_config_error() {
        let err = PipelineConfig::from_lookup(
            lookup(&[("PODTHUMB_TEMPLATE", "vaporwave")]),
            ConfigOverrides::default(),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_canonical_headshot_path() {
        let layout = OutputLayout::under("/data");
        assert_eq!(
            layout.canonical_headshot("speaker_1"),
            PathBuf::from("/data/artifacts/headshots/speaker_1.png")
        );
    }
}
