//! Content-addressed cache keys for generated artifacts.
//!
//! A key is a SHA-256 over the stage name, the caller-ordered scalar
//! parameters and, for every input file, its base name and full contents.
//! Every field is written as `tag || u64 length || bytes`, so no two distinct
//! field sequences produce the same byte stream.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Hex characters of the key embedded in artifact file names.
pub const SHORT_KEY_LEN: usize = 10;

const TAG_STAGE: u8 = b's';
const TAG_PARAM: u8 = b'p';
const TAG_ABSENT: u8 = b'a';
const TAG_FILE_NAME: u8 = b'n';
const TAG_FILE_BYTES: u8 = b'f';

/// Incremental builder for a [`Fingerprint`].
#[derive(Clone)]
pub struct CacheKey {
    hasher: Sha256,
}

impl CacheKey {
    pub fn new(stage: &str) -> Self {
        let mut key = Self {
            hasher: Sha256::new(),
        };
        key.field(TAG_STAGE, stage.as_bytes());
        key
    }

    fn field(&mut self, tag: u8, bytes: &[u8]) {
        self.hasher.update([tag]);
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn param(mut self, value: impl AsRef<str>) -> Self {
        self.field(TAG_PARAM, value.as_ref().as_bytes());
        self
    }

    pub fn number(self, value: impl fmt::Display) -> Self {
        self.param(value.to_string())
    }

    pub fn flag(self, value: bool) -> Self {
        self.param(if value { "true" } else { "false" })
    }

    /// Optional parameter; `None` hashes differently from every `Some`.
    pub fn optional(mut self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.param(v),
            None => {
                self.field(TAG_ABSENT, &[]);
                self
            }
        }
    }

    /// Add a file's base name and contents. Unreadable files are skipped.
    pub fn file(mut self, path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                self.field(TAG_FILE_NAME, name.as_bytes());
                self.field(TAG_FILE_BYTES, &bytes);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable cache-key input");
            }
        }
        self
    }

    pub fn files<P: AsRef<Path>>(self, paths: &[P]) -> Self {
        paths.iter().fold(self, |key, p| key.file(p.as_ref()))
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(format!("{:x}", self.hasher.finalize()))
    }
}

/// 64-character lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..SHORT_KEY_LEN]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
