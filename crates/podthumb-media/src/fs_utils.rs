//! Filesystem utilities for persisted pipeline state.
//!
//! Readers of the manifest and of generated artifacts must never observe a
//! half-written file, so every write goes to a temporary sibling first and is
//! then renamed over the destination (same directory, same filesystem).

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::MediaResult;

/// Temporary sibling used while writing `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` atomically, creating parent directories.
pub async fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, contents.as_ref()).await?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        tracing::error!(
            "Failed to rename temp file into place: {} -> {}: {}",
            tmp.display(),
            path.display(),
            e
        );
        return Err(e.into());
    }

    Ok(())
}

/// Copy `src` to `dst` atomically (the destination appears complete or not at all).
pub async fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let bytes = fs::read(src.as_ref()).await?;
    write_atomic(dst, bytes).await
}
