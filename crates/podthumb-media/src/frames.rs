//! Still-frame extraction at arbitrary timestamps.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Default JPEG quality for extracted frames.
pub const FRAME_JPEG_QUALITY: u8 = 2;

/// Per-frame FFmpeg timeout.
const FRAME_TIMEOUT_SECS: u64 = 60;

/// One frame to extract. `index` is the caller's stable slot for the
/// timestamp and only affects the file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRequest {
    pub index: usize,
    pub timestamp_s: f64,
}

impl FrameRequest {
    pub fn new(index: usize, timestamp_s: f64) -> Self {
        Self { index, timestamp_s }
    }

    pub fn file_name(&self) -> String {
        frame_file_name(self.index, self.timestamp_s)
    }
}

/// A frame that was actually written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrame {
    pub timestamp_s: f64,
    pub path: PathBuf,
}

/// File name for the frame in slot `index`.
///
/// Format: `frame_{index:03}_{seconds with '.' replaced by 'p'}.jpg`
pub fn frame_file_name(index: usize, timestamp_s: f64) -> String {
    let ts = format!("{:.3}", timestamp_s).replace('.', "p");
    format!("frame_{:03}_{}.jpg", index, ts)
}

/// Extract one frame per request into `out_dir`.
///
/// Timestamps that cannot be extracted (outside the video, decoder errors)
/// are skipped silently, so the result is an ordered *subset* of the request.
/// Callers must pair results using the returned timestamps, never by position
/// in the requested list. A missing ffmpeg binary is still an error.
pub async fn extract_frames(
    video_path: impl AsRef<Path>,
    requests: &[FrameRequest],
    out_dir: impl AsRef<Path>,
) -> MediaResult<Vec<ExtractedFrame>> {
    let video_path = video_path.as_ref();
    let out_dir = out_dir.as_ref();

    check_ffmpeg()?;
    fs::create_dir_all(out_dir).await?;

    let runner = FfmpegRunner::new().with_timeout(FRAME_TIMEOUT_SECS);
    let mut written = Vec::with_capacity(requests.len());

    for request in requests {
        let ts = request.timestamp_s;
        if !ts.is_finite() || ts < 0.0 {
            debug!(timestamp_s = ts, "Skipping invalid timestamp");
            continue;
        }

        let frame_path = out_dir.join(request.file_name());
        let cmd = FfmpegCommand::new(video_path, &frame_path)
            .seek(ts)
            .single_frame()
            .jpeg_quality(FRAME_JPEG_QUALITY);

        match runner.run(&cmd).await {
            // ffmpeg exits 0 without writing anything when seeking past the end.
            Ok(()) if frame_path.exists() => written.push(ExtractedFrame {
                timestamp_s: ts,
                path: frame_path,
            }),
            Ok(()) => debug!(timestamp_s = ts, "FFmpeg produced no frame"),
            Err(e) => warn!(timestamp_s = ts, error = %e, "Frame extraction failed, skipping"),
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0, 12.3), "frame_000_12p300.jpg");
        assert_eq!(frame_file_name(17, 0.0), "frame_017_0p000.jpg");
    }

    #[test]
    fn test_request_keeps_caller_index() {
        assert_eq!(FrameRequest::new(3, 40.0).file_name(), "frame_003_40p000.jpg");
    }
}
