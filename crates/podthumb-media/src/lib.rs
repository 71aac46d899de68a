//! Local media operations for the podthumb pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a timeout-aware runner
//! - FFprobe duration/dimension probing
//! - Frame extraction at arbitrary timestamps
//! - Waist-up crop geometry for model-reported face boxes
//! - Reference image preparation for the image model
//! - Atomic file writes for persisted state

pub mod command;
pub mod crop;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod probe;
pub mod reference;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use crop::{compute_crop, crop_frame, CropConfig, PixelRect, VerticalPolicy};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frames, frame_file_name, ExtractedFrame, FrameRequest};
pub use fs_utils::{copy_file, write_atomic};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use reference::{
    load_reference, mime_for_path, prepare_reference, save_generated_image, EncodedImage,
};
