//! Waist-up crop geometry for model-reported face boxes.
//!
//! The video model reports a tight normalized face box. Thumbnails need head,
//! shoulders and upper torso, so the box is padded, widened to a minimum
//! width and, by default, stretched to the full frame height before being
//! mapped to pixels. The vertical box the model reports is deliberately
//! ignored under [`VerticalPolicy::FullHeight`]: face detectors under-report
//! the vertical extent needed for waist-up framing.

use std::path::{Path, PathBuf};

use podthumb_models::NormalizedBox;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// How the vertical extent of the crop is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerticalPolicy {
    /// Use the whole frame height.
    FullHeight,
    /// Keep the padded box, grown symmetrically to at least this fraction.
    MinHeight(f64),
}

/// Crop tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropConfig {
    /// Outward padding as a fraction of the box's own width/height.
    pub padding: f64,
    /// Minimum crop width as a fraction of the frame width.
    pub min_width: f64,
    pub vertical: VerticalPolicy,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            padding: 0.35,
            min_width: 0.35,
            vertical: VerticalPolicy::FullHeight,
        }
    }
}

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Map a normalized face box to a pixel crop for a `frame_width x frame_height` frame.
///
/// Fails with [`MediaError::InvalidGeometry`] when the clamped box has no
/// extent, and with [`MediaError::EmptyCrop`] when the frame itself is empty.
pub fn compute_crop(
    bbox: &NormalizedBox,
    frame_width: u32,
    frame_height: u32,
    config: &CropConfig,
) -> MediaResult<PixelRect> {
    let b = bbox.clamped();
    if b.is_degenerate() {
        return Err(MediaError::invalid_geometry(format!(
            "degenerate box x1={} y1={} x2={} y2={}",
            b.x1, b.y1, b.x2, b.y2
        )));
    }

    let pad_x = config.padding * b.width();
    let pad_y = config.padding * b.height();
    let (x1, x2) = widen(b.x1 - pad_x, b.x2 + pad_x, config.min_width);

    let (y1, y2) = match config.vertical {
        VerticalPolicy::FullHeight => (0.0, 1.0),
        VerticalPolicy::MinHeight(min_height) => widen(b.y1 - pad_y, b.y2 + pad_y, min_height),
    };

    let (px, pw) = to_pixels(x1, x2, frame_width);
    let (py, ph) = to_pixels(y1, y2, frame_height);

    if pw == 0 || ph == 0 {
        return Err(MediaError::EmptyCrop {
            width: pw,
            height: ph,
        });
    }

    Ok(PixelRect {
        x: px,
        y: py,
        width: pw,
        height: ph,
    })
}

/// Clamp a 1-D span to `[0, 1]`, then grow it symmetrically around its
/// center to at least `min_extent`, clamping again at the edges.
fn widen(lo: f64, hi: f64, min_extent: f64) -> (f64, f64) {
    let lo = lo.max(0.0);
    let hi = hi.min(1.0);
    let center = (lo + hi) / 2.0;
    let half = (hi - lo).max(min_extent.clamp(0.0, 1.0)) / 2.0;
    ((center - half).max(0.0), (center + half).min(1.0))
}

/// Convert a normalized span to `(offset, length)` pixels: floor the near
/// edge, ceil the far edge, keep at least one pixel inside the frame.
fn to_pixels(lo: f64, hi: f64, extent: u32) -> (u32, u32) {
    if extent == 0 {
        return (0, 0);
    }
    let scale = extent as f64;
    let start = ((lo * scale).floor().max(0.0) as u32).min(extent - 1);
    let end = ((hi * scale).ceil() as u32).clamp(start + 1, extent);
    (start, end - start)
}

/// Crop `frame_path` around `bbox` and write `{stem}_crop.png` into `out_dir`.
pub fn crop_frame(
    frame_path: &Path,
    bbox: &NormalizedBox,
    out_dir: &Path,
    config: &CropConfig,
) -> MediaResult<PathBuf> {
    std::fs::create_dir_all(out_dir)?;

    let img = image::open(frame_path)?;
    let rect = compute_crop(bbox, img.width(), img.height(), config)?;
    let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);

    let stem = frame_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "frame".to_string());
    let out_path = out_dir.join(format!("{}_crop.png", stem));

    cropped.to_rgb8().save(&out_path)?;
    debug!(
        frame = %frame_path.display(),
        crop = %out_path.display(),
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height,
        "Cropped frame"
    );
    Ok(out_path)
}
