//! Reference images sent to, and images received from, the image model.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tokio::fs;

use crate::error::MediaResult;
use crate::fs_utils::write_atomic;

/// Minimum side of a square reference after center cropping.
pub const REFERENCE_MIN_SIDE: u32 = 512;

/// Image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image/png", bytes)
    }
}

/// MIME type from a file extension. Unknown extensions are treated as PNG.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "image/png",
    }
}

/// Decode a reference, optionally center-crop it to a square (upscaled to at
/// least [`REFERENCE_MIN_SIDE`]), and re-encode as PNG.
pub fn prepare_reference(path: &Path, crop_square: bool) -> MediaResult<EncodedImage> {
    let img = image::open(path)?;
    let img = if crop_square {
        square_center_crop(&img, REFERENCE_MIN_SIDE)
    } else {
        img
    };
    encode_png(&img).map(EncodedImage::png)
}

/// Read a reference as-is, without decoding.
pub async fn load_reference(path: &Path) -> MediaResult<EncodedImage> {
    let bytes = fs::read(path).await?;
    Ok(EncodedImage::new(mime_for_path(path), bytes))
}

/// Persist a generated image at `out_path` as PNG.
///
/// PNG payloads are written verbatim; anything else is transcoded.
pub async fn save_generated_image(image: &EncodedImage, out_path: &Path) -> MediaResult<()> {
    if image.mime_type.eq_ignore_ascii_case("image/png") {
        return write_atomic(out_path, &image.bytes).await;
    }
    let decoded = image::load_from_memory(&image.bytes)?;
    let png = encode_png(&decoded)?;
    write_atomic(out_path, png).await
}

fn square_center_crop(img: &DynamicImage, min_side: u32) -> DynamicImage {
    let side = img.width().min(img.height());
    let left = (img.width() - side) / 2;
    let top = (img.height() - side) / 2;
    let cropped = img.crop_imm(left, top, side, side);
    if side < min_side {
        cropped.resize_exact(min_side, min_side, FilterType::Lanczos3)
    } else {
        cropped
    }
}

fn encode_png(img: &DynamicImage) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(mime_for_path(Path::new("noext")), "image/png");
    }

    #[test]
    fn test_prepare_reference_squares_and_upscales() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crop.png");
        image::RgbImage::new(300, 200).save(&path).unwrap();

        let encoded = prepare_reference(&path, true).unwrap();
        assert_eq!(encoded.mime_type, "image/png");
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (512, 512));
    }

    #[test]
    fn test_prepare_reference_without_crop_keeps_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.jpg");
        image::RgbImage::new(64, 32).save(&path).unwrap();

        let encoded = prepare_reference(&path, false).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[tokio::test]
    async fn test_save_generated_jpeg_is_transcoded() {
        let dir = TempDir::new().unwrap();
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let out = dir.path().join("headshot.png");
        save_generated_image(&EncodedImage::new("image/jpeg", jpeg), &out)
            .await
            .unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(
            image::guess_format(&written).unwrap(),
            image::ImageFormat::Png
        );
    }
}
