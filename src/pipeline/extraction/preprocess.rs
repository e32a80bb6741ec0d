//! Image preparation for vision model input.
//!
//! Label photos come straight off phones and scanners: large, sometimes
//! rotated through EXIF only. Before upload each image is
//! 1. size-checked and decoded
//! 2. rotated upright from its EXIF orientation tag
//! 3. downscaled so the longest side fits `max_dimension` (aspect ratio kept, never upscaled)
//! 4. re-encoded as PNG
//!
//! Pure data preparation: no model calls, no rate permits.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use tracing::debug;

use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: usize = 67;

/// Default bound on the longest side sent to the model.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

// ═══════════════════════════════════════════════════════════
// ImagePreparer trait
// ═══════════════════════════════════════════════════════════

/// Loads and prepares one label image for upload.
pub trait ImagePreparer: Send + Sync {
    fn prepare(&self, path: &Path) -> Result<PreparedImage, ExtractionError>;
}

/// Result of image preparation.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Prepared image as PNG bytes.
    pub png_bytes: Vec<u8>,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
}

// ═══════════════════════════════════════════════════════════
// LabelImagePreparer
// ═══════════════════════════════════════════════════════════

/// Production preparer: read file → decode → EXIF orientation → fit → PNG.
#[derive(Debug, Clone)]
pub struct LabelImagePreparer {
    max_dimension: u32,
}

impl LabelImagePreparer {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Prepare already-loaded bytes (the file read is split off for testing).
    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<PreparedImage, ExtractionError> {
        validate_image_bytes(bytes)?;

        let img = image::load_from_memory(bytes).map_err(|e| {
            ExtractionError::ImageProcessing(format!("Failed to decode image: {e}"))
        })?;
        let (orig_w, orig_h) = img.dimensions();

        let img = apply_orientation(img, read_exif_orientation(bytes));
        let (w, h) = img.dimensions();
        let (fit_w, fit_h) = compute_fit_dimensions(w, h, self.max_dimension);

        let rgb = if (fit_w, fit_h) == (w, h) {
            img.to_rgb8()
        } else {
            img.resize_exact(fit_w, fit_h, FilterType::Triangle).to_rgb8()
        };

        let png_bytes = encode_png(&rgb)?;

        debug!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{fit_w}x{fit_h}"),
            png_size = png_bytes.len(),
            "Label image prepared"
        );

        Ok(PreparedImage {
            png_bytes,
            original_width: orig_w,
            original_height: orig_h,
            width: fit_w,
            height: fit_h,
        })
    }
}

impl Default for LabelImagePreparer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl ImagePreparer for LabelImagePreparer {
    fn prepare(&self, path: &Path) -> Result<PreparedImage, ExtractionError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.prepare_bytes(&bytes)
    }
}

// ═══════════════════════════════════════════════════════════
// Pure helper functions
// ═══════════════════════════════════════════════════════════

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Dimensions fitting inside a `max_dim` square with the aspect ratio kept.
/// Small images are NOT upscaled.
pub fn compute_fit_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }

    let scale = (max_dim as f32 / width as f32).min(max_dim as f32 / height as f32);
    let scale = scale.min(1.0);

    let new_w = ((width as f32 * scale).round() as u32).clamp(1, max_dim.max(1));
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, max_dim.max(1));

    (new_w, new_h)
}

/// Encode an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Mock implementation (testing)
// ═══════════════════════════════════════════════════════════

/// Mock preparer: skips decoding and returns the file name as the image bytes,
/// so mock vision clients can tell inputs apart.
pub struct MockImagePreparer {
    fail: bool,
}

impl MockImagePreparer {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockImagePreparer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePreparer for MockImagePreparer {
    fn prepare(&self, path: &Path) -> Result<PreparedImage, ExtractionError> {
        if self.fail {
            return Err(ExtractionError::ImageProcessing(
                "Mock preparation failure".into(),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(PreparedImage {
            png_bytes: name.into_bytes(),
            original_width: 1,
            original_height: 1,
            width: 1,
            height: 1,
        })
    }
}

/// Solid-color PNG, for tests that need a decodable image.
#[cfg(test)]
pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Result<Vec<u8>, ExtractionError> {
    encode_png(&RgbImage::from_pixel(width, height, image::Rgb(color)))
}
