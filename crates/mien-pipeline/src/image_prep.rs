//! Upload preparation: downscale, re-encode as JPEG, and read back.
//!
//! Photos straight from a phone camera are far larger than landmark
//! detection needs. Each upload is shrunk so its longest side fits
//! `max_dimension`, re-encoded at a fixed JPEG quality, and decoded
//! once more so the recorded dimensions are those of the data actually
//! handed to the detector.
//!
//! No deadline is applied here; the session wraps this in
//! [`with_abort_and_timeout`](crate::task::with_abort_and_timeout).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageEncoder, ImageFormat};

use crate::types::ImageState;

/// Errors from [`prepare_image`].
#[derive(Debug, thiserror::Error)]
pub enum ImagePrepError {
    /// The upload contained no bytes.
    #[error("image data is empty")]
    EmptyInput,

    /// The upload (or its re-encoded form) could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// JPEG re-encoding failed.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Prepare an uploaded photo for landmark detection.
///
/// # Errors
///
/// Returns [`ImagePrepError::EmptyInput`] for an empty upload,
/// [`ImagePrepError::Decode`] for corrupt or unsupported data, and
/// [`ImagePrepError::Encode`] if JPEG encoding fails.
pub fn prepare_image(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<ImageState, ImagePrepError> {
    if bytes.is_empty() {
        return Err(ImagePrepError::EmptyInput);
    }

    let decoded = image::load_from_memory(bytes).map_err(ImagePrepError::Decode)?;
    let (source_width, source_height) = (decoded.width(), decoded.height());

    let scaled = if source_width.max(source_height) > max_dimension {
        decoded.resize(max_dimension, max_dimension, FilterType::Triangle)
    } else {
        decoded
    };

    // JPEG has no alpha channel.
    let rgb = scaled.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(ImagePrepError::Encode)?;

    let reread =
        image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).map_err(ImagePrepError::Decode)?;

    tracing::debug!(
        source_width,
        source_height,
        width = reread.width(),
        height = reread.height(),
        encoded_bytes = jpeg.len(),
        "prepared upload"
    );

    Ok(ImageState {
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
        width: reread.width(),
        height: reread.height(),
    })
}
