//! Tunables for image preparation, detection deadlines, and quality grading.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by every wizard session.
///
/// Timeouts are advisory: they bound how long the wizard waits before
/// offering a retry, not how long the underlying work runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest allowed side of a prepared photo, in pixels.
    pub max_image_dimension: u32,

    /// JPEG quality (1–100) used when re-encoding uploads.
    pub jpeg_quality: u8,

    /// Deadline for preparing one uploaded photo.
    pub image_timeout_ms: u64,

    /// Deadline for detecting landmarks on one view.
    pub preview_timeout_ms: u64,

    /// Deadline for each processing stage.
    pub stage_timeout_ms: u64,

    /// Detector confidence below which a view is graded poor.
    pub min_landmark_confidence: f64,
}

impl PipelineConfig {
    /// Default for [`max_image_dimension`](Self::max_image_dimension).
    pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 1280;
    /// Default for [`jpeg_quality`](Self::jpeg_quality).
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;
    /// Default for [`image_timeout_ms`](Self::image_timeout_ms).
    pub const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 15_000;
    /// Default for [`preview_timeout_ms`](Self::preview_timeout_ms).
    pub const DEFAULT_PREVIEW_TIMEOUT_MS: u64 = 20_000;
    /// Default for [`stage_timeout_ms`](Self::stage_timeout_ms).
    pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 30_000;
    /// Default for [`min_landmark_confidence`](Self::min_landmark_confidence).
    pub const DEFAULT_MIN_LANDMARK_CONFIDENCE: f64 = 0.5;

    /// Image preparation deadline.
    #[must_use]
    pub const fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    /// Per-view detection deadline.
    #[must_use]
    pub const fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.preview_timeout_ms)
    }

    /// Per-stage processing deadline.
    #[must_use]
    pub const fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }

    /// Check the invariants the rest of the crate relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_image_dimension == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        for (name, value) in [
            ("image_timeout_ms", self.image_timeout_ms),
            ("preview_timeout_ms", self.preview_timeout_ms),
            ("stage_timeout_ms", self.stage_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        if !(0.0..=1.0).contains(&self.min_landmark_confidence) {
            return Err(ConfigError::Confidence(self.min_landmark_confidence));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: Self::DEFAULT_MAX_IMAGE_DIMENSION,
            jpeg_quality: Self::DEFAULT_JPEG_QUALITY,
            image_timeout_ms: Self::DEFAULT_IMAGE_TIMEOUT_MS,
            preview_timeout_ms: Self::DEFAULT_PREVIEW_TIMEOUT_MS,
            stage_timeout_ms: Self::DEFAULT_STAGE_TIMEOUT_MS,
            min_landmark_confidence: Self::DEFAULT_MIN_LANDMARK_CONFIDENCE,
        }
    }
}

/// A [`PipelineConfig`] invariant violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `max_image_dimension` was zero.
    #[error("max_image_dimension must be at least 1")]
    ZeroDimension,

    /// `jpeg_quality` outside 1..=100.
    #[error("jpeg_quality must be within 1..=100, got {0}")]
    JpegQuality(u8),

    /// A timeout was zero.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    /// `min_landmark_confidence` outside 0.0..=1.0 (or NaN).
    #[error("min_landmark_confidence must be within 0.0..=1.0, got {0}")]
    Confidence(f64),
}
