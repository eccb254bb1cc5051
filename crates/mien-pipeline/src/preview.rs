//! Landmark preview preparation for the calibration step.
//!
//! Detection itself belongs to an external collaborator behind
//! [`LandmarkDetector`]. This module runs the front and side detections
//! side by side under a shared cancellation token and per-view deadline,
//! validates what comes back, grades its quality, and folds every
//! failure into one issue list.
//!
//! A preview is all-or-nothing: if either view fails, no
//! [`LandmarkPreviewData`] is produced and the wizard offers a retry
//! that restarts both views. Landmarks are never fabricated to paper
//! over a failed view.

use std::collections::HashSet;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::issues::merge_issues;
use crate::task::{TaskError, Timer, with_abort_and_timeout};
use crate::types::{ImageState, LandmarkPoint, LandmarkPreviewData, QualityFlags, QualityGrade, View};

/// Raw output of one detector call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detected landmarks in detector order.
    pub landmarks: Vec<LandmarkPoint>,
    /// Detector-reported quality.
    pub quality: QualityFlags,
}

/// The detection collaborator failed for one view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct DetectionError(pub String);

/// External landmark detection model.
pub trait LandmarkDetector {
    /// Detect landmarks on one prepared photo.
    fn detect(
        &self,
        view: View,
        image: &ImageState,
    ) -> impl Future<Output = Result<Detection, DetectionError>>;
}

/// Why a preview could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreviewError {
    /// The attempt was cancelled (user navigated away or retried).
    #[error("landmark preview aborted")]
    Aborted,

    /// At least one view failed; the step stays put and offers a retry.
    #[error("landmark preview failed: {}", .issues.join("; "))]
    Failed {
        /// De-duplicated, user-facing failure messages.
        issues: Vec<String>,
    },
}

impl PreviewError {
    /// Whether this is a silent user cancellation.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// User-facing messages (empty for an abort).
    #[must_use]
    pub fn issues(&self) -> &[String] {
        match self {
            Self::Aborted => &[],
            Self::Failed { issues } => issues,
        }
    }
}

enum ViewFailure {
    Aborted,
    Issue(String),
}

/// Detect both views and assemble a [`LandmarkPreviewData`].
///
/// # Errors
///
/// Returns [`PreviewError::Aborted`] when `token` is cancelled at any
/// point, and [`PreviewError::Failed`] when either view times out,
/// fails in the detector, or returns unusable landmarks.
#[allow(clippy::future_not_send)]
pub async fn prepare_preview<D, T>(
    detector: &D,
    front: &ImageState,
    side: &ImageState,
    token: &CancellationToken,
    timer: &T,
    config: &PipelineConfig,
) -> Result<LandmarkPreviewData, PreviewError>
where
    D: LandmarkDetector + ?Sized,
    T: Timer + ?Sized,
{
    if token.is_cancelled() {
        return Err(PreviewError::Aborted);
    }

    let (front_result, side_result) = futures::join!(
        detect_view(detector, View::Front, front, token, timer, config),
        detect_view(detector, View::Side, side, token, timer, config),
    );

    if token.is_cancelled() {
        return Err(PreviewError::Aborted);
    }

    match (front_result, side_result) {
        (Ok(front), Ok(side)) => {
            let warnings = merge_issues(
                quality_warnings(View::Front, &front.quality, config)
                    .into_iter()
                    .chain(quality_warnings(View::Side, &side.quality, config)),
            );
            Ok(LandmarkPreviewData {
                front_landmarks: front.landmarks,
                side_landmarks: side.landmarks,
                front_quality: front.quality,
                side_quality: side.quality,
                warnings,
            })
        }
        (Err(ViewFailure::Aborted), _) | (_, Err(ViewFailure::Aborted)) => Err(PreviewError::Aborted),
        (front, side) => {
            let issues = merge_issues(
                [front.err(), side.err()]
                    .into_iter()
                    .flatten()
                    .filter_map(|failure| match failure {
                        ViewFailure::Issue(message) => Some(message),
                        ViewFailure::Aborted => None,
                    }),
            );
            tracing::warn!(?issues, "landmark preview failed");
            Err(PreviewError::Failed { issues })
        }
    }
}

#[allow(clippy::future_not_send)]
async fn detect_view<D, T>(
    detector: &D,
    view: View,
    image: &ImageState,
    token: &CancellationToken,
    timer: &T,
    config: &PipelineConfig,
) -> Result<Detection, ViewFailure>
where
    D: LandmarkDetector + ?Sized,
    T: Timer + ?Sized,
{
    let label = format!("{} landmark detection", view.label());
    let outcome = with_abort_and_timeout(
        detector.detect(view, image),
        token,
        timer,
        config.preview_timeout(),
        &label,
    )
    .await;

    let detection = match outcome {
        Err(TaskError::Aborted) => return Err(ViewFailure::Aborted),
        Err(timeout @ TaskError::Timeout { .. }) => {
            return Err(ViewFailure::Issue(timeout.to_string()));
        }
        Ok(Err(e)) => return Err(ViewFailure::Issue(format!("{}: {e}", view.label()))),
        Ok(Ok(detection)) => detection,
    };

    validate_landmarks(&detection.landmarks)
        .map_err(|problem| ViewFailure::Issue(format!("{}: {problem}", view.label())))?;
    Ok(detection)
}

/// Reject detector output the calibration merge could not work with.
fn validate_landmarks(landmarks: &[LandmarkPoint]) -> Result<(), String> {
    if landmarks.is_empty() {
        return Err("no face landmarks detected".to_owned());
    }
    let mut seen = HashSet::new();
    for point in landmarks {
        if !seen.insert(point.id) {
            return Err(format!("detector returned duplicate landmark {}", point.id));
        }
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(format!("landmark {} has an invalid position", point.id));
        }
    }
    Ok(())
}

fn quality_warnings(view: View, quality: &QualityFlags, config: &PipelineConfig) -> Vec<String> {
    let grade = match quality.grade(config.min_landmark_confidence) {
        QualityGrade::Good => None,
        QualityGrade::Fair => Some(format!(
            "{}: detection confidence is moderate, review the landmarks",
            view.label()
        )),
        QualityGrade::Poor => Some(format!(
            "{}: detection confidence is low, adjust the landmarks carefully",
            view.label()
        )),
    };
    grade
        .into_iter()
        .chain(
            quality
                .notes
                .iter()
                .filter(|note| !note.is_empty())
                .map(|note| format!("{}: {note}", view.label())),
        )
        .collect()
}
