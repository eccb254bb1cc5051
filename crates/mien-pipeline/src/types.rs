//! Shared data model for the analysis wizard and snapshot analytics.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which photo a landmark set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Frontal portrait.
    Front,
    /// Side profile.
    Side,
}

impl View {
    /// Both views, in the order they are detected and displayed.
    pub const ALL: [Self; 2] = [Self::Front, Self::Side];

    /// Lowercase identifier used by the detection collaborator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Side => "side",
        }
    }

    /// Human-readable photo name for status lines and issue messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Front => "Front photo",
            Self::Side => "Side photo",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a landmark within one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkId(pub u32);

impl fmt::Display for LandmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single landmark position in image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Identifier, unique within its view.
    pub id: LandmarkId,
    /// Optional anatomical name (e.g. `"pogonion"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl LandmarkPoint {
    /// Create an unnamed point.
    #[must_use]
    pub const fn new(id: u32, x: f64, y: f64) -> Self {
        Self {
            id: LandmarkId(id),
            name: None,
            x,
            y,
        }
    }

    /// Attach an anatomical name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A prepared photo: re-encoded data URL plus its decoded dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    /// `data:image/jpeg;base64,...` URL of the re-encoded photo.
    pub data_url: String,
    /// Width in pixels after downscaling.
    pub width: u32,
    /// Height in pixels after downscaling.
    pub height: u32,
}

/// Per-view confidence signal reported by the detection collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFlags {
    /// Detector confidence in `0.0..=1.0`.
    pub confidence: f64,
    /// Free-form notes from the detector ("face partially occluded", ...).
    #[serde(default)]
    pub notes: Vec<String>,
}

impl QualityFlags {
    /// Coarse grade against the configured minimum confidence.
    ///
    /// Non-finite confidence grades as [`QualityGrade::Poor`].
    #[must_use]
    pub fn grade(&self, min_confidence: f64) -> QualityGrade {
        if !self.confidence.is_finite() || self.confidence < min_confidence {
            QualityGrade::Poor
        } else if self.confidence < (min_confidence + 1.0) / 2.0 {
            QualityGrade::Fair
        } else {
            QualityGrade::Good
        }
    }
}

/// Coarse usability of a detected landmark set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGrade {
    /// Confident detection.
    Good,
    /// Usable, but worth a careful calibration pass.
    Fair,
    /// Likely misplaced landmarks.
    Poor,
}

/// Auto-detected landmarks for both photos.
///
/// Computed once per preparation attempt and replaced wholesale on retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkPreviewData {
    /// Landmarks detected on the front photo.
    pub front_landmarks: Vec<LandmarkPoint>,
    /// Landmarks detected on the side photo.
    pub side_landmarks: Vec<LandmarkPoint>,
    /// Quality reported for the front photo.
    pub front_quality: QualityFlags,
    /// Quality reported for the side photo.
    pub side_quality: QualityFlags,
    /// Non-fatal quality warnings for display.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl LandmarkPreviewData {
    /// Detected landmarks for one view.
    #[must_use]
    pub fn landmarks(&self, view: View) -> &[LandmarkPoint] {
        match view {
            View::Front => &self.front_landmarks,
            View::Side => &self.side_landmarks,
        }
    }

    /// Quality flags for one view.
    #[must_use]
    pub const fn quality(&self, view: View) -> &QualityFlags {
        match view {
            View::Front => &self.front_quality,
            View::Side => &self.side_quality,
        }
    }
}

/// Self-reported gender used to select scoring norms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male norms.
    Male,
    /// Female norms.
    Female,
}

impl Gender {
    /// Lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demographic answers collected by the first wizard steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Selected gender.
    pub gender: Gender,
    /// Selected ethnicity key (e.g. `"east_asian"`).
    pub ethnicity: String,
}

impl Profile {
    /// Cohort key grouping comparable analyses.
    #[must_use]
    pub fn cohort_key(&self) -> String {
        format!("{}:{}", self.ethnicity, self.gender)
    }
}

/// Landmarks after the user's manual calibration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualCalibrationResult {
    /// Calibrated points per view, in detection order with added points last.
    pub manual_points: BTreeMap<View, Vec<LandmarkPoint>>,
    /// Profile the calibration was made for.
    pub profile: Profile,
}

impl ManualCalibrationResult {
    /// Calibrated points for one view (empty when the view is missing).
    #[must_use]
    pub fn points(&self, view: View) -> &[LandmarkPoint] {
        self.manual_points.get(&view).map_or(&[], Vec::as_slice)
    }
}

/// One named measurement inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Stable metric key (e.g. `"gonial_angle"`).
    pub key: String,
    /// Measured value.
    pub value: f64,
    /// Display unit, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// The four sub-scores composing the overall score, each on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PillarScores {
    /// Proportional harmony.
    #[serde(default)]
    pub harmony: f64,
    /// Angularity of the jaw and cheek structure.
    #[serde(default)]
    pub angularity: f64,
    /// Sexual dimorphism.
    #[serde(default)]
    pub dimorphism: f64,
    /// Individual feature quality.
    #[serde(default)]
    pub features: f64,
}

/// Immutable record of one completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    /// Snapshot identifier.
    pub id: String,
    /// UTC ISO-8601 creation timestamp.
    pub created_at_iso: String,
    /// Overall score on a 0–100 scale.
    #[serde(default)]
    pub overall: f64,
    /// Pillar sub-scores.
    #[serde(default)]
    pub pillar_scores: PillarScores,
    /// Demographic cohort, when known.
    #[serde(default)]
    pub cohort_key: Option<String>,
    /// Individual measurements.
    #[serde(default)]
    pub metrics: Vec<Metric>,
}
