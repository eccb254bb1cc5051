//! mien-pipeline: Analysis pipeline orchestrator (sans-IO).
//!
//! Drives one facial analysis through:
//! gender -> ethnicity -> photos & consent -> landmark calibration ->
//! processing -> results, and aggregates saved results into score
//! trends.
//!
//! This crate has **no browser dependencies**. Landmark detection,
//! measurement and persistence are injected collaborators
//! ([`LandmarkDetector`], [`Analyzer`], [`Store`]) and timers come in
//! through [`Timer`], so everything here runs natively under test. The
//! Dioxus glue lives in `mien-io`.

pub mod analytics;
pub mod calibration;
pub mod config;
pub mod image_prep;
pub mod issues;
pub mod preview;
pub mod processing;
pub mod session;
pub mod store;
pub mod task;
pub mod types;
pub mod wizard;

#[cfg(test)]
mod test_support;

pub use analytics::{AnalyticsModel, BreakdownRow, SeriesPoint, TimeRange, compute_analytics_from_snapshots};
pub use calibration::{CalibrationEdits, MergeInvariantError, PointEdit};
pub use config::{ConfigError, PipelineConfig};
pub use image_prep::{ImagePrepError, prepare_image};
pub use issues::merge_issues;
pub use preview::{Detection, DetectionError, LandmarkDetector, PreviewError};
pub use processing::{AnalysisError, Analyzer, ProcessingStage, Scores, StageProgress, StageStatus};
pub use session::Session;
pub use store::{MemoryStore, SnapshotHistory, Store, Subscription};
pub use task::{TaskError, Timer};
pub use types::{
    AnalysisSnapshot, Gender, ImageState, LandmarkId, LandmarkPoint, LandmarkPreviewData,
    ManualCalibrationResult, Metric, PillarScores, Profile, QualityFlags, QualityGrade, View,
};
pub use wizard::{Effect, Step, StepError, Wizard, WizardDraft, WizardView};
