//! Processing sub-stages and the scoring collaborator.
//!
//! Progress shown to the user tracks real completion: a stage is only
//! marked done once its underlying future has resolved.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::calibration::MergeInvariantError;
use crate::types::{LandmarkPoint, Metric, PillarScores, Profile, View};

/// One named step of the processing run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    /// Re-check the calibration covers every detected landmark.
    ValidateCalibration,
    /// Measure ratios and angles on the front photo.
    MeasureFront,
    /// Measure ratios and angles on the side photo.
    MeasureSide,
    /// Combine measurements into pillar and overall scores.
    Score,
}

impl ProcessingStage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [
        Self::ValidateCalibration,
        Self::MeasureFront,
        Self::MeasureSide,
        Self::Score,
    ];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ValidateCalibration => "Checking landmarks",
            Self::MeasureFront => "Measuring front profile",
            Self::MeasureSide => "Measuring side profile",
            Self::Score => "Scoring",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of one stage: `Pending → Running → (Done | Error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not started.
    Pending,
    /// In flight.
    Running,
    /// Finished successfully.
    Done,
    /// Failed; processing halted here.
    Error,
}

/// Status of one stage, as rendered in the progress list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Which stage.
    pub stage: ProcessingStage,
    /// Where it is in its lifecycle.
    pub status: StageStatus,
}

/// Ordered stage list for one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingProgress {
    stages: Vec<StageProgress>,
    error: Option<String>,
}

impl Default for ProcessingProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingProgress {
    /// Every stage pending.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: ProcessingStage::ALL
                .into_iter()
                .map(|stage| StageProgress {
                    stage,
                    status: StageStatus::Pending,
                })
                .collect(),
            error: None,
        }
    }

    /// Stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageProgress] {
        &self.stages
    }

    /// Status of one stage.
    #[must_use]
    pub fn status(&self, stage: ProcessingStage) -> StageStatus {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map_or(StageStatus::Pending, |s| s.status)
    }

    /// Error message of the failed stage, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move a pending stage to running.
    ///
    /// Returns `false` (and changes nothing) if the stage is not pending
    /// or an earlier stage has failed.
    pub fn start(&mut self, stage: ProcessingStage) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.transition(stage, StageStatus::Pending, StageStatus::Running)
    }

    /// Move a running stage to done or error.
    ///
    /// Returns `false` (and changes nothing) if the stage is not running.
    pub fn finish(&mut self, stage: ProcessingStage, outcome: Result<(), String>) -> bool {
        match outcome {
            Ok(()) => self.transition(stage, StageStatus::Running, StageStatus::Done),
            Err(message) => {
                let moved = self.transition(stage, StageStatus::Running, StageStatus::Error);
                if moved {
                    self.error = Some(message);
                }
                moved
            }
        }
    }

    fn transition(&mut self, stage: ProcessingStage, from: StageStatus, to: StageStatus) -> bool {
        match self.stages.iter_mut().find(|s| s.stage == stage) {
            Some(entry) if entry.status == from => {
                entry.status = to;
                true
            }
            _ => false,
        }
    }

    /// The stage currently in flight.
    #[must_use]
    pub fn running(&self) -> Option<ProcessingStage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Running)
            .map(|s| s.stage)
    }

    /// Whether every stage is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Done)
    }

    /// Completed share of stages, 0–100.
    #[must_use]
    pub fn percent(&self) -> u8 {
        let done = self
            .stages
            .iter()
            .filter(|s| s.status == StageStatus::Done)
            .count();
        u8::try_from(done * 100 / self.stages.len().max(1)).unwrap_or(100)
    }
}

/// Scores produced by [`Analyzer::score`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    /// Overall score, 0–100.
    pub overall: f64,
    /// Pillar sub-scores, 0–100 each.
    pub pillar_scores: PillarScores,
}

/// A processing stage failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The calibration no longer matches the detected landmarks.
    #[error("calibration is inconsistent: {0}")]
    Calibration(#[from] MergeInvariantError),

    /// The external analyzer reported a failure.
    #[error("{0}")]
    Analyzer(String),
}

/// External measurement and scoring model.
pub trait Analyzer {
    /// Measure one calibrated view.
    fn measure(
        &self,
        view: View,
        points: &[LandmarkPoint],
        profile: &Profile,
    ) -> impl Future<Output = Result<Vec<Metric>, AnalysisError>>;

    /// Combine all measurements into scores.
    fn score(
        &self,
        metrics: &[Metric],
        profile: &Profile,
    ) -> impl Future<Output = Result<Scores, AnalysisError>>;
}
