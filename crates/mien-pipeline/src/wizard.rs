//! Analysis wizard state machine (sans-IO).
//!
//! Steps run `Gender → Ethnicity → Consent → Calibration → Processing →
//! Complete`. Forward moves happen only on explicit confirmation
//! ([`Wizard::on_continue`] and, from calibration,
//! [`Wizard::on_complete`]); [`Wizard::on_back`] moves exactly one step
//! back. Errors are recorded on the current step and never move it.
//!
//! The wizard performs no I/O. Transitions that need async work return
//! an [`Effect`] carrying an [`Attempt`]; the caller runs it (see
//! [`Session`](crate::session::Session)) and reports back through the
//! `apply_*` / `stage_*` methods. Every report is checked against the
//! live attempt for its slot, so results from an attempt that was
//! retried or navigated away from are dropped instead of applied.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::calibration::{self, CalibrationEdits, MergeInvariantError};
use crate::preview::PreviewError;
use crate::processing::{ProcessingProgress, ProcessingStage, StageProgress};
use crate::types::{
    AnalysisSnapshot, Gender, ImageState, LandmarkPreviewData, ManualCalibrationResult, Profile, View,
};

/// Wizard step.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Step {
    /// Choose gender.
    #[default]
    Gender,
    /// Choose ethnicity.
    Ethnicity,
    /// Upload photos and accept the analysis terms.
    Consent,
    /// Review and correct detected landmarks.
    Calibration,
    /// Measure and score.
    Processing,
    /// Results are ready.
    Complete,
}

impl Step {
    /// All steps in order.
    pub const ALL: [Self; 6] = [
        Self::Gender,
        Self::Ethnicity,
        Self::Consent,
        Self::Calibration,
        Self::Processing,
        Self::Complete,
    ];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Gender => "Gender",
            Self::Ethnicity => "Ethnicity",
            Self::Consent => "Photos & consent",
            Self::Calibration => "Calibration",
            Self::Processing => "Processing",
            Self::Complete => "Results",
        }
    }

    /// Position in [`Step::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Share of the wizard completed on entering this step, 0–100.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn progress_percent(self) -> u8 {
        (self.index() * 100 / (Self::ALL.len() - 1)) as u8
    }
}

/// Handle for one run of async work.
///
/// The generation identifies the run; the token cancels it.
#[derive(Debug, Clone)]
pub struct Attempt {
    generation: u64,
    token: CancellationToken,
}

impl Attempt {
    /// Monotonic run number within its slot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancellation token observed at every suspension point of the run.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Tracks the single live attempt for one slot of async work.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    generation: u64,
    live: Option<CancellationToken>,
}

impl AttemptTracker {
    /// Supersede any live attempt and start a new one.
    pub fn begin(&mut self) -> Attempt {
        self.invalidate();
        let token = CancellationToken::new();
        self.live = Some(token.clone());
        Attempt {
            generation: self.generation,
            token,
        }
    }

    /// Cancel the live attempt; any late result it produces is stale.
    pub fn invalidate(&mut self) {
        if let Some(token) = self.live.take() {
            token.cancel();
        }
        self.generation += 1;
    }

    /// Whether `attempt` is the live one.
    #[must_use]
    pub fn is_current(&self, attempt: &Attempt) -> bool {
        self.live.is_some() && attempt.generation == self.generation
    }

    /// Mark `attempt` finished. Returns `false` if it was stale.
    pub fn settle(&mut self, attempt: &Attempt) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.live = None;
        true
    }

    /// Whether an attempt is in flight.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.live.is_some()
    }
}

/// Upload state of one photo.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PhotoState {
    /// Nothing uploaded.
    #[default]
    Empty,
    /// Being downscaled and re-encoded.
    Preparing,
    /// Ready for detection.
    Ready(ImageState),
    /// Preparation failed; upload again.
    Failed(String),
}

/// Landmark preview state on the calibration step.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreviewState {
    /// No attempt running or finished.
    #[default]
    Idle,
    /// Detection in flight.
    Loading,
    /// Landmarks available for calibration.
    Ready(LandmarkPreviewData),
    /// Detection failed; offer a retry.
    Failed {
        /// User-facing failure messages.
        issues: Vec<String>,
    },
}

/// Async work requested by a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Detect landmarks on both photos.
    PreparePreview {
        /// Attempt to report back with.
        attempt: Attempt,
        /// Prepared front photo.
        front: ImageState,
        /// Prepared side photo.
        side: ImageState,
    },
    /// Run the processing stages.
    RunProcessing {
        /// Attempt to report back with.
        attempt: Attempt,
        /// Calibration to measure.
        calibration: ManualCalibrationResult,
        /// Preview the calibration was made against.
        preview: LandmarkPreviewData,
    },
}

/// A transition or edit was refused. The wizard stays on its step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// Gender not chosen.
    #[error("please select a gender")]
    MissingGender,

    /// Ethnicity not chosen.
    #[error("please select an ethnicity")]
    MissingEthnicity,

    /// Terms not accepted.
    #[error("please accept the analysis terms to continue")]
    ConsentRequired,

    /// A photo is missing or still being prepared.
    #[error("{} is not ready", .0.label())]
    MissingPhoto(View),

    /// Calibration attempted before landmarks are available.
    #[error("landmarks are not ready yet")]
    PreviewNotReady,

    /// Work is already in flight on this step.
    #[error("please wait for the current operation to finish")]
    Busy,

    /// Back is disabled while processing runs.
    #[error("cannot go back while processing is running")]
    BackDisabled,

    /// The action does not apply to the current step.
    #[error("{action} is not available on the {} step", .step.label())]
    NotAvailable {
        /// Current step.
        step: Step,
        /// Refused action.
        action: &'static str,
    },

    /// The calibration merge violated an invariant.
    #[error(transparent)]
    Merge(#[from] MergeInvariantError),
}

/// Answers and calibration worth keeping between sessions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WizardDraft {
    /// Chosen gender.
    pub gender: Option<Gender>,
    /// Chosen ethnicity.
    pub ethnicity: Option<String>,
    /// Last completed calibration, resumed on the next calibration step.
    pub calibration: Option<ManualCalibrationResult>,
}

/// Everything a renderer needs for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardView {
    /// Current step.
    pub step: Step,
    /// Human-readable status while work is in flight.
    pub status: Option<String>,
    /// Whether async work is in flight on this step.
    pub loading: bool,
    /// Inline error for the current step.
    pub error: Option<String>,
    /// Failure or quality messages for the current step.
    pub issues: Vec<String>,
    /// Overall wizard progress, 0–100.
    pub progress_percent: u8,
    /// Whether the back action is enabled.
    pub can_go_back: bool,
    /// Whether a retry action should be offered.
    pub can_retry: bool,
    /// Processing stage list (all pending outside processing).
    pub stages: Vec<StageProgress>,
}

/// The wizard state machine.
#[derive(Debug, Default)]
pub struct Wizard {
    step: Step,
    gender: Option<Gender>,
    ethnicity: Option<String>,
    consent: bool,
    front_photo: PhotoState,
    side_photo: PhotoState,
    preview: PreviewState,
    calibration: Option<ManualCalibrationResult>,
    processing: ProcessingProgress,
    snapshot: Option<AnalysisSnapshot>,
    error: Option<String>,
    front_upload: AttemptTracker,
    side_upload: AttemptTracker,
    preview_attempt: AttemptTracker,
    processing_attempt: AttemptTracker,
}

impl Wizard {
    /// A fresh wizard on the first step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh wizard pre-filled from a saved draft.
    #[must_use]
    pub fn restore(draft: WizardDraft) -> Self {
        Self {
            gender: draft.gender,
            ethnicity: draft.ethnicity,
            calibration: draft.calibration,
            ..Self::default()
        }
    }

    /// The state worth persisting.
    #[must_use]
    pub fn draft(&self) -> WizardDraft {
        WizardDraft {
            gender: self.gender,
            ethnicity: self.ethnicity.clone(),
            calibration: self.calibration.clone(),
        }
    }

    /// Current step.
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Inline error on the current step.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Selected gender.
    #[must_use]
    pub const fn gender(&self) -> Option<Gender> {
        self.gender
    }

    /// Selected ethnicity.
    #[must_use]
    pub fn ethnicity(&self) -> Option<&str> {
        self.ethnicity.as_deref()
    }

    /// Whether the analysis terms are accepted.
    #[must_use]
    pub const fn consent(&self) -> bool {
        self.consent
    }

    /// Upload state of one photo.
    #[must_use]
    pub const fn photo(&self, view: View) -> &PhotoState {
        match view {
            View::Front => &self.front_photo,
            View::Side => &self.side_photo,
        }
    }

    /// Landmark preview state.
    #[must_use]
    pub const fn preview(&self) -> &PreviewState {
        &self.preview
    }

    /// Latest calibration, resumed or completed.
    #[must_use]
    pub const fn calibration(&self) -> Option<&ManualCalibrationResult> {
        self.calibration.as_ref()
    }

    /// Processing stage list.
    #[must_use]
    pub const fn processing(&self) -> &ProcessingProgress {
        &self.processing
    }

    /// Snapshot produced by the last completed run.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&AnalysisSnapshot> {
        self.snapshot.as_ref()
    }

    /// Profile from the demographic answers, once both are given.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        Some(Profile {
            gender: self.gender?,
            ethnicity: self.ethnicity.clone()?,
        })
    }

    /// Record the gender answer.
    ///
    /// # Errors
    ///
    /// Refused once calibration has started.
    pub fn select_gender(&mut self, gender: Gender) -> Result<(), StepError> {
        self.ensure_before_calibration("changing gender")?;
        self.gender = Some(gender);
        self.error = None;
        Ok(())
    }

    /// Record the ethnicity answer.
    ///
    /// # Errors
    ///
    /// Refused once calibration has started.
    pub fn select_ethnicity(&mut self, ethnicity: impl Into<String>) -> Result<(), StepError> {
        self.ensure_before_calibration("changing ethnicity")?;
        let ethnicity = ethnicity.into();
        self.ethnicity = (!ethnicity.is_empty()).then_some(ethnicity);
        self.error = None;
        Ok(())
    }

    /// Record whether the analysis terms are accepted.
    ///
    /// # Errors
    ///
    /// Refused once calibration has started.
    pub fn set_consent(&mut self, accepted: bool) -> Result<(), StepError> {
        self.ensure_before_calibration("changing consent")?;
        self.consent = accepted;
        self.error = None;
        Ok(())
    }

    /// Start preparing a new photo for `view`, superseding any earlier upload.
    ///
    /// Replacing a ready photo discards the calibration made against it.
    ///
    /// # Errors
    ///
    /// Refused once calibration has started.
    pub fn begin_upload(&mut self, view: View) -> Result<Attempt, StepError> {
        self.ensure_before_calibration("uploading a photo")?;
        if matches!(self.photo(view), PhotoState::Ready(_)) && self.calibration.take().is_some() {
            tracing::debug!(%view, "photo replaced, dropping previous calibration");
        }
        let attempt = match view {
            View::Front => self.front_upload.begin(),
            View::Side => self.side_upload.begin(),
        };
        *self.photo_mut(view) = PhotoState::Preparing;
        Ok(attempt)
    }

    /// Apply the outcome of an upload. Returns `false` if it was stale.
    pub fn apply_upload(
        &mut self,
        view: View,
        attempt: &Attempt,
        outcome: Result<ImageState, String>,
    ) -> bool {
        let tracker = match view {
            View::Front => &mut self.front_upload,
            View::Side => &mut self.side_upload,
        };
        if !tracker.settle(attempt) {
            tracing::debug!(%view, generation = attempt.generation, "discarding stale upload");
            return false;
        }
        *self.photo_mut(view) = match outcome {
            Ok(image) => PhotoState::Ready(image),
            Err(message) => {
                tracing::warn!(%view, %message, "photo preparation failed");
                PhotoState::Failed(message)
            }
        };
        true
    }

    /// Confirm the current step and move forward.
    ///
    /// Entering calibration returns [`Effect::PreparePreview`].
    ///
    /// # Errors
    ///
    /// Returns the reason the step cannot be left; it is also recorded
    /// as the step's inline error.
    pub fn on_continue(&mut self) -> Result<Option<Effect>, StepError> {
        match self.step {
            Step::Gender => {
                if self.gender.is_none() {
                    return Err(self.fail(StepError::MissingGender));
                }
                self.go(Step::Ethnicity);
                Ok(None)
            }
            Step::Ethnicity => {
                if self.ethnicity.is_none() {
                    return Err(self.fail(StepError::MissingEthnicity));
                }
                self.go(Step::Consent);
                Ok(None)
            }
            Step::Consent => {
                if !self.consent {
                    return Err(self.fail(StepError::ConsentRequired));
                }
                let effect = self.start_preview()?;
                self.go(Step::Calibration);
                Ok(Some(effect))
            }
            step @ (Step::Calibration | Step::Processing | Step::Complete) => {
                Err(self.fail(StepError::NotAvailable {
                    step,
                    action: "continue",
                }))
            }
        }
    }

    /// Move one step back, abandoning in-flight work of the current step.
    ///
    /// # Errors
    ///
    /// Refused on the first and last steps and while processing runs.
    pub fn on_back(&mut self) -> Result<(), StepError> {
        match self.step {
            Step::Ethnicity => self.go(Step::Gender),
            Step::Consent => {
                self.front_upload.invalidate();
                self.side_upload.invalidate();
                for view in View::ALL {
                    let photo = self.photo_mut(view);
                    if *photo == PhotoState::Preparing {
                        *photo = PhotoState::Empty;
                    }
                }
                self.go(Step::Ethnicity);
            }
            Step::Calibration => {
                self.preview_attempt.invalidate();
                self.preview = PreviewState::Idle;
                self.go(Step::Consent);
            }
            Step::Processing => {
                if self.processing_attempt.is_active() {
                    return Err(self.fail(StepError::BackDisabled));
                }
                self.processing = ProcessingProgress::new();
                self.go(Step::Calibration);
            }
            step @ (Step::Gender | Step::Complete) => {
                return Err(self.fail(StepError::NotAvailable {
                    step,
                    action: "going back",
                }));
            }
        }
        Ok(())
    }

    /// Restart landmark detection from scratch.
    ///
    /// # Errors
    ///
    /// Refused outside calibration or while detection is already running.
    pub fn retry_preview(&mut self) -> Result<Effect, StepError> {
        if self.step != Step::Calibration {
            return Err(self.fail(StepError::NotAvailable {
                step: self.step,
                action: "retrying detection",
            }));
        }
        if self.preview_attempt.is_active() {
            return Err(self.fail(StepError::Busy));
        }
        self.start_preview()
    }

    /// Apply a finished preview attempt. Returns `false` if it was stale.
    ///
    /// An aborted attempt resets the preview to idle without an error.
    pub fn apply_preview(
        &mut self,
        attempt: &Attempt,
        outcome: Result<LandmarkPreviewData, PreviewError>,
    ) -> bool {
        if self.step != Step::Calibration || !self.preview_attempt.settle(attempt) {
            tracing::debug!(generation = attempt.generation, "discarding stale landmark preview");
            return false;
        }
        match outcome {
            Ok(preview) => {
                self.preview = PreviewState::Ready(preview);
                self.error = None;
            }
            Err(PreviewError::Aborted) => self.preview = PreviewState::Idle,
            Err(PreviewError::Failed { issues }) => {
                self.error = Some("Landmark detection failed. Please retry.".to_owned());
                self.preview = PreviewState::Failed { issues };
            }
        }
        true
    }

    /// Finish calibration with the user's edits and start processing.
    ///
    /// # Errors
    ///
    /// Refused outside calibration or before landmarks are ready. A
    /// [`StepError::Merge`] means the merge hit a logic fault; it is
    /// logged and the step is not left.
    pub fn on_complete(&mut self, edits: &CalibrationEdits) -> Result<Effect, StepError> {
        if self.step != Step::Calibration {
            return Err(self.fail(StepError::NotAvailable {
                step: self.step,
                action: "completing calibration",
            }));
        }
        let PreviewState::Ready(preview) = self.preview.clone() else {
            return Err(self.fail(StepError::PreviewNotReady));
        };
        let Some(profile) = self.profile() else {
            return Err(self.fail(StepError::MissingGender));
        };

        let merged = match calibration::merge(self.calibration.as_ref(), &preview, edits, &profile) {
            Ok(merged) => merged,
            Err(e) => {
                tracing::error!(error = %e, "calibration merge violated an invariant");
                return Err(self.fail(e.into()));
            }
        };
        self.calibration = Some(merged.clone());
        self.go(Step::Processing);
        Ok(self.start_processing(merged, preview))
    }

    /// Mark a processing stage running. Returns `false` if the attempt is stale.
    pub fn stage_started(&mut self, attempt: &Attempt, stage: ProcessingStage) -> bool {
        if !self.processing_live(attempt) {
            return false;
        }
        self.processing.start(stage)
    }

    /// Record a processing stage outcome. Returns `false` if the attempt is stale.
    ///
    /// A failed stage halts the run: the attempt is settled so back and
    /// retry become available, and nothing is retried automatically.
    pub fn stage_finished(
        &mut self,
        attempt: &Attempt,
        stage: ProcessingStage,
        outcome: Result<(), String>,
    ) -> bool {
        if !self.processing_live(attempt) {
            return false;
        }
        let failed = outcome.as_ref().err().cloned();
        if !self.processing.finish(stage, outcome) {
            return false;
        }
        if let Some(message) = failed {
            tracing::warn!(%stage, %message, "processing stage failed");
            self.error = Some(message);
            self.processing_attempt.settle(attempt);
        }
        true
    }

    /// Finish a processing run whose stages are all done.
    ///
    /// Returns `false` if the attempt is stale or stages are outstanding.
    pub fn complete_processing(&mut self, attempt: &Attempt, snapshot: AnalysisSnapshot) -> bool {
        if !self.processing_live(attempt) || !self.processing.is_complete() {
            return false;
        }
        self.processing_attempt.settle(attempt);
        self.snapshot = Some(snapshot);
        self.go(Step::Complete);
        true
    }

    /// Cancel a running processing attempt, re-enabling back.
    pub fn abort_processing(&mut self) {
        if self.step == Step::Processing && self.processing_attempt.is_active() {
            self.processing_attempt.invalidate();
            self.processing = ProcessingProgress::new();
            self.error = None;
            tracing::debug!("processing aborted");
        }
    }

    /// Run processing again after a failure or abort.
    ///
    /// # Errors
    ///
    /// Refused outside processing or while a run is in flight.
    pub fn retry_processing(&mut self) -> Result<Effect, StepError> {
        if self.step != Step::Processing {
            return Err(self.fail(StepError::NotAvailable {
                step: self.step,
                action: "retrying processing",
            }));
        }
        if self.processing_attempt.is_active() {
            return Err(self.fail(StepError::Busy));
        }
        let ready = match (&self.calibration, &self.preview) {
            (Some(calibration), PreviewState::Ready(preview)) => {
                Some((calibration.clone(), preview.clone()))
            }
            _ => None,
        };
        let Some((calibration, preview)) = ready else {
            return Err(self.fail(StepError::PreviewNotReady));
        };
        Ok(self.start_processing(calibration, preview))
    }

    /// Abandon everything and return to the first step.
    ///
    /// Answers are kept; photos, landmarks, and results are dropped.
    pub fn reset(&mut self) {
        for tracker in [
            &mut self.front_upload,
            &mut self.side_upload,
            &mut self.preview_attempt,
            &mut self.processing_attempt,
        ] {
            tracker.invalidate();
        }
        self.consent = false;
        self.front_photo = PhotoState::Empty;
        self.side_photo = PhotoState::Empty;
        self.preview = PreviewState::Idle;
        self.processing = ProcessingProgress::new();
        self.snapshot = None;
        self.error = None;
        self.go(Step::Gender);
    }

    /// Render model for the current state.
    #[must_use]
    pub fn view(&self) -> WizardView {
        let preparing_photo = View::ALL
            .into_iter()
            .any(|v| matches!(self.photo(v), PhotoState::Preparing));
        let processing_running = self.step == Step::Processing && self.processing_attempt.is_active();

        let status = match self.step {
            Step::Consent if preparing_photo => Some("Preparing photos…".to_owned()),
            Step::Calibration if self.preview == PreviewState::Loading => {
                Some("Detecting facial landmarks…".to_owned())
            }
            Step::Processing => self
                .processing
                .running()
                .map(|stage| format!("{}…", stage.label())),
            _ => None,
        };

        let issues = match (self.step, &self.preview) {
            (Step::Consent, _) => View::ALL
                .into_iter()
                .filter_map(|v| match self.photo(v) {
                    PhotoState::Failed(message) => Some(format!("{}: {message}", v.label())),
                    _ => None,
                })
                .collect(),
            (Step::Calibration, PreviewState::Failed { issues }) => issues.clone(),
            (Step::Calibration, PreviewState::Ready(preview)) => preview.warnings.clone(),
            (Step::Processing, _) => self.processing.error().map(str::to_owned).into_iter().collect(),
            _ => Vec::new(),
        };

        let progress_percent = if self.step == Step::Processing {
            let span = Step::Complete.progress_percent() - Step::Processing.progress_percent();
            let within = u16::from(self.processing.percent()) * u16::from(span) / 100;
            Step::Processing.progress_percent() + u8::try_from(within).unwrap_or(span)
        } else {
            self.step.progress_percent()
        };

        WizardView {
            step: self.step,
            status,
            loading: preparing_photo
                || self.preview == PreviewState::Loading
                || processing_running,
            error: self.error.clone(),
            issues,
            progress_percent,
            can_go_back: match self.step {
                Step::Gender | Step::Complete => false,
                Step::Ethnicity | Step::Consent | Step::Calibration => true,
                Step::Processing => !processing_running,
            },
            can_retry: match self.step {
                Step::Calibration => matches!(self.preview, PreviewState::Failed { .. }),
                Step::Processing => !processing_running && !self.processing.is_complete(),
                _ => false,
            },
            stages: self.processing.stages().to_vec(),
        }
    }

    fn start_preview(&mut self) -> Result<Effect, StepError> {
        let (front, side) = match (&self.front_photo, &self.side_photo) {
            (PhotoState::Ready(front), PhotoState::Ready(side)) => (front.clone(), side.clone()),
            (PhotoState::Ready(_), _) => return Err(self.fail(StepError::MissingPhoto(View::Side))),
            _ => return Err(self.fail(StepError::MissingPhoto(View::Front))),
        };
        let attempt = self.preview_attempt.begin();
        self.preview = PreviewState::Loading;
        self.error = None;
        Ok(Effect::PreparePreview {
            attempt,
            front,
            side,
        })
    }

    fn start_processing(
        &mut self,
        calibration: ManualCalibrationResult,
        preview: LandmarkPreviewData,
    ) -> Effect {
        let attempt = self.processing_attempt.begin();
        self.processing = ProcessingProgress::new();
        self.snapshot = None;
        self.error = None;
        Effect::RunProcessing {
            attempt,
            calibration,
            preview,
        }
    }

    fn processing_live(&self, attempt: &Attempt) -> bool {
        let live = self.step == Step::Processing && self.processing_attempt.is_current(attempt);
        if !live {
            tracing::debug!(generation = attempt.generation, "discarding stale processing update");
        }
        live
    }

    fn ensure_before_calibration(&mut self, action: &'static str) -> Result<(), StepError> {
        if self.step >= Step::Calibration {
            return Err(self.fail(StepError::NotAvailable {
                step: self.step,
                action,
            }));
        }
        Ok(())
    }

    const fn photo_mut(&mut self, view: View) -> &mut PhotoState {
        match view {
            View::Front => &mut self.front_photo,
            View::Side => &mut self.side_photo,
        }
    }

    fn go(&mut self, step: Step) {
        if self.step != step {
            tracing::debug!(from = ?self.step, to = ?step, "wizard step changed");
        }
        self.step = step;
        self.error = None;
    }

    fn fail(&mut self, error: StepError) -> StepError {
        tracing::warn!(step = ?self.step, %error, "step action refused");
        self.error = Some(error.to_string());
        error
    }
}
