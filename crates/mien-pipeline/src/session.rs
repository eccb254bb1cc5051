//! Async driver binding the [`Wizard`] to its collaborators.
//!
//! The wizard lives behind `Rc<RefCell<_>>`: everything runs on one
//! thread, and a borrow is never held across an `.await`. Each effect
//! re-checks its attempt with the wizard on every resumption, so work
//! finishing after a retry, back navigation, or reset changes nothing.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::analytics::{AnalyticsModel, TimeRange, compute_analytics_from_snapshots};
use crate::calibration::{CalibrationEdits, check_complete};
use crate::config::PipelineConfig;
use crate::image_prep::prepare_image;
use crate::preview::{LandmarkDetector, prepare_preview};
use crate::processing::{AnalysisError, Analyzer, ProcessingStage};
use crate::store::{SnapshotHistory, Store, Subscription};
use crate::task::{TaskError, Timer, with_abort_and_timeout, yield_now};
use crate::types::{AnalysisSnapshot, LandmarkPreviewData, ManualCalibrationResult, View};
use crate::wizard::{Attempt, Effect, StepError, Wizard, WizardDraft, WizardView};

/// Persisted snapshot history, newest first.
pub type HistoryStore = Rc<dyn Store<Vec<AnalysisSnapshot>>>;

/// Persisted wizard draft.
pub type DraftStore = Rc<dyn Store<Option<WizardDraft>>>;

/// One analysis session.
pub struct Session<D, A, T> {
    config: PipelineConfig,
    wizard: Rc<RefCell<Wizard>>,
    detector: D,
    analyzer: A,
    timer: T,
    history: HistoryStore,
    drafts: DraftStore,
}

impl<D, A, T> Session<D, A, T>
where
    D: LandmarkDetector,
    A: Analyzer,
    T: Timer,
{
    /// Start a session, resuming answers and calibration from the draft store.
    pub fn new(
        config: PipelineConfig,
        detector: D,
        analyzer: A,
        timer: T,
        history: HistoryStore,
        drafts: DraftStore,
    ) -> Self {
        let wizard = drafts.load().map_or_else(Wizard::new, Wizard::restore);
        Self {
            config,
            wizard: Rc::new(RefCell::new(wizard)),
            detector,
            analyzer,
            timer,
            history,
            drafts,
        }
    }

    /// Render model for the current state.
    #[must_use]
    pub fn view(&self) -> WizardView {
        self.wizard.borrow().view()
    }

    /// Read the wizard without mutating it.
    pub fn inspect<R>(&self, f: impl FnOnce(&Wizard) -> R) -> R {
        f(&self.wizard.borrow())
    }

    /// Apply a synchronous wizard transition, saving the draft if it changed.
    pub fn update<R>(&self, f: impl FnOnce(&mut Wizard) -> R) -> R {
        let (result, changed) = {
            let mut wizard = self.wizard.borrow_mut();
            let before = wizard.draft();
            let result = f(&mut wizard);
            let after = wizard.draft();
            (result, (after != before).then_some(after))
        };
        if let Some(draft) = changed {
            self.drafts.save(Some(draft));
        }
        result
    }

    /// See [`Wizard::on_continue`].
    ///
    /// # Errors
    ///
    /// Propagates the wizard's refusal.
    pub fn on_continue(&self) -> Result<Option<Effect>, StepError> {
        self.update(Wizard::on_continue)
    }

    /// See [`Wizard::on_back`].
    ///
    /// # Errors
    ///
    /// Propagates the wizard's refusal.
    pub fn on_back(&self) -> Result<(), StepError> {
        self.update(Wizard::on_back)
    }

    /// See [`Wizard::on_complete`].
    ///
    /// # Errors
    ///
    /// Propagates the wizard's refusal.
    pub fn on_complete(&self, edits: &CalibrationEdits) -> Result<Effect, StepError> {
        self.update(|wizard| wizard.on_complete(edits))
    }

    /// See [`Wizard::retry_preview`].
    ///
    /// # Errors
    ///
    /// Propagates the wizard's refusal.
    pub fn retry_preview(&self) -> Result<Effect, StepError> {
        self.update(Wizard::retry_preview)
    }

    /// See [`Wizard::retry_processing`].
    ///
    /// # Errors
    ///
    /// Propagates the wizard's refusal.
    pub fn retry_processing(&self) -> Result<Effect, StepError> {
        self.update(Wizard::retry_processing)
    }

    /// See [`Wizard::abort_processing`].
    pub fn abort_processing(&self) {
        self.update(Wizard::abort_processing);
    }

    /// See [`Wizard::reset`].
    pub fn reset(&self) {
        self.update(Wizard::reset);
    }

    /// Prepare an uploaded photo and store it for `view`.
    ///
    /// A newer upload for the same view supersedes this one; its result
    /// is then dropped.
    ///
    /// Decoding is synchronous. The abort and deadline are checked once
    /// before it starts; a decode already running is not interrupted.
    ///
    /// # Errors
    ///
    /// Refused once calibration has started. Preparation failures are
    /// recorded on the photo, not returned.
    #[allow(clippy::future_not_send)] // single-threaded; the wizard lives in an Rc
    pub async fn upload(&self, view: View, bytes: Vec<u8>) -> Result<(), StepError> {
        let attempt = self.update(|wizard| wizard.begin_upload(view))?;
        let (max_dimension, quality) = (self.config.max_image_dimension, self.config.jpeg_quality);
        let prepared = with_abort_and_timeout(
            async move {
                yield_now().await;
                prepare_image(&bytes, max_dimension, quality)
            },
            attempt.token(),
            &self.timer,
            self.config.image_timeout(),
            &format!("{} preparation", view.label()),
        )
        .await;

        let outcome = match prepared {
            Err(TaskError::Aborted) => return Ok(()),
            Err(e) => Err(e.to_string()),
            Ok(result) => result.map_err(|e| e.to_string()),
        };
        self.update(|wizard| wizard.apply_upload(view, &attempt, outcome));
        Ok(())
    }

    /// Execute an effect returned by a transition.
    #[allow(clippy::future_not_send)]
    pub async fn run(&self, effect: Effect) {
        match effect {
            Effect::PreparePreview {
                attempt,
                front,
                side,
            } => {
                let outcome = prepare_preview(
                    &self.detector,
                    &front,
                    &side,
                    attempt.token(),
                    &self.timer,
                    &self.config,
                )
                .await;
                self.update(|wizard| wizard.apply_preview(&attempt, outcome));
            }
            Effect::RunProcessing {
                attempt,
                calibration,
                preview,
            } => self.run_processing(&attempt, &calibration, &preview).await,
        }
    }

    #[allow(clippy::future_not_send)]
    async fn run_processing(
        &self,
        attempt: &Attempt,
        calibration: &ManualCalibrationResult,
        preview: &LandmarkPreviewData,
    ) {
        let profile = &calibration.profile;

        let checked = self
            .stage(attempt, ProcessingStage::ValidateCalibration, async {
                check_complete(calibration, preview).map_err(|e| {
                    tracing::error!(error = %e, "calibration invariant violated");
                    AnalysisError::from(e)
                })
            })
            .await;
        if checked.is_none() {
            return;
        }
        let Some(mut metrics) = self
            .stage(
                attempt,
                ProcessingStage::MeasureFront,
                self.analyzer
                    .measure(View::Front, calibration.points(View::Front), profile),
            )
            .await
        else {
            return;
        };
        let Some(side) = self
            .stage(
                attempt,
                ProcessingStage::MeasureSide,
                self.analyzer
                    .measure(View::Side, calibration.points(View::Side), profile),
            )
            .await
        else {
            return;
        };
        metrics.extend(side);
        let Some(scores) = self
            .stage(
                attempt,
                ProcessingStage::Score,
                self.analyzer.score(&metrics, profile),
            )
            .await
        else {
            return;
        };

        let mut history = self.history.list_snapshots();
        let snapshot = AnalysisSnapshot {
            id: format!("snapshot-{}", history.len() + 1),
            created_at_iso: now().to_rfc3339_opts(SecondsFormat::Millis, true),
            overall: scores.overall,
            pillar_scores: scores.pillar_scores,
            cohort_key: Some(profile.cohort_key()),
            metrics,
        };
        if self.update(|wizard| wizard.complete_processing(attempt, snapshot.clone())) {
            tracing::debug!(id = %snapshot.id, overall = snapshot.overall, "analysis saved");
            history.insert(0, snapshot);
            self.history.save(history);
        }
    }

    /// Run one processing stage under the attempt's token and the stage
    /// deadline. `None` means the run must stop here.
    #[allow(clippy::future_not_send)]
    async fn stage<R>(
        &self,
        attempt: &Attempt,
        stage: ProcessingStage,
        work: impl Future<Output = Result<R, AnalysisError>>,
    ) -> Option<R> {
        if !self.wizard.borrow_mut().stage_started(attempt, stage) {
            return None;
        }
        let result = with_abort_and_timeout(
            work,
            attempt.token(),
            &self.timer,
            self.config.stage_timeout(),
            stage.label(),
        )
        .await;

        let (report, value) = match result {
            Err(TaskError::Aborted) => return None,
            Err(e) => (Err(e.to_string()), None),
            Ok(Err(e)) => (Err(e.to_string()), None),
            Ok(Ok(value)) => (Ok(()), Some(value)),
        };
        if !self.wizard.borrow_mut().stage_finished(attempt, stage, report) {
            return None;
        }
        value
    }

    /// Score trends over the saved history.
    #[must_use]
    pub fn analytics(&self, range: TimeRange) -> AnalyticsModel {
        compute_analytics_from_snapshots(&self.history.list_snapshots(), range)
    }

    /// Receive the history after every saved analysis.
    #[must_use]
    pub fn history_updates(&self) -> Subscription<Vec<AnalysisSnapshot>> {
        self.history.subscribe()
    }
}

fn now() -> DateTime<Utc> {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
}
