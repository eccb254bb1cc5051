//! Scripted collaborators shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use crate::preview::{Detection, DetectionError, LandmarkDetector};
use crate::processing::{AnalysisError, Analyzer, Scores};
use crate::task::Timer;
use crate::types::{
    Gender, ImageState, LandmarkPoint, LandmarkPreviewData, Metric, PillarScores, Profile,
    QualityFlags, View,
};

/// [`Timer`] backed by tokio, so tests can use paused time.
pub(crate) struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

type DetectResult = Result<Detection, DetectionError>;

/// Detector that replays scripted results, then falls back to a fixed one.
pub(crate) struct ScriptedDetector {
    script: RefCell<VecDeque<(Duration, DetectResult)>>,
    fallback: DetectResult,
    delay: Duration,
    calls: Cell<usize>,
}

impl ScriptedDetector {
    pub(crate) fn always(result: DetectResult) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            fallback: result,
            delay: Duration::ZERO,
            calls: Cell::new(0),
        }
    }

    /// Delay applied to fallback results.
    pub(crate) const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a result for the next call, returned after `delay`.
    pub(crate) fn then_after(self, delay: Duration, result: DetectResult) -> Self {
        self.script.borrow_mut().push_back((delay, result));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&self, _view: View, _image: &ImageState) -> impl Future<Output = DetectResult> {
        self.calls.set(self.calls.get() + 1);
        let (delay, result) = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| (self.delay, self.fallback.clone()));
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }
}

/// Analyzer emitting one metric per view and fixed scores.
pub(crate) struct FakeAnalyzer {
    pub(crate) overall: f64,
    pub(crate) fail_view: Option<View>,
    pub(crate) delay: Duration,
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self {
            overall: 72.4,
            fail_view: None,
            delay: Duration::ZERO,
        }
    }
}

impl Analyzer for FakeAnalyzer {
    fn measure(
        &self,
        view: View,
        points: &[LandmarkPoint],
        _profile: &Profile,
    ) -> impl Future<Output = Result<Vec<Metric>, AnalysisError>> {
        let failed = self.fail_view == Some(view);
        let count = points.len();
        let delay = self.delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if failed {
                return Err(AnalysisError::Analyzer(format!("{view} model offline")));
            }
            #[allow(clippy::cast_precision_loss)]
            let value = count as f64;
            Ok(vec![Metric {
                key: format!("{view}_points"),
                value,
                unit: None,
            }])
        }
    }

    fn score(
        &self,
        _metrics: &[Metric],
        _profile: &Profile,
    ) -> impl Future<Output = Result<Scores, AnalysisError>> {
        let overall = self.overall;
        async move {
            Ok(Scores {
                overall,
                pillar_scores: PillarScores {
                    harmony: 70.0,
                    angularity: 65.0,
                    dimorphism: 80.0,
                    features: 75.0,
                },
            })
        }
    }
}

/// Landmarks with ids `0..count` along a diagonal.
pub(crate) fn points(count: u32) -> Vec<LandmarkPoint> {
    (0..count)
        .map(|i| LandmarkPoint::new(i, f64::from(i) * 10.0, f64::from(i) * 5.0))
        .collect()
}

pub(crate) fn detection(count: u32, confidence: f64) -> Detection {
    Detection {
        landmarks: points(count),
        quality: QualityFlags {
            confidence,
            notes: Vec::new(),
        },
    }
}

pub(crate) fn sample_image() -> ImageState {
    ImageState {
        data_url: "data:image/jpeg;base64,AA==".to_owned(),
        width: 4,
        height: 4,
    }
}

pub(crate) fn preview_with(front: u32, side: u32) -> LandmarkPreviewData {
    let quality = QualityFlags {
        confidence: 0.9,
        notes: Vec::new(),
    };
    LandmarkPreviewData {
        front_landmarks: points(front),
        side_landmarks: points(side),
        front_quality: quality.clone(),
        side_quality: quality,
        warnings: Vec::new(),
    }
}

pub(crate) fn profile() -> Profile {
    Profile {
        gender: Gender::Male,
        ethnicity: "white".to_owned(),
    }
}
