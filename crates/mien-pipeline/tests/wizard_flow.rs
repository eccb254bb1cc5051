//! Integration test: run two analyses through a session with fake
//! collaborators, then read the trend model back from the saved history.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::future::Future;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use mien_pipeline::{
    AnalysisError, AnalysisSnapshot, Analyzer, CalibrationEdits, Detection, DetectionError, Effect,
    Gender, ImageState, LandmarkDetector, LandmarkId, LandmarkPoint, MemoryStore, Metric,
    PillarScores, PipelineConfig, PointEdit, Profile, QualityFlags, Scores, Session, Step, Store,
    TimeRange, Timer, View, WizardDraft,
};

struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

struct GridDetector;

impl LandmarkDetector for GridDetector {
    fn detect(
        &self,
        _view: View,
        image: &ImageState,
    ) -> impl Future<Output = Result<Detection, DetectionError>> {
        let (w, h) = (f64::from(image.width), f64::from(image.height));
        async move {
            Ok(Detection {
                landmarks: vec![
                    LandmarkPoint::new(0, w * 0.3, h * 0.4).named("left_eye"),
                    LandmarkPoint::new(1, w * 0.7, h * 0.4).named("right_eye"),
                    LandmarkPoint::new(2, w * 0.5, h * 0.9).named("menton"),
                ],
                quality: QualityFlags {
                    confidence: 0.92,
                    notes: Vec::new(),
                },
            })
        }
    }
}

/// Scores grow with the number of calibrated points.
struct CountingAnalyzer;

impl Analyzer for CountingAnalyzer {
    fn measure(
        &self,
        view: View,
        points: &[LandmarkPoint],
        _profile: &Profile,
    ) -> impl Future<Output = Result<Vec<Metric>, AnalysisError>> {
        let metric = Metric {
            key: format!("{view}_points"),
            value: f64::from(u32::try_from(points.len()).unwrap()),
            unit: None,
        };
        async move { Ok(vec![metric]) }
    }

    fn score(
        &self,
        metrics: &[Metric],
        _profile: &Profile,
    ) -> impl Future<Output = Result<Scores, AnalysisError>> {
        let total: f64 = metrics.iter().map(|m| m.value).sum();
        async move {
            Ok(Scores {
                overall: 50.0 + total * 2.0,
                pillar_scores: PillarScores {
                    harmony: 40.0 + total * 5.0,
                    angularity: 60.0,
                    dimorphism: 70.0,
                    features: 55.0,
                },
            })
        }
    }
}

fn jpeg_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(40, 30, image::Rgb([180, 140, 120]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .unwrap();
    bytes
}

type TestSession = Session<GridDetector, CountingAnalyzer, TokioTimer>;

async fn analyse(session: &TestSession, edits: &CalibrationEdits) {
    session.update(|w| w.select_gender(Gender::Male)).unwrap();
    session.on_continue().unwrap();
    session.update(|w| w.select_ethnicity("south_asian")).unwrap();
    session.on_continue().unwrap();
    session.upload(View::Front, jpeg_bytes()).await.unwrap();
    session.upload(View::Side, jpeg_bytes()).await.unwrap();
    session.update(|w| w.set_consent(true)).unwrap();

    let preview = session.on_continue().unwrap().expect("entering calibration starts detection");
    assert!(matches!(preview, Effect::PreparePreview { .. }));
    session.run(preview).await;
    assert_eq!(session.view().step, Step::Calibration);

    let processing = session.on_complete(edits).unwrap();
    session.run(processing).await;
    assert_eq!(session.view().step, Step::Complete);
    assert_eq!(session.view().progress_percent, 100);
}

#[tokio::test(start_paused = true)]
async fn two_analyses_produce_a_trend() {
    let history: Rc<MemoryStore<Vec<AnalysisSnapshot>>> = Rc::new(MemoryStore::default());
    let drafts: Rc<MemoryStore<Option<WizardDraft>>> = Rc::new(MemoryStore::default());
    let session = Session::new(
        PipelineConfig::default(),
        GridDetector,
        CountingAnalyzer,
        TokioTimer,
        history.clone(),
        drafts.clone(),
    );

    analyse(&session, &CalibrationEdits::new()).await;
    session.reset();

    // Second run adds a point on the front view and nudges the chin.
    let edits = CalibrationEdits::new()
        .with(
            View::Front,
            PointEdit::Add {
                x: 20.0,
                y: 10.0,
                name: Some("nasion".into()),
            },
        )
        .with(
            View::Side,
            PointEdit::Move {
                id: LandmarkId(2),
                x: 19.0,
                y: 28.0,
            },
        );
    analyse(&session, &edits).await;

    let saved = history.load();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].id, "snapshot-2");
    assert_eq!(saved[0].cohort_key.as_deref(), Some("south_asian:male"));

    let calibration = drafts.load().unwrap().calibration.unwrap();
    assert_eq!(calibration.points(View::Front).len(), 4);
    assert_eq!(calibration.points(View::Front)[3].id, LandmarkId(3));

    // Both runs are moments apart, so both land in the window.
    let model = session.analytics(TimeRange::Week);
    assert_eq!(model.series_overall.len(), 2);
    let overall = &model.breakdown_rows[0];
    assert_eq!(overall.label, "Overall");
    assert_eq!(overall.value, "64 / 100");
    let harmony = &model.breakdown_rows[1];
    assert_eq!(harmony.value, "7.5 / 10");
    assert_eq!(model.cohort_label.as_deref(), Some("south_asian:male"));
}

#[test]
fn exported_history_feeds_analytics() {
    let json = r#"[
        { "id": "c", "createdAtIso": "2026-03-10T09:00:00.000Z", "overall": 81.6,
          "pillarScores": { "harmony": 82, "angularity": 75, "dimorphism": 88, "features": 79 },
          "cohortKey": "white:female" },
        { "id": "b", "createdAtIso": "2026-03-01T09:00:00.000Z", "overall": 78.2,
          "pillarScores": { "harmony": 80, "angularity": 75, "dimorphism": 85, "features": 80 } },
        { "id": "a", "createdAtIso": "2025-11-01T09:00:00.000Z", "overall": 60 }
    ]"#;
    let snapshots: Vec<AnalysisSnapshot> = serde_json::from_str(json).unwrap();
    let model = mien_pipeline::compute_analytics_from_snapshots(&snapshots, TimeRange::Month);

    let times: Vec<_> = model.series_overall.iter().map(|p| p.t.as_str()).collect();
    assert_eq!(times, ["2026-03-01T09:00:00.000Z", "2026-03-10T09:00:00.000Z"]);

    let rows: Vec<_> = model
        .breakdown_rows
        .iter()
        .map(|r| (r.label.as_str(), r.value.as_str(), r.delta.as_str()))
        .collect();
    assert_eq!(
        rows,
        [
            ("Overall", "82 / 100", "+4"),
            ("Harmony", "8.2 / 10", "+0.2"),
            ("Angularity", "7.5 / 10", "+0.0"),
            ("Dimorphism", "8.8 / 10", "+0.3"),
            ("Features", "7.9 / 10", "-0.1"),
        ]
    );
    assert_eq!(model.cohort_label.as_deref(), Some("white:female"));
}
