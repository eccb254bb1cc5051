//! Calibration merge: user corrections folded over auto-detected landmarks.
//!
//! [`merge`] is a pure function of the previous result, the current
//! preview, and the pending edits. Point identity is preserved:
//! moving a point never changes its id, and a point the detector missed
//! gets a fresh id above every id already in use for that view.
//!
//! With no edits and no previous result the output is exactly the
//! detector baseline, and merging a result with the same preview again
//! reproduces it unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{LandmarkId, LandmarkPoint, LandmarkPreviewData, ManualCalibrationResult, Profile, View};

/// One user correction on one view.
#[derive(Debug, Clone, PartialEq)]
pub enum PointEdit {
    /// Drag an existing point to a new position.
    Move {
        /// Point to move.
        id: LandmarkId,
        /// New horizontal position.
        x: f64,
        /// New vertical position.
        y: f64,
    },
    /// Place a point the detector missed.
    Add {
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
        /// Optional anatomical name.
        name: Option<String>,
    },
    /// Restore a detected point to its auto position, or drop an added one.
    Reset {
        /// Point to reset.
        id: LandmarkId,
    },
}

/// Pending edits, applied per view in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationEdits {
    by_view: BTreeMap<View, Vec<PointEdit>>,
}

impl CalibrationEdits {
    /// No edits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an edit for `view`.
    pub fn push(&mut self, view: View, edit: PointEdit) {
        self.by_view.entry(view).or_default().push(edit);
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, view: View, edit: PointEdit) -> Self {
        self.push(view, edit);
        self
    }

    /// Edits queued for `view`.
    #[must_use]
    pub fn for_view(&self, view: View) -> &[PointEdit] {
        self.by_view.get(&view).map_or(&[], Vec::as_slice)
    }

    /// Whether no edits are queued on any view.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_view.values().all(Vec::is_empty)
    }
}

/// A merge produced (or would produce) corrupt calibration state.
///
/// These indicate a logic fault upstream; the wizard logs them and
/// refuses to advance rather than continuing with bad landmarks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeInvariantError {
    /// Two points in one view share an id.
    #[error("{view} landmark {id} appears more than once")]
    DuplicateId {
        /// Affected view.
        view: View,
        /// Repeated id.
        id: LandmarkId,
    },

    /// A detected point has no counterpart in the calibration.
    #[error("{view} landmark {id} from the detector has no calibrated counterpart")]
    MissingPoint {
        /// Affected view.
        view: View,
        /// Missing id.
        id: LandmarkId,
    },

    /// An edit referenced a point that does not exist.
    #[error("{view} edit refers to unknown landmark {id}")]
    UnknownPoint {
        /// Affected view.
        view: View,
        /// Unknown id.
        id: LandmarkId,
    },

    /// An edit supplied a NaN or infinite coordinate.
    #[error("{view} edit has a non-finite position")]
    InvalidPosition {
        /// Affected view.
        view: View,
    },

    /// No id above the current maximum is representable.
    #[error("{view} has no free landmark ids left")]
    IdsExhausted {
        /// Affected view.
        view: View,
    },
}

/// Fold `edits` over the auto baseline in `preview`.
///
/// Positions from `previous` (when resuming) take precedence over the
/// baseline for matching ids, and points the user added previously are
/// kept after the detected ones.
///
/// # Errors
///
/// Returns a [`MergeInvariantError`] if an edit is invalid or the result
/// would violate point-identity invariants.
pub fn merge(
    previous: Option<&ManualCalibrationResult>,
    preview: &LandmarkPreviewData,
    edits: &CalibrationEdits,
    profile: &Profile,
) -> Result<ManualCalibrationResult, MergeInvariantError> {
    let mut manual_points = BTreeMap::new();
    for view in View::ALL {
        let baseline = preview.landmarks(view);
        let resumed = previous.map_or(&[][..], |p| p.points(view));
        let mut points = overlay(baseline, resumed);
        for edit in edits.for_view(view) {
            apply_edit(view, baseline, &mut points, edit)?;
        }
        manual_points.insert(view, points);
    }

    let result = ManualCalibrationResult {
        manual_points,
        profile: profile.clone(),
    };
    check_complete(&result, preview)?;
    Ok(result)
}

/// Verify that `result` covers every detected point exactly once.
///
/// # Errors
///
/// Returns [`MergeInvariantError::DuplicateId`] or
/// [`MergeInvariantError::MissingPoint`] on the first violation.
pub fn check_complete(
    result: &ManualCalibrationResult,
    preview: &LandmarkPreviewData,
) -> Result<(), MergeInvariantError> {
    for view in View::ALL {
        let points = result.points(view);
        let mut ids = HashSet::with_capacity(points.len());
        for point in points {
            if !ids.insert(point.id) {
                return Err(MergeInvariantError::DuplicateId { view, id: point.id });
            }
        }
        if let Some(missing) = preview.landmarks(view).iter().find(|p| !ids.contains(&p.id)) {
            return Err(MergeInvariantError::MissingPoint {
                view,
                id: missing.id,
            });
        }
    }
    Ok(())
}

/// Baseline points in detector order, overridden by resumed positions,
/// followed by resumed points the detector does not know about.
fn overlay(baseline: &[LandmarkPoint], resumed: &[LandmarkPoint]) -> Vec<LandmarkPoint> {
    let resumed_by_id: HashMap<LandmarkId, &LandmarkPoint> =
        resumed.iter().map(|p| (p.id, p)).collect();
    let baseline_ids: HashSet<LandmarkId> = baseline.iter().map(|p| p.id).collect();

    let mut points: Vec<LandmarkPoint> = baseline
        .iter()
        .map(|auto| {
            resumed_by_id.get(&auto.id).map_or_else(
                || auto.clone(),
                |manual| LandmarkPoint {
                    name: manual.name.clone().or_else(|| auto.name.clone()),
                    ..(*manual).clone()
                },
            )
        })
        .collect();
    points.extend(
        resumed
            .iter()
            .filter(|p| !baseline_ids.contains(&p.id))
            .cloned(),
    );
    points
}

fn apply_edit(
    view: View,
    baseline: &[LandmarkPoint],
    points: &mut Vec<LandmarkPoint>,
    edit: &PointEdit,
) -> Result<(), MergeInvariantError> {
    match edit {
        PointEdit::Move { id, x, y } => {
            if !x.is_finite() || !y.is_finite() {
                return Err(MergeInvariantError::InvalidPosition { view });
            }
            let point = points
                .iter_mut()
                .find(|p| p.id == *id)
                .ok_or(MergeInvariantError::UnknownPoint { view, id: *id })?;
            point.x = *x;
            point.y = *y;
        }
        PointEdit::Add { x, y, name } => {
            if !x.is_finite() || !y.is_finite() {
                return Err(MergeInvariantError::InvalidPosition { view });
            }
            let next = baseline
                .iter()
                .chain(points.iter())
                .map(|p| p.id.0)
                .max()
                .map_or(Some(0), |max| max.checked_add(1))
                .ok_or(MergeInvariantError::IdsExhausted { view })?;
            points.push(LandmarkPoint {
                id: LandmarkId(next),
                name: name.clone(),
                x: *x,
                y: *y,
            });
        }
        PointEdit::Reset { id } => {
            let index = points
                .iter()
                .position(|p| p.id == *id)
                .ok_or(MergeInvariantError::UnknownPoint { view, id: *id })?;
            match baseline.iter().find(|p| p.id == *id) {
                Some(auto) => points[index] = auto.clone(),
                None => {
                    points.remove(index);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{preview_with, profile};

    fn ids(points: &[LandmarkPoint]) -> Vec<u32> {
        points.iter().map(|p| p.id.0).collect()
    }

    #[test]
    fn empty_edits_reproduce_baseline() {
        let preview = preview_with(4, 3);
        let result = merge(None, &preview, &CalibrationEdits::new(), &profile()).unwrap();
        assert_eq!(result.points(View::Front), preview.front_landmarks.as_slice());
        assert_eq!(result.points(View::Side), preview.side_landmarks.as_slice());
    }

    #[test]
    fn merge_is_idempotent_without_edits() {
        let preview = preview_with(4, 3);
        let edits = CalibrationEdits::new().with(
            View::Front,
            PointEdit::Move {
                id: LandmarkId(2),
                x: 1.0,
                y: 2.0,
            },
        );
        let prev = merge(None, &preview, &edits, &profile()).unwrap();

        let once = merge(Some(&prev), &preview, &CalibrationEdits::new(), &profile()).unwrap();
        let twice = merge(Some(&once), &preview, &CalibrationEdits::new(), &profile()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, prev);
    }

    #[test]
    fn move_keeps_identity_and_order() {
        let preview = preview_with(3, 3);
        let edits = CalibrationEdits::new().with(
            View::Side,
            PointEdit::Move {
                id: LandmarkId(1),
                x: 42.0,
                y: 7.0,
            },
        );
        let result = merge(None, &preview, &edits, &profile()).unwrap();
        let side = result.points(View::Side);
        assert_eq!(ids(side), vec![0, 1, 2]);
        assert!((side[1].x - 42.0).abs() < f64::EPSILON);
        assert!((side[1].y - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn added_points_get_fresh_ids() {
        let preview = preview_with(3, 3);
        let edits = CalibrationEdits::new()
            .with(
                View::Front,
                PointEdit::Add {
                    x: 5.0,
                    y: 5.0,
                    name: Some("menton".into()),
                },
            )
            .with(
                View::Front,
                PointEdit::Add {
                    x: 6.0,
                    y: 6.0,
                    name: None,
                },
            );
        let result = merge(None, &preview, &edits, &profile()).unwrap();
        assert_eq!(ids(result.points(View::Front)), vec![0, 1, 2, 3, 4]);
        assert_eq!(result.points(View::Front)[3].name.as_deref(), Some("menton"));
    }

    #[test]
    fn added_ids_clear_resumed_points() {
        let preview = preview_with(3, 3);
        let add = |x| PointEdit::Add { x, y: 0.0, name: None };
        let prev = merge(
            None,
            &preview,
            &CalibrationEdits::new().with(View::Front, add(1.0)),
            &profile(),
        )
        .unwrap();
        let next = merge(
            Some(&prev),
            &preview,
            &CalibrationEdits::new().with(View::Front, add(2.0)),
            &profile(),
        )
        .unwrap();
        assert_eq!(ids(next.points(View::Front)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn resumed_positions_override_baseline() {
        let preview = preview_with(2, 2);
        let mut prev = merge(None, &preview, &CalibrationEdits::new(), &profile()).unwrap();
        prev.manual_points.get_mut(&View::Front).unwrap()[0].x = 99.0;

        let result = merge(Some(&prev), &preview, &CalibrationEdits::new(), &profile()).unwrap();
        assert!((result.points(View::Front)[0].x - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_restores_detected_point_and_drops_added_one() {
        let preview = preview_with(2, 2);
        let edits = CalibrationEdits::new()
            .with(
                View::Front,
                PointEdit::Move {
                    id: LandmarkId(0),
                    x: 50.0,
                    y: 50.0,
                },
            )
            .with(
                View::Front,
                PointEdit::Add {
                    x: 1.0,
                    y: 1.0,
                    name: None,
                },
            )
            .with(View::Front, PointEdit::Reset { id: LandmarkId(0) })
            .with(View::Front, PointEdit::Reset { id: LandmarkId(2) });
        let result = merge(None, &preview, &edits, &profile()).unwrap();
        assert_eq!(result.points(View::Front), preview.front_landmarks.as_slice());
    }

    #[test]
    fn moving_unknown_point_fails() {
        let preview = preview_with(2, 2);
        let edits = CalibrationEdits::new().with(
            View::Side,
            PointEdit::Move {
                id: LandmarkId(17),
                x: 0.0,
                y: 0.0,
            },
        );
        let err = merge(None, &preview, &edits, &profile()).unwrap_err();
        assert_eq!(
            err,
            MergeInvariantError::UnknownPoint {
                view: View::Side,
                id: LandmarkId(17)
            }
        );
    }

    #[test]
    fn non_finite_position_fails() {
        let preview = preview_with(2, 2);
        let edits = CalibrationEdits::new().with(
            View::Front,
            PointEdit::Move {
                id: LandmarkId(0),
                x: f64::NAN,
                y: 0.0,
            },
        );
        let err = merge(None, &preview, &edits, &profile()).unwrap_err();
        assert_eq!(err, MergeInvariantError::InvalidPosition { view: View::Front });
    }

    #[test]
    fn duplicate_ids_in_previous_result_are_caught() {
        let preview = preview_with(2, 2);
        let mut prev = merge(None, &preview, &CalibrationEdits::new(), &profile()).unwrap();
        let extra = LandmarkPoint::new(9, 0.0, 0.0);
        let side = prev.manual_points.get_mut(&View::Side).unwrap();
        side.push(extra.clone());
        side.push(extra);

        let err = merge(Some(&prev), &preview, &CalibrationEdits::new(), &profile()).unwrap_err();
        assert_eq!(
            err,
            MergeInvariantError::DuplicateId {
                view: View::Side,
                id: LandmarkId(9)
            }
        );
    }

    #[test]
    fn check_complete_reports_missing_point() {
        let preview = preview_with(3, 3);
        let mut result = merge(None, &preview, &CalibrationEdits::new(), &profile()).unwrap();
        result.manual_points.get_mut(&View::Front).unwrap().remove(1);
        assert_eq!(
            check_complete(&result, &preview),
            Err(MergeInvariantError::MissingPoint {
                view: View::Front,
                id: LandmarkId(1)
            })
        );
    }
}
