//! Trend and delta breakdowns over saved analysis snapshots.
//!
//! [`compute_analytics_from_snapshots`] is pure and synchronous. Its
//! notion of "now" is the creation time of the first snapshot in the
//! input (history is stored newest first), never the wall clock, so the
//! same history always yields the same model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AnalysisSnapshot;

/// Selectable trend window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    /// Last 7 days.
    #[serde(rename = "7d")]
    Week,
    /// Last 30 days.
    #[default]
    #[serde(rename = "30d")]
    Month,
    /// Last 90 days.
    #[serde(rename = "90d")]
    Quarter,
}

impl TimeRange {
    /// All ranges, shortest first.
    pub const ALL: [Self; 3] = [Self::Week, Self::Month, Self::Quarter];

    /// Window length in days.
    #[must_use]
    pub const fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    /// Short key (`"7d"`, `"30d"`, `"90d"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised time range key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time range {0:?} (expected 7d, 30d or 90d)")]
pub struct ParseTimeRangeError(String);

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| ParseTimeRangeError(s.to_owned()))
    }
}

/// One point of the overall-score series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Snapshot timestamp as stored.
    pub t: String,
    /// Overall score rounded to an integer.
    pub value: i64,
}

/// One line of the score breakdown table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRow {
    /// Score name.
    pub label: String,
    /// Latest value, formatted for display (`"80 / 100"`, `"7.0 / 10"`).
    pub value: String,
    /// Signed change against the previous snapshot (`"+10"`, `"-0.2"`).
    pub delta: String,
}

/// Derived view over a snapshot history. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsModel {
    /// Overall score per snapshot inside the window, oldest first.
    pub series_overall: Vec<SeriesPoint>,
    /// Overall plus the four pillars, always in that order when non-empty.
    pub breakdown_rows: Vec<BreakdownRow>,
    /// Cohort of the latest snapshot.
    pub cohort_label: Option<String>,
}

/// Compute the trend model for `range` from a newest-first history.
///
/// Snapshots older than `range` before the first snapshot's timestamp
/// are excluded from the series. If nothing survives the filter (only
/// possible when timestamps do not parse), the first snapshot still
/// supplies the breakdown so a non-empty history never yields an empty
/// model. Non-finite scores count as zero.
#[must_use]
pub fn compute_analytics_from_snapshots(
    snapshots: &[AnalysisSnapshot],
    range: TimeRange,
) -> AnalyticsModel {
    let Some(first) = snapshots.first() else {
        return AnalyticsModel::default();
    };

    let cutoff = parse_timestamp(&first.created_at_iso)
        .and_then(|baseline| baseline.checked_sub_signed(TimeDelta::days(range.days())));

    // Oldest first before the stable sort, so equal timestamps keep the
    // newer snapshot last.
    let mut in_window: Vec<&AnalysisSnapshot> = snapshots
        .iter()
        .rev()
        .filter(|s| match (cutoff, parse_timestamp(&s.created_at_iso)) {
            (Some(cutoff), Some(at)) => at >= cutoff,
            _ => false,
        })
        .collect();
    in_window.sort_by(|a, b| a.created_at_iso.cmp(&b.created_at_iso));

    let series_overall = in_window
        .iter()
        .map(|s| SeriesPoint {
            t: s.created_at_iso.clone(),
            value: round_score(s.overall),
        })
        .collect();

    let latest = in_window.last().copied().unwrap_or(first);
    let previous = in_window
        .len()
        .checked_sub(2)
        .and_then(|i| in_window.get(i))
        .copied();

    AnalyticsModel {
        series_overall,
        breakdown_rows: breakdown(latest, previous),
        cohort_label: latest.cohort_key.clone(),
    }
}

fn breakdown(latest: &AnalysisSnapshot, previous: Option<&AnalysisSnapshot>) -> Vec<BreakdownRow> {
    let overall = round_score(latest.overall);
    let overall_delta = previous.map_or(0, |p| overall - round_score(p.overall));

    let mut rows = vec![BreakdownRow {
        label: "Overall".to_owned(),
        value: format!("{overall} / 100"),
        delta: format!("{overall_delta:+}"),
    }];

    let pillars: [(&str, fn(&AnalysisSnapshot) -> f64); 4] = [
        ("Harmony", |s| s.pillar_scores.harmony),
        ("Angularity", |s| s.pillar_scores.angularity),
        ("Dimorphism", |s| s.pillar_scores.dimorphism),
        ("Features", |s| s.pillar_scores.features),
    ];
    for (label, pick) in pillars {
        let value = finite(pick(latest)) / 10.0;
        let delta = previous.map_or(0.0, |p| value - finite(pick(p)) / 10.0);
        rows.push(BreakdownRow {
            label: label.to_owned(),
            value: format!("{value:.1} / 10"),
            delta: signed_tenths(delta),
        });
    }
    rows
}

/// Parse a stored timestamp: RFC 3339, or a bare date/date-time taken as UTC.
fn parse_timestamp(iso: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(iso)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(iso, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc())
        })
}

/// Largest score magnitude kept; anything beyond is malformed input.
const SCORE_LIMIT: f64 = 1e6;

/// Non-finite scores count as zero. Finite ones are clamped so rounding
/// and deltas stay well inside `i64`.
fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-SCORE_LIMIT, SCORE_LIMIT)
    } else {
        0.0
    }
}

/// Round half up, matching how scores are shown everywhere else.
#[allow(clippy::cast_possible_truncation)]
fn round_score(value: f64) -> i64 {
    (finite(value) + 0.5).floor() as i64
}

/// One decimal place with an explicit `+` for zero and positive deltas.
fn signed_tenths(delta: f64) -> String {
    // Adding 0.0 turns -0.0 into 0.0 so it prints as "+0.0".
    let delta = (delta * 10.0).round() / 10.0 + 0.0;
    if delta >= 0.0 {
        format!("+{delta:.1}")
    } else {
        format!("{delta:.1}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PillarScores;

    fn snapshot(at: &str, overall: f64, harmony: f64) -> AnalysisSnapshot {
        AnalysisSnapshot {
            id: at.to_owned(),
            created_at_iso: at.to_owned(),
            overall,
            pillar_scores: PillarScores {
                harmony,
                angularity: 50.0,
                dimorphism: 40.0,
                features: 30.0,
            },
            cohort_key: None,
            metrics: Vec::new(),
        }
    }

    fn row<'a>(model: &'a AnalyticsModel, label: &str) -> &'a BreakdownRow {
        model
            .breakdown_rows
            .iter()
            .find(|r| r.label == label)
            .unwrap()
    }

    #[test]
    fn empty_history_gives_empty_model() {
        let model = compute_analytics_from_snapshots(&[], TimeRange::Month);
        assert_eq!(model, AnalyticsModel::default());
    }

    #[test]
    fn two_snapshot_example() {
        let history = [
            snapshot("2026-02-01", 70.0, 60.0),
            snapshot("2026-02-05", 80.0, 70.0),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Month);

        assert_eq!(
            model.series_overall,
            vec![
                SeriesPoint {
                    t: "2026-02-01".into(),
                    value: 70
                },
                SeriesPoint {
                    t: "2026-02-05".into(),
                    value: 80
                },
            ]
        );
        assert_eq!(row(&model, "Overall").value, "80 / 100");
        assert_eq!(row(&model, "Overall").delta, "+10");
        assert_eq!(row(&model, "Harmony").value, "7.0 / 10");
        assert_eq!(row(&model, "Harmony").delta, "+1.0");
    }

    #[test]
    fn rows_have_fixed_order() {
        let model =
            compute_analytics_from_snapshots(&[snapshot("2026-01-01", 1.0, 1.0)], TimeRange::Week);
        let labels: Vec<&str> = model.breakdown_rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Overall", "Harmony", "Angularity", "Dimorphism", "Features"]
        );
    }

    #[test]
    fn single_snapshot_has_zero_deltas() {
        let model = compute_analytics_from_snapshots(
            &[snapshot("2026-03-01T12:00:00Z", 64.6, 55.0)],
            TimeRange::Week,
        );
        assert_eq!(row(&model, "Overall").value, "65 / 100");
        assert_eq!(row(&model, "Overall").delta, "+0");
        for label in ["Harmony", "Angularity", "Dimorphism", "Features"] {
            assert_eq!(row(&model, label).delta, "+0.0", "{label}");
        }
    }

    #[test]
    fn old_snapshots_fall_out_of_the_window() {
        let history = [
            snapshot("2026-03-01T00:00:00Z", 75.0, 70.0),
            snapshot("2026-01-01T00:00:00Z", 40.0, 10.0),
            snapshot("2026-02-25T00:00:00Z", 72.0, 72.0),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Week);

        let times: Vec<&str> = model.series_overall.iter().map(|p| p.t.as_str()).collect();
        assert_eq!(times, ["2026-02-25T00:00:00Z", "2026-03-01T00:00:00Z"]);
        assert_eq!(row(&model, "Overall").delta, "+3");
        assert_eq!(row(&model, "Harmony").delta, "-0.2");
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let history = [
            snapshot("2026-03-31T00:00:00Z", 70.0, 70.0),
            snapshot("2026-03-01T00:00:00Z", 60.0, 60.0),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Month);
        assert_eq!(model.series_overall.len(), 2);
    }

    #[test]
    fn unparseable_baseline_falls_back_to_first_snapshot() {
        let mut first = snapshot("not-a-date", 58.0, 45.0);
        first.cohort_key = Some("white:male".into());
        let history = [first, snapshot("2026-02-01", 90.0, 90.0)];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Quarter);

        assert!(model.series_overall.is_empty());
        assert_eq!(row(&model, "Overall").value, "58 / 100");
        assert_eq!(row(&model, "Overall").delta, "+0");
        assert_eq!(model.cohort_label.as_deref(), Some("white:male"));
    }

    #[test]
    fn non_finite_scores_count_as_zero() {
        let history = [
            snapshot("2026-02-02", f64::NAN, f64::INFINITY),
            snapshot("2026-02-01", 10.0, 10.0),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Week);
        assert_eq!(row(&model, "Overall").value, "0 / 100");
        assert_eq!(row(&model, "Overall").delta, "-10");
        assert_eq!(row(&model, "Harmony").value, "0.0 / 10");
        assert_eq!(row(&model, "Harmony").delta, "-1.0");
    }

    #[test]
    fn extreme_finite_scores_are_clamped() {
        let history = [
            snapshot("2026-02-05", 1e19, 1e19),
            snapshot("2026-02-01", -1e19, -1e19),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Month);
        assert_eq!(row(&model, "Overall").value, "1000000 / 100");
        assert_eq!(row(&model, "Overall").delta, "+2000000");
        assert_eq!(row(&model, "Harmony").value, "100000.0 / 10");
        assert_eq!(row(&model, "Harmony").delta, "+200000.0");
        assert_eq!(
            model.series_overall.iter().map(|p| p.value).collect::<Vec<_>>(),
            vec![-1_000_000, 1_000_000]
        );
    }

    #[test]
    fn cohort_comes_from_latest_in_window() {
        let mut newest = snapshot("2026-02-10", 70.0, 70.0);
        newest.cohort_key = Some("east_asian:female".into());
        let mut older = snapshot("2026-02-09", 70.0, 70.0);
        older.cohort_key = Some("other".into());
        let model = compute_analytics_from_snapshots(&[newest, older], TimeRange::Week);
        assert_eq!(model.cohort_label.as_deref(), Some("east_asian:female"));
    }

    #[test]
    fn output_is_deterministic() {
        let history = [
            snapshot("2026-02-05T08:00:00Z", 81.2, 66.0),
            snapshot("2026-02-01T08:00:00Z", 79.9, 64.0),
        ];
        let a = compute_analytics_from_snapshots(&history, TimeRange::Month);
        let b = compute_analytics_from_snapshots(&history, TimeRange::Month);
        assert_eq!(a, b);
    }

    #[test]
    fn equal_timestamps_treat_first_as_latest() {
        let history = [
            snapshot("2026-02-05T08:00:00.000Z", 64.0, 75.0),
            snapshot("2026-02-05T08:00:00.000Z", 62.0, 70.0),
        ];
        let model = compute_analytics_from_snapshots(&history, TimeRange::Week);
        assert_eq!(row(&model, "Overall").value, "64 / 100");
        assert_eq!(row(&model, "Overall").delta, "+2");
    }

    #[test]
    fn negative_zero_delta_prints_plus() {
        assert_eq!(signed_tenths(-0.04), "+0.0");
        assert_eq!(signed_tenths(-0.0), "+0.0");
        assert_eq!(signed_tenths(0.3), "+0.3");
        assert_eq!(signed_tenths(-0.2), "-0.2");
    }

    #[test]
    fn time_range_parses_short_keys() {
        assert_eq!("7d".parse::<TimeRange>(), Ok(TimeRange::Week));
        assert_eq!("90d".parse::<TimeRange>(), Ok(TimeRange::Quarter));
        assert!("1y".parse::<TimeRange>().is_err());
        assert_eq!(
            serde_json::to_string(&TimeRange::Month).unwrap(),
            "\"30d\""
        );
    }
}
