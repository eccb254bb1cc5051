//! Score trend panel: range selector, sparkline, and pillar breakdown.

use std::fmt::Write;

use dioxus::prelude::*;
use mien_pipeline::{AnalyticsModel, SeriesPoint, TimeRange};

const SPARK_WIDTH: f64 = 240.0;
const SPARK_HEIGHT: f64 = 64.0;

/// Props for the [`TrendPanel`] component.
#[derive(Props, Clone, PartialEq)]
pub struct TrendPanelProps {
    /// Trend model for the selected range.
    model: AnalyticsModel,
    /// Selected range.
    range: TimeRange,
    /// Callback fired when a range button is clicked.
    on_range: EventHandler<TimeRange>,
}

/// Overall score history and the latest breakdown with deltas.
#[component]
pub fn TrendPanel(props: TrendPanelProps) -> Element {
    let model = &props.model;
    let points = sparkline_points(&model.series_overall);
    let on_range = props.on_range;

    rsx! {
        section { class: "trends",
            div { class: "range-buttons", role: "group",
                for range in TimeRange::ALL {
                    button {
                        key: "{range}",
                        class: if range == props.range { "button selected" } else { "button" },
                        "aria-pressed": "{range == props.range}",
                        onclick: move |_| on_range.call(range),
                        "{range}"
                    }
                }
            }

            if model.breakdown_rows.is_empty() {
                p { class: "muted", "No saved analyses yet." }
            } else {
                svg {
                    xmlns: "http://www.w3.org/2000/svg",
                    view_box: "0 0 {SPARK_WIDTH} {SPARK_HEIGHT}",
                    class: "sparkline",
                    "preserveAspectRatio": "none",
                    if !points.is_empty() {
                        polyline {
                            points: "{points}",
                            fill: "none",
                            stroke: "currentColor",
                            stroke_width: "2",
                        }
                    }
                }
                table { class: "breakdown",
                    tbody {
                        for row in model.breakdown_rows.iter() {
                            tr { key: "{row.label}",
                                th { "{row.label}" }
                                td { "{row.value}" }
                                td { class: delta_class(&row.delta), "{row.delta}" }
                            }
                        }
                    }
                }
                if let Some(ref cohort) = model.cohort_label {
                    p { class: "muted", "Cohort: {cohort}" }
                }
            }
        }
    }
}

fn delta_class(delta: &str) -> &'static str {
    if delta.starts_with('-') {
        "delta down"
    } else if delta.trim_start_matches('+').trim_start_matches(['0', '.']).is_empty() {
        "delta flat"
    } else {
        "delta up"
    }
}

/// SVG `points` for the overall series on a 0–100 vertical scale.
///
/// A single point is drawn as a flat line across the full width.
fn sparkline_points(series: &[SeriesPoint]) -> String {
    let y = |value: i64| {
        #[allow(clippy::cast_precision_loss)]
        let clamped = value.clamp(0, 100) as f64;
        SPARK_HEIGHT - clamped / 100.0 * SPARK_HEIGHT
    };

    let mut out = String::new();
    match series {
        [] => {}
        [only] => {
            let y = y(only.value);
            let _ = write!(out, "0.0,{y:.1} {SPARK_WIDTH:.1},{y:.1}");
        }
        _ => {
            #[allow(clippy::cast_precision_loss)]
            let step = SPARK_WIDTH / (series.len() - 1) as f64;
            for (i, point) in series.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f64 * step;
                let _ = write!(out, "{x:.1},{:.1} ", y(point.value));
            }
        }
    }
    out.trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(value: i64) -> SeriesPoint {
        SeriesPoint {
            t: String::new(),
            value,
        }
    }

    #[test]
    fn sparkline_spans_full_width() {
        let points = sparkline_points(&[point(0), point(50), point(100)]);
        assert_eq!(points, "0.0,64.0 120.0,32.0 240.0,0.0");
    }

    #[test]
    fn single_point_is_flat() {
        assert_eq!(sparkline_points(&[point(75)]), "0.0,16.0 240.0,16.0");
        assert!(sparkline_points(&[]).is_empty());
    }

    #[test]
    fn deltas_are_classified() {
        assert_eq!(delta_class("+3"), "delta up");
        assert_eq!(delta_class("+0.0"), "delta flat");
        assert_eq!(delta_class("+0"), "delta flat");
        assert_eq!(delta_class("-0.4"), "delta down");
        assert_eq!(delta_class("+0.5"), "delta up");
    }
}
