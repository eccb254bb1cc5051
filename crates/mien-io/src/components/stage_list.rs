//! Processing stage checklist.

use dioxus::prelude::*;
use mien_pipeline::{StageProgress, StageStatus};

/// Props for the [`StageList`] component.
#[derive(Props, Clone, PartialEq)]
pub struct StageListProps {
    /// Stages in execution order.
    stages: Vec<StageProgress>,
}

/// One row per processing stage with its status.
#[component]
pub fn StageList(props: StageListProps) -> Element {
    rsx! {
        ol { class: "stages",
            for entry in props.stages {
                li {
                    key: "{entry.stage:?}",
                    class: status_class(entry.status),
                    span { class: "marker", {marker(entry.status)} }
                    "{entry.stage.label()}"
                }
            }
        }
    }
}

const fn status_class(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "pending",
        StageStatus::Running => "running",
        StageStatus::Done => "done",
        StageStatus::Error => "failed",
    }
}

const fn marker(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Pending => "○",
        StageStatus::Running => "◌",
        StageStatus::Done => "✓",
        StageStatus::Error => "✕",
    }
}
