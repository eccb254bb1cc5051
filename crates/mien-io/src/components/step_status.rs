//! Progress bar, step title, and inline messages for the current step.

use dioxus::prelude::*;
use mien_pipeline::WizardView;

/// Props for the [`StepStatus`] component.
#[derive(Props, Clone, PartialEq)]
pub struct StepStatusProps {
    /// Render model of the wizard.
    view: WizardView,
}

/// Header shown above every step.
///
/// Shows the overall progress, the step label, the in-flight status
/// line, the step's inline error, and any issue list (failures or
/// quality warnings).
#[component]
pub fn StepStatus(props: StepStatusProps) -> Element {
    let view = &props.view;
    let percent = view.progress_percent;

    rsx! {
        div { class: "step-status",
            div {
                class: "progress",
                role: "progressbar",
                "aria-valuenow": "{percent}",
                "aria-valuemin": "0",
                "aria-valuemax": "100",
                div { class: "progress-fill", style: "width: {percent}%" }
            }
            h2 { "{view.step.label()}" }

            if let Some(ref status) = view.status {
                p { class: "muted pulse", "{status}" }
            }
            if let Some(ref error) = view.error {
                div { class: "error-box", p { "{error}" } }
            }
            if !view.issues.is_empty() {
                ul { class: "issues",
                    for issue in view.issues.iter() {
                        li { key: "{issue}", "{issue}" }
                    }
                }
            }
        }
    }
}
