use std::rc::Rc;

use dioxus::prelude::*;
use futures::StreamExt;
use mien_io::{
    GlooTimer, LandmarkCanvas, LocalStorageStore, PhotoUpload, StageList, StepStatus, TrendPanel,
    WorkerModel,
};
use mien_pipeline::calibration::{self, CalibrationEdits, PointEdit};
use mien_pipeline::wizard::{PhotoState, PreviewState};
use mien_pipeline::{
    AnalysisSnapshot, Effect, Gender, LandmarkId, PipelineConfig, Session, Step, StepError,
    TimeRange, View, WizardDraft, WizardView,
};

/// Model worker script, started from a Blob URL.
const MODEL_WORKER_JS: &str = include_str!("../assets/model-worker.js");

const HISTORY_KEY: &str = "mien.history";
const DRAFT_KEY: &str = "mien.draft";

/// Ethnicity choices as `(key, label)`.
const ETHNICITIES: &[(&str, &str)] = &[
    ("east_asian", "East Asian"),
    ("south_asian", "South Asian"),
    ("black", "Black"),
    ("white", "White"),
    ("hispanic", "Hispanic / Latino"),
    ("middle_eastern", "Middle Eastern"),
    ("mixed", "Mixed / Other"),
];

type AppSession = Session<WorkerModel, WorkerModel, GlooTimer>;

fn main() {
    mien_io::logging::init("info,mien_pipeline=debug");
    dioxus::launch(app);
}

fn start_session() -> Result<Rc<AppSession>, String> {
    let config = PipelineConfig::default();
    config.validate().map_err(|e| e.to_string())?;
    let model = WorkerModel::spawn(MODEL_WORKER_JS).map_err(|e| e.to_string())?;
    Ok(Rc::new(Session::new(
        config,
        model.clone(),
        model,
        GlooTimer,
        Rc::new(LocalStorageStore::<Vec<AnalysisSnapshot>>::new(HISTORY_KEY)),
        Rc::new(LocalStorageStore::<Option<WizardDraft>>::new(DRAFT_KEY)),
    )))
}

/// Root application component.
fn app() -> Element {
    let session = use_hook(start_session);

    rsx! {
        style { dangerous_inner_html: include_str!("../assets/main.css") }

        div { class: "app",
            header {
                h1 { "mien" }
                p { class: "muted", "Guided facial analysis" }
            }
            main {
                match session {
                    Ok(session) => rsx! { WizardScreen { session } },
                    Err(message) => rsx! {
                        div { class: "error-box",
                            p { "Could not start the analysis models: {message}" }
                        }
                    },
                }
            }
        }
    }
}

/// Signals shared by every action handler.
#[derive(Clone, Copy)]
struct Ui {
    /// Bumped after every wizard change to trigger a re-render.
    revision: Signal<u64>,
    /// Calibration edits made on the current preview.
    edits: Signal<CalibrationEdits>,
    /// Landmark picked for the next move.
    selected: Signal<Option<(View, LandmarkId)>>,
    /// Trend window on the results step.
    range: Signal<TimeRange>,
}

impl Ui {
    fn refresh(mut self) {
        self.revision += 1;
    }

    fn clear_edits(mut self) {
        self.edits.set(CalibrationEdits::new());
        self.selected.set(None);
    }
}

/// Record the outcome of a wizard action and spawn its effect.
///
/// Refusals are already rendered from the wizard's inline error.
fn dispatch(session: &Rc<AppSession>, ui: Ui, outcome: Result<Option<Effect>, StepError>) {
    ui.refresh();
    match outcome {
        Ok(Some(effect)) => {
            if matches!(effect, Effect::PreparePreview { .. }) {
                ui.clear_edits();
            }
            let session = Rc::clone(session);
            spawn(async move {
                session.run(effect).await;
                ui.refresh();
            });
        }
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "action refused"),
    }
}

/// Click handler running `action` against the session.
fn on_click<F>(session: &Rc<AppSession>, ui: Ui, action: F) -> impl FnMut(MouseEvent) + 'static
where
    F: Fn(&AppSession) -> Result<Option<Effect>, StepError> + 'static,
{
    let session = Rc::clone(session);
    move |_| dispatch(&session, ui, action(&session))
}

#[derive(Props, Clone)]
struct WizardScreenProps {
    session: Rc<AppSession>,
}

impl PartialEq for WizardScreenProps {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.session, &other.session)
    }
}

/// The analysis wizard: status header, current step, and navigation.
#[component]
fn WizardScreen(props: WizardScreenProps) -> Element {
    let session = props.session;
    let ui = Ui {
        revision: use_signal(|| 0),
        edits: use_signal(CalibrationEdits::new),
        selected: use_signal(|| None),
        range: use_signal(TimeRange::default),
    };

    // Saved analyses can change the trend panel from any step.
    use_future({
        let session = Rc::clone(&session);
        move || {
            let mut updates = session.history_updates();
            async move {
                while updates.next().await.is_some() {
                    ui.refresh();
                }
            }
        }
    });

    let _ = (ui.revision)();
    let view = session.view();

    let body = match view.step {
        Step::Gender => gender_step(&session, ui),
        Step::Ethnicity => ethnicity_step(&session, ui),
        Step::Consent => consent_step(&session, ui),
        Step::Calibration => calibration_step(&session, ui),
        Step::Processing => processing_step(&session, ui, &view),
        Step::Complete => complete_step(&session, ui),
    };
    let continues = matches!(view.step, Step::Gender | Step::Ethnicity | Step::Consent);

    rsx! {
        StepStatus { view: view.clone() }
        section { class: "step", {body} }
        nav { class: "actions",
            if view.can_go_back {
                button {
                    class: "button secondary",
                    onclick: on_click(&session, ui, |s| s.on_back().map(|()| None)),
                    "Back"
                }
            }
            if continues {
                button {
                    class: "button",
                    disabled: view.loading,
                    onclick: on_click(&session, ui, AppSession::on_continue),
                    "Continue"
                }
            }
        }
    }
}

fn gender_step(session: &Rc<AppSession>, ui: Ui) -> Element {
    let current = session.inspect(mien_pipeline::Wizard::gender);
    rsx! {
        p { "Scores are compared against norms for the gender you select." }
        div { class: "choices",
            for (gender, label) in [(Gender::Female, "Female"), (Gender::Male, "Male")] {
                button {
                    key: "{gender}",
                    class: if current == Some(gender) { "button selected" } else { "button" },
                    onclick: on_click(session, ui, move |s| {
                        s.update(|w| w.select_gender(gender)).map(|()| None)
                    }),
                    "{label}"
                }
            }
        }
    }
}

fn ethnicity_step(session: &Rc<AppSession>, ui: Ui) -> Element {
    let current = session.inspect(|w| w.ethnicity().map(str::to_owned));
    let on_change = {
        let session = Rc::clone(session);
        move |evt: FormEvent| {
            let outcome = session.update(|w| w.select_ethnicity(evt.value()));
            dispatch(&session, ui, outcome.map(|()| None));
        }
    };
    rsx! {
        label { r#for: "ethnicity", "Ethnicity" }
        select { id: "ethnicity", onchange: on_change,
            option { value: "", disabled: true, selected: current.is_none(), "Select…" }
            for (key, label) in ETHNICITIES.iter().copied() {
                option {
                    key: "{key}",
                    value: key,
                    selected: current.as_deref() == Some(key),
                    "{label}"
                }
            }
        }
    }
}

fn consent_step(session: &Rc<AppSession>, ui: Ui) -> Element {
    let (front, side, consent) = session.inspect(|w| {
        (
            w.photo(View::Front).clone(),
            w.photo(View::Side).clone(),
            w.consent(),
        )
    });
    let upload = |view: View| {
        let session = Rc::clone(session);
        move |bytes: Vec<u8>| {
            let session = Rc::clone(&session);
            spawn(async move {
                if let Err(e) = session.upload(view, bytes).await {
                    tracing::debug!(error = %e, "upload refused");
                }
                ui.refresh();
            });
        }
    };
    let on_consent = {
        let session = Rc::clone(session);
        move |evt: FormEvent| {
            let outcome = session.update(|w| w.set_consent(evt.checked()));
            dispatch(&session, ui, outcome.map(|()| None));
        }
    };

    rsx! {
        div { class: "photos",
            PhotoUpload { view: View::Front, state: front, on_upload: upload(View::Front) }
            PhotoUpload { view: View::Side, state: side, on_upload: upload(View::Side) }
        }
        label { class: "consent",
            input { r#type: "checkbox", checked: consent, onchange: on_consent }
            "I agree to have these photos analysed. They stay on this device."
        }
    }
}

fn calibration_step(session: &Rc<AppSession>, ui: Ui) -> Element {
    let (preview, previous, profile) = session.inspect(|w| {
        (
            w.preview().clone(),
            w.calibration().cloned(),
            w.profile(),
        )
    });

    let preview = match preview {
        PreviewState::Idle | PreviewState::Loading => return rsx! {},
        PreviewState::Failed { .. } => {
            return rsx! {
                button {
                    class: "button",
                    onclick: on_click(session, ui, |s| s.retry_preview().map(Some)),
                    "Retry detection"
                }
            };
        }
        PreviewState::Ready(preview) => preview,
    };
    let Some(profile) = profile else {
        return rsx! {};
    };

    let merged = calibration::merge(previous.as_ref(), &preview, &ui.edits.read(), &profile);
    let merged = match merged {
        Ok(merged) => merged,
        Err(e) => {
            return rsx! {
                div { class: "error-box", p { "Edit rejected: {e}" } }
                button {
                    class: "button secondary",
                    onclick: move |_| ui.clear_edits(),
                    "Discard edits"
                }
            };
        }
    };
    let selected = (ui.selected)();
    let canvases: Vec<_> = View::ALL
        .into_iter()
        .filter_map(|view| match session.inspect(|w| w.photo(view).clone()) {
            PhotoState::Ready(image) => Some((view, image, merged.points(view).to_vec())),
            _ => None,
        })
        .collect();

    rsx! {
        p { "Click a landmark, then click where it belongs. Click empty space to add one." }
        div { class: "canvases",
            for (view, image, points) in canvases {
                div { key: "{view}",
                    h3 { "{view.label()}" }
                    LandmarkCanvas {
                        image,
                        points,
                        selected: selected.filter(|(v, _)| *v == view).map(|(_, id)| id),
                        on_select: move |id| {
                            let mut selected = ui.selected;
                            selected.set(Some((view, id)));
                        },
                        on_place: move |(x, y)| {
                            let (mut edits, mut selected) = (ui.edits, ui.selected);
                            let edit = match selected() {
                                Some((v, id)) if v == view => PointEdit::Move { id, x, y },
                                _ => PointEdit::Add { x, y, name: None },
                            };
                            edits.write().push(view, edit);
                            selected.set(None);
                        },
                    }
                }
            }
        }
        div { class: "actions",
            if selected.is_some() {
                button {
                    class: "button secondary",
                    onclick: move |_| {
                        let (mut edits, mut selected) = (ui.edits, ui.selected);
                        if let Some((view, id)) = selected() {
                            edits.write().push(view, PointEdit::Reset { id });
                        }
                        selected.set(None);
                    },
                    "Reset landmark"
                }
            }
            if !ui.edits.read().is_empty() {
                button {
                    class: "button secondary",
                    onclick: move |_| ui.clear_edits(),
                    "Undo all edits"
                }
            }
            button {
                class: "button",
                onclick: on_click(session, ui, move |s| {
                    let outcome = s.on_complete(&ui.edits.peek()).map(Some);
                    if outcome.is_ok() {
                        ui.clear_edits();
                    }
                    outcome
                }),
                "Looks good"
            }
        }
    }
}

fn processing_step(session: &Rc<AppSession>, ui: Ui, view: &WizardView) -> Element {
    rsx! {
        StageList { stages: view.stages.clone() }
        div { class: "actions",
            if view.loading {
                button {
                    class: "button secondary",
                    onclick: on_click(session, ui, |s| {
                        s.abort_processing();
                        Ok(None)
                    }),
                    "Cancel"
                }
            }
            if view.can_retry {
                button {
                    class: "button",
                    onclick: on_click(session, ui, |s| s.retry_processing().map(Some)),
                    "Retry"
                }
            }
        }
    }
}

fn complete_step(session: &Rc<AppSession>, ui: Ui) -> Element {
    let mut range = ui.range;
    let score = session
        .inspect(|w| w.snapshot().map(|s| s.overall))
        .map(|overall| format!("{overall:.0} / 100"));
    let model = session.analytics(range());

    rsx! {
        if let Some(score) = score {
            p { class: "score", "{score}" }
        }
        TrendPanel {
            model,
            range: range(),
            on_range: move |r| range.set(r),
        }
        button {
            class: "button",
            onclick: on_click(session, ui, |s| {
                s.reset();
                Ok(None)
            }),
            "Start a new analysis"
        }
    }
}
