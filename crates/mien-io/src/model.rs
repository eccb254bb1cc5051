//! Web worker bridge to the landmark and scoring models.
//!
//! [`WorkerModel`] wraps a `web_sys::Worker` running the model script
//! and implements both [`LandmarkDetector`] and [`Analyzer`] on top of
//! one JSON message protocol. Every request carries an `id` that the
//! worker echoes back:
//!
//! - `{ "id": 1, "kind": "detect", "view": "front", "image": ImageState }`
//!   answers with a `Detection`
//! - `{ "id": 2, "kind": "measure", "view": "side", "points": [..], "profile": {..} }`
//!   answers with a list of `Metric`s
//! - `{ "id": 3, "kind": "score", "metrics": [..], "profile": {..} }`
//!   answers with `Scores`
//!
//! Responses are `{ "id": n, "ok": <value> }` or `{ "id": n, "error": "..." }`.
//!
//! Requests are not cancelled in the worker. Dropping the future (on
//! abort or timeout) only forgets the request; a late response for it
//! is ignored.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use mien_pipeline::{
    AnalysisError, Analyzer, Detection, DetectionError, ImageState, LandmarkDetector,
    LandmarkPoint, Metric, Profile, Scores, View,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// A model request failed.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A browser API call returned an error.
    #[error("browser API error: {0}")]
    JsError(String),

    /// The worker crashed or was dropped before answering.
    #[error("model worker stopped: {0}")]
    Stopped(String),

    /// A message could not be encoded or decoded.
    #[error("malformed model message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The model itself reported a failure.
    #[error("{0}")]
    Model(String),
}

impl From<JsValue> for ModelError {
    fn from(value: JsValue) -> Self {
        Self::JsError(format!("{value:?}"))
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Request<'a> {
    Detect {
        view: View,
        image: &'a ImageState,
    },
    Measure {
        view: View,
        points: &'a [LandmarkPoint],
        profile: &'a Profile,
    },
    Score {
        metrics: &'a [Metric],
        profile: &'a Profile,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: Request<'a>,
}

#[derive(Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    ok: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

type Reply = Result<serde_json::Value, ModelError>;
type Pending = Rc<RefCell<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Handle to the model worker. Clones share one worker.
#[derive(Clone)]
pub struct WorkerModel {
    inner: Rc<Inner>,
}

struct Inner {
    worker: web_sys::Worker,
    next_id: Cell<u64>,
    pending: Pending,
    // Held so the callbacks outlive every request.
    _onmessage: Closure<dyn FnMut(web_sys::MessageEvent)>,
    _onerror: Closure<dyn FnMut(web_sys::ErrorEvent)>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.worker.terminate();
    }
}

/// Forgets a request when its future is dropped.
struct PendingGuard {
    pending: Pending,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.borrow_mut().remove(&self.id);
    }
}

impl WorkerModel {
    /// Start the model worker from embedded script source.
    ///
    /// The script is served from a Blob URL, so no extra static file is
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::JsError`] if the worker cannot be created
    /// (e.g. outside a browser).
    pub fn spawn(script: &str) -> Result<Self, ModelError> {
        let worker = create_worker(script)?;
        let pending: Pending = Rc::default();

        let onmessage = {
            let pending = Rc::clone(&pending);
            Closure::<dyn FnMut(web_sys::MessageEvent)>::new(move |event: web_sys::MessageEvent| {
                let Some(json) = event.data().as_string() else {
                    tracing::warn!("model worker sent a non-string message");
                    return;
                };
                let response = match serde_json::from_str::<Response>(&json) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::warn!(error = %e, "unreadable model response");
                        return;
                    }
                };
                let Some(sender) = pending.borrow_mut().remove(&response.id) else {
                    tracing::debug!(id = response.id, "response for a forgotten request");
                    return;
                };
                let reply = match (response.ok, response.error) {
                    (_, Some(message)) => Err(ModelError::Model(message)),
                    (value, None) => Ok(value.unwrap_or(serde_json::Value::Null)),
                };
                // The receiver may have been dropped since the lookup.
                let _ = sender.send(reply);
            })
        };

        let onerror = {
            let pending = Rc::clone(&pending);
            Closure::<dyn FnMut(web_sys::ErrorEvent)>::new(move |event: web_sys::ErrorEvent| {
                let message = event.message();
                tracing::error!(%message, "model worker failed");
                for (_, sender) in pending.borrow_mut().drain() {
                    let _ = sender.send(Err(ModelError::Stopped(message.clone())));
                }
            })
        };

        worker.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        worker.set_onerror(Some(onerror.as_ref().unchecked_ref()));

        Ok(Self {
            inner: Rc::new(Inner {
                worker,
                next_id: Cell::new(1),
                pending,
                _onmessage: onmessage,
                _onerror: onerror,
            }),
        })
    }

    #[allow(clippy::future_not_send)] // WASM is single-threaded; Send is not needed
    async fn call<R: DeserializeOwned>(&self, request: Request<'_>) -> Result<R, ModelError> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let json = serde_json::to_string(&Envelope { id, request })?;

        let (sender, receiver) = oneshot::channel();
        self.inner.pending.borrow_mut().insert(id, sender);
        let _guard = PendingGuard {
            pending: Rc::clone(&self.inner.pending),
            id,
        };
        self.inner
            .worker
            .post_message(&JsValue::from_str(&json))?;

        let value = receiver
            .await
            .map_err(|_| ModelError::Stopped("request was dropped".into()))??;
        Ok(serde_json::from_value(value)?)
    }
}

fn create_worker(script: &str) -> Result<web_sys::Worker, ModelError> {
    let parts = js_sys::Array::new();
    parts.push(&JsValue::from_str(script));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/javascript");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;
    let worker = web_sys::Worker::new(&url);
    // The worker has fetched its script once construction returns.
    web_sys::Url::revoke_object_url(&url).ok();
    Ok(worker?)
}

impl LandmarkDetector for WorkerModel {
    fn detect(
        &self,
        view: View,
        image: &ImageState,
    ) -> impl Future<Output = Result<Detection, DetectionError>> {
        async move {
            self.call(Request::Detect { view, image })
                .await
                .map_err(|e| DetectionError(e.to_string()))
        }
    }
}

impl Analyzer for WorkerModel {
    fn measure(
        &self,
        view: View,
        points: &[LandmarkPoint],
        profile: &Profile,
    ) -> impl Future<Output = Result<Vec<Metric>, AnalysisError>> {
        async move {
            self.call(Request::Measure {
                view,
                points,
                profile,
            })
            .await
            .map_err(|e| AnalysisError::Analyzer(e.to_string()))
        }
    }

    fn score(
        &self,
        metrics: &[Metric],
        profile: &Profile,
    ) -> impl Future<Output = Result<Scores, AnalysisError>> {
        async move {
            self.call(Request::Score { metrics, profile })
                .await
                .map_err(|e| AnalysisError::Analyzer(e.to_string()))
        }
    }
}
