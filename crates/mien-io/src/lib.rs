//! mien-io: Browser I/O and Dioxus component library.
//!
//! Provides the browser-side collaborators the pipeline core expects
//! (a `gloo-timers` [`Timer`](mien_pipeline::Timer), a `localStorage`
//! [`Store`](mien_pipeline::Store), and a web worker bridge to the
//! landmark and scoring models), console logging, and reusable UI
//! components for the mien web application.

pub mod components;
pub mod logging;
pub mod model;
pub mod storage;
pub mod timer;

pub use components::{LandmarkCanvas, PhotoUpload, StageList, StepStatus, TrendPanel};
pub use model::{ModelError, WorkerModel};
pub use storage::LocalStorageStore;
pub use timer::GlooTimer;
