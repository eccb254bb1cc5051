//! Dioxus UI components for mien.
//!
//! Provides the photo upload zone, landmark calibration canvas, step
//! status header, processing stage list, and the score trend panel.

mod landmark_canvas;
mod photo_upload;
mod stage_list;
mod step_status;
mod trend_panel;

pub use landmark_canvas::LandmarkCanvas;
pub use photo_upload::PhotoUpload;
pub use stage_list::StageList;
pub use step_status::StepStatus;
pub use trend_panel::TrendPanel;
