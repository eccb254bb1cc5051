//! Landmark calibration canvas for one photo.
//!
//! The photo is drawn at its prepared pixel size so click coordinates
//! map 1:1 onto landmark coordinates. Click a landmark to select it,
//! then click anywhere on the photo to move it there; with nothing
//! selected, a click adds a new landmark.

use dioxus::prelude::*;
use mien_pipeline::{ImageState, LandmarkId, LandmarkPoint};

/// Props for the [`LandmarkCanvas`] component.
#[derive(Props, Clone, PartialEq)]
pub struct LandmarkCanvasProps {
    /// Prepared photo.
    image: ImageState,
    /// Current (merged) landmark positions.
    points: Vec<LandmarkPoint>,
    /// Selected landmark, if any.
    selected: Option<LandmarkId>,
    /// Callback fired when a landmark is clicked.
    on_select: EventHandler<LandmarkId>,
    /// Callback fired with image coordinates when the photo is clicked.
    on_place: EventHandler<(f64, f64)>,
}

/// Photo with clickable landmark markers.
#[component]
pub fn LandmarkCanvas(props: LandmarkCanvasProps) -> Element {
    let (w, h) = (props.image.width, props.image.height);
    let radius = f64::from(w.max(h)) / 160.0 + 2.0;
    let on_select = props.on_select;
    let on_place = props.on_place;

    rsx! {
        div { class: "canvas",
            svg {
                xmlns: "http://www.w3.org/2000/svg",
                width: "{w}",
                height: "{h}",
                view_box: "0 0 {w} {h}",
                onclick: move |evt: MouseEvent| {
                    let at = evt.element_coordinates();
                    on_place.call((at.x, at.y));
                },

                image {
                    "href": "{props.image.data_url}",
                    width: "{w}",
                    height: "{h}",
                }
                for point in props.points.iter() {
                    circle {
                        key: "{point.id}",
                        cx: "{point.x}",
                        cy: "{point.y}",
                        r: "{radius}",
                        class: if props.selected == Some(point.id) { "landmark selected" } else { "landmark" },
                        "aria-label": "{marker_label(point)}",
                        onclick: {
                            let id = point.id;
                            move |evt: MouseEvent| {
                                evt.stop_propagation();
                                on_select.call(id);
                            }
                        },
                    }
                }
            }
        }
    }
}

fn marker_label(point: &LandmarkPoint) -> String {
    point
        .name
        .clone()
        .unwrap_or_else(|| format!("Landmark {}", point.id))
}
