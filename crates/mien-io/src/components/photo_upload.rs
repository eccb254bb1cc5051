//! Photo upload zone with drag-and-drop and file picker.

use dioxus::html::{FileData, HasFileData};
use dioxus::prelude::*;
use mien_pipeline::View;
use mien_pipeline::wizard::PhotoState;

/// Allowed file extensions for photo uploads.
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

fn has_allowed_extension(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ALLOWED_EXTENSIONS
            .iter()
            .any(|a| a.eq_ignore_ascii_case(ext))
    })
}

/// Props for the [`PhotoUpload`] component.
#[derive(Props, Clone, PartialEq)]
pub struct PhotoUploadProps {
    /// Which photo this zone collects.
    view: View,
    /// Current upload state, shown as a thumbnail or message.
    state: PhotoState,
    /// Called with the raw file bytes once a file is read.
    on_upload: EventHandler<Vec<u8>>,
}

/// A drag-and-drop zone with a file picker for one photo.
///
/// Accepts PNG, JPEG, BMP, and WebP images. Reading the file happens
/// here; downscaling and re-encoding are the session's job, so the
/// zone only reflects the [`PhotoState`] it is given.
#[component]
pub fn PhotoUpload(props: PhotoUploadProps) -> Element {
    let mut dragging = use_signal(|| false);
    let mut error = use_signal(|| Option::<String>::None);
    let label = props.view.label();

    let process_files = move |files: Vec<FileData>| async move {
        let Some(file) = files.first() else {
            return;
        };
        let name = file.name();
        if !has_allowed_extension(&name) {
            error.set(Some(format!("Unsupported file type: {name}")));
            return;
        }
        match file.read_bytes().await {
            Ok(bytes) => {
                error.set(None);
                props.on_upload.call(bytes.to_vec());
            }
            Err(e) => error.set(Some(format!("Failed to read file: {e}"))),
        }
    };

    let handle_files = move |evt: FormEvent| async move {
        process_files(evt.files()).await;
    };

    let handle_drop = move |evt: DragEvent| async move {
        evt.prevent_default();
        dragging.set(false);
        process_files(evt.files()).await;
    };

    let border_class = if dragging() { "upload dragging" } else { "upload" };

    rsx! {
        div {
            class: "{border_class}",
            ondragover: move |evt| {
                evt.prevent_default();
                dragging.set(true);
            },
            ondragleave: move |_| dragging.set(false),
            ondrop: handle_drop,

            h3 { "{label}" }

            match &props.state {
                PhotoState::Empty => rsx! {
                    p { class: "muted", "Drop a photo here or" }
                },
                PhotoState::Preparing => rsx! {
                    p { class: "muted pulse", "Preparing…" }
                },
                PhotoState::Ready(image) => rsx! {
                    img {
                        class: "thumbnail",
                        src: "{image.data_url}",
                        alt: "{label}",
                    }
                    p { class: "muted", "{image.width} × {image.height}" }
                },
                PhotoState::Failed(message) => rsx! {
                    p { class: "error", "{message}" }
                },
            }

            if let Some(ref err) = error() {
                p { class: "error", "{err}" }
            }

            label { class: "button",
                input {
                    r#type: "file",
                    accept: ".png,.jpg,.jpeg,.bmp,.webp",
                    class: "hidden",
                    onchange: handle_files,
                }
                if matches!(props.state, PhotoState::Ready(_)) { "Replace" } else { "Choose photo" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(has_allowed_extension("me.JPG"));
        assert!(has_allowed_extension("side.profile.webp"));
        assert!(!has_allowed_extension("notes.txt"));
        assert!(!has_allowed_extension("jpeg"));
    }
}
