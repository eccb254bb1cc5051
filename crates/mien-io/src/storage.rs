//! [`Store`] backed by `window.localStorage`.
//!
//! Values are stored as JSON under a fixed key. A missing, unreadable or
//! unparseable entry loads as `T::default()`; storage failures on save
//! are logged and otherwise ignored, so a full or disabled storage
//! never breaks the wizard.

use std::cell::RefCell;

use futures::channel::mpsc::{self, UnboundedSender};
use mien_pipeline::{Store, Subscription};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A JSON value persisted under one `localStorage` key.
pub struct LocalStorageStore<T> {
    key: String,
    subscribers: RefCell<Vec<UnboundedSender<T>>>,
}

impl<T> LocalStorageStore<T> {
    /// A store reading and writing `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

impl<T> Store<T> for LocalStorageStore<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    fn load(&self) -> T {
        let Some(json) = local_storage().and_then(|s| s.get_item(&self.key).ok().flatten()) else {
            return T::default();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            tracing::warn!(key = %self.key, error = %e, "discarding unreadable stored value");
            T::default()
        })
    }

    fn save(&self, value: T) {
        match serde_json::to_string(&value) {
            Ok(json) => match local_storage() {
                Some(storage) => {
                    if let Err(e) = storage.set_item(&self.key, &json) {
                        tracing::warn!(key = %self.key, error = ?e, "localStorage write failed");
                    }
                }
                None => tracing::warn!(key = %self.key, "localStorage unavailable"),
            },
            Err(e) => tracing::warn!(key = %self.key, error = %e, "failed to serialize value"),
        }
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.unbounded_send(value.clone()).is_ok());
    }

    fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(sender);
        Subscription::new(receiver)
    }
}
