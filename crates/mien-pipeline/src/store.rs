//! Injected persistence with change notification.
//!
//! Settings, drafts and report history live behind [`Store`] so the
//! wizard never touches ambient browser storage. [`MemoryStore`] backs
//! tests and the native CLI; a browser build plugs in its own
//! implementation with the same contract.

use std::cell::RefCell;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::types::AnalysisSnapshot;

/// A single persisted value with change notification.
pub trait Store<T> {
    /// Current value.
    fn load(&self) -> T;

    /// Replace the value and notify every live subscription.
    fn save(&self, value: T);

    /// Receive each value passed to [`save`](Self::save) from now on.
    fn subscribe(&self) -> Subscription<T>;
}

/// Read-only access to the saved analysis history, newest first.
pub trait SnapshotHistory {
    /// All saved snapshots, newest first.
    fn list_snapshots(&self) -> Vec<AnalysisSnapshot>;
}

impl<S> SnapshotHistory for S
where
    S: Store<Vec<AnalysisSnapshot>> + ?Sized,
{
    fn list_snapshots(&self) -> Vec<AnalysisSnapshot> {
        self.load()
    }
}

/// Stream of saved values. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wrap a channel receiver fed by a [`Store`] implementation.
    #[must_use]
    pub const fn new(receiver: UnboundedReceiver<T>) -> Self {
        Self { receiver }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// In-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<UnboundedSender<T>>>,
}

impl<T> MemoryStore<T> {
    /// A store holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            subscribers: RefCell::new(Vec::new()),
        }
    }
}

impl<T: Clone> Store<T> for MemoryStore<T> {
    fn load(&self) -> T {
        self.value.borrow().clone()
    }

    fn save(&self, value: T) {
        *self.value.borrow_mut() = value.clone();
        // Closed receivers are pruned here.
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
