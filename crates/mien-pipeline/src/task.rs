//! Cancellation-aware future combinators.
//!
//! The wizard runs on a single-threaded executor (the browser event
//! loop), so "concurrent" work here means interleaved futures, not
//! parallel threads. These combinators hold no shared state and can be
//! used from any step at the same time.
//!
//! Timeouts only stop the caller from *waiting*: the wrapped future is
//! dropped, but any work it already handed off (a detector request, a
//! worker job) keeps running. Callers must not assume cleanup on timeout.
//!
//! Cancellation is cooperative: a [`CancellationToken`] is checked at
//! each suspension point. Runtime-specific timers are injected through
//! the [`Timer`] trait so the same code runs under `gloo-timers` in the
//! browser and under tokio in tests.

use std::future::Future;
use std::pin::pin;
use std::task::Poll;
use std::time::Duration;

use futures::future::{self, Either};
use tokio_util::sync::CancellationToken;

/// Source of sleep futures for the current runtime.
pub trait Timer {
    /// A future that resolves once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Failure modes added by the combinators in this module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The deadline elapsed before the task produced a result.
    #[error("{label} timed out after {} ms", .after.as_millis())]
    Timeout {
        /// What was being waited on.
        label: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// The user cancelled the operation.
    ///
    /// Not an error to report: callers drop it silently.
    #[error("operation aborted")]
    Aborted,
}

impl TaskError {
    /// Whether this is a user-initiated cancellation.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Give control back to the executor once before continuing.
///
/// Wraps synchronous work so a cancellation or deadline that lands in the
/// meantime is seen before the work starts.
pub async fn yield_now() {
    let mut yielded = false;
    future::poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await;
}

/// Race `task` against a timer of length `timeout`.
///
/// # Errors
///
/// Returns [`TaskError::Timeout`] carrying `label` if the timer fires
/// first. The task's eventual result is discarded.
#[allow(clippy::future_not_send)]
pub async fn with_timeout<F, T>(
    task: F,
    timer: &T,
    timeout: Duration,
    label: &str,
) -> Result<F::Output, TaskError>
where
    F: Future,
    T: Timer + ?Sized,
{
    let task = pin!(task);
    let deadline = pin!(timer.sleep(timeout));
    match future::select(task, deadline).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(TaskError::Timeout {
            label: label.to_owned(),
            after: timeout,
        }),
    }
}

/// Resolve with `task` unless `token` is cancelled first.
///
/// An already-cancelled token fails immediately without polling `task`,
/// so none of its side effects are observed. The cancellation listener
/// is dropped on every exit path.
///
/// # Errors
///
/// Returns [`TaskError::Aborted`] if the token is or becomes cancelled
/// before the task finishes.
#[allow(clippy::future_not_send)]
pub async fn with_abort<F>(task: F, token: &CancellationToken) -> Result<F::Output, TaskError>
where
    F: Future,
{
    if token.is_cancelled() {
        return Err(TaskError::Aborted);
    }
    let cancelled = pin!(token.cancelled());
    let task = pin!(task);
    // The cancellation branch is polled first, so an abort that lands in
    // the same wake-up as the task's completion wins.
    match future::select(cancelled, task).await {
        Either::Left(((), _)) => Err(TaskError::Aborted),
        Either::Right((output, _)) => Ok(output),
    }
}

/// [`with_timeout`] wrapped in [`with_abort`]; abort wins if both fire.
///
/// # Errors
///
/// Returns [`TaskError::Aborted`] on cancellation, otherwise
/// [`TaskError::Timeout`] when the deadline elapses.
#[allow(clippy::future_not_send)]
pub async fn with_abort_and_timeout<F, T>(
    task: F,
    token: &CancellationToken,
    timer: &T,
    timeout: Duration,
    label: &str,
) -> Result<F::Output, TaskError>
where
    F: Future,
    T: Timer + ?Sized,
{
    with_abort(with_timeout(task, timer, timeout, label), token).await?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::test_support::TokioTimer;

    #[tokio::test(start_paused = true)]
    async fn fast_task_beats_timer() {
        let result = with_timeout(async { 7 }, &TokioTimer, Duration::from_millis(100), "fast").await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_task_times_out_with_label() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "late"
        };
        let result = with_timeout(slow, &TokioTimer, Duration::from_millis(100), "front detection").await;
        match result {
            Err(TaskError::Timeout { label, after }) => {
                assert_eq!(label, "front detection");
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_token_never_polls_task() {
        let polled = Cell::new(false);
        let token = CancellationToken::new();
        token.cancel();

        let task = async {
            polled.set(true);
            1
        };
        let result = with_abort(task, &token).await;

        assert_eq!(result, Err(TaskError::Aborted));
        assert!(!polled.get(), "task side effects must not run");
    }

    #[tokio::test(start_paused = true)]
    async fn abort_interrupts_pending_task() {
        let token = CancellationToken::new();
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        };
        let (result, ()) = futures::join!(
            with_abort(future::pending::<u8>(), &token),
            canceller
        );
        assert_eq!(result, Err(TaskError::Aborted));
    }

    #[tokio::test]
    async fn live_token_passes_result_through() {
        let token = CancellationToken::new();
        let result = with_abort(async { "done" }, &token).await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_takes_precedence_over_timeout() {
        let token = CancellationToken::new();
        token.cancel();
        let result = with_abort_and_timeout(
            future::pending::<()>(),
            &token,
            &TokioTimer,
            Duration::ZERO,
            "preview",
        )
        .await;
        assert_eq!(result, Err(TaskError::Aborted));
    }

    #[tokio::test(start_paused = true)]
    async fn composed_guard_reports_timeout() {
        let token = CancellationToken::new();
        let result = with_abort_and_timeout(
            future::pending::<()>(),
            &token,
            &TokioTimer,
            Duration::from_millis(50),
            "preview",
        )
        .await;
        assert!(matches!(result, Err(TaskError::Timeout { .. })));
        assert!(!result.unwrap_err().is_abort());
    }
}
