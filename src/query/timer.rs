//! Scoped timer handles.
//!
//! Every timer a query arms (stale, garbage collection, refetch interval) is
//! owned as a [`Timer`] value. Dropping or replacing the handle cancels the
//! underlying task, so each arm operation is paired with a guaranteed cancel
//! on whatever exit path makes it irrelevant. A leaked timer would show up as
//! phantom refetches; the ownership model makes that unrepresentable.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled action.
///
/// Cancellation is cooperative: a fire that already started runs to
/// completion, which is why fire actions re-validate their preconditions.
#[derive(Debug)]
pub(crate) struct Timer {
    cancel: CancellationToken,
    _join: JoinHandle<()>,
}

impl Timer {
    /// Arms a one-shot timer running `action` after `delay`.
    pub fn arm<Fut>(delay: Duration, action: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => action.await,
            }
        });
        Self {
            cancel,
            _join: join,
        }
    }

    /// Arms a repeating timer running `action()` every `period`.
    pub fn arm_periodic<F, Fut>(period: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => action().await,
                }
            }
        });
        Self {
            cancel,
            _join: join,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
