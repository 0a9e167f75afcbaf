//! # Visibility gate.
//!
//! The cache never detects visibility itself; the embedding application (a UI
//! binding, a window-focus listener, a test) drives a [`VisibilityGate`] and
//! the cache reads it:
//!
//! - a retry whose delay has elapsed while the gate reports hidden is
//!   **deferred**, not abandoned, and resumes the moment the gate flips
//!   visible;
//! - interval refetches tick only while visible, unless
//!   `refetch_interval_in_background` is set.
//!
//! ## Rules
//! - `set_visible(true)` is the "focus regained" event: every deferred retry
//!   wakes immediately.
//! - The gate is shared by all queries of one cache; it carries no
//!   per-query state.

use tokio::sync::watch;

/// Externally driven boolean visibility signal.
///
/// Backed by a [`watch`] channel so any number of fetch tasks can wait for
/// the next flip to visible without polling.
#[derive(Debug)]
pub struct VisibilityGate {
    tx: watch::Sender<bool>,
}

impl VisibilityGate {
    /// Creates a gate with the given initial state.
    pub fn new(visible: bool) -> Self {
        let (tx, _rx) = watch::channel(visible);
        Self { tx }
    }

    /// Current state of the signal.
    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the signal; flipping to visible wakes every waiter.
    pub fn set_visible(&self, visible: bool) {
        self.tx.send_replace(visible);
    }

    /// Resolves immediately when visible, otherwise waits for the next flip.
    pub async fn wait_visible(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for VisibilityGate {
    /// Visible until told otherwise.
    fn default() -> Self {
        Self::new(true)
    }
}
