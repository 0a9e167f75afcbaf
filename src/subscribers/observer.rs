//! # Query observer trait.
//!
//! Provides [`Observe`], the extension point a binding layer implements to
//! react to a query's lifecycle.
//!
//! Each observer gets:
//! - **Dedicated worker task** (runs independently of the fetch path)
//! - **Per-observer bounded queue** (capacity via [`Observe::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged, other observers are
//!   unaffected)
//!
//! ## Delivery
//! ```text
//! settle / state change ──► [bounded queue] ──► worker task ──► observer callbacks
//!                                            └─► panic caught → warning logged
//! ```
//!
//! ## Rules
//! - `on_state_update` fires on **every** observable change (loading flips,
//!   failure count increments, staleness, settles).
//! - `on_success` / `on_error` fire once per settle, after retries resolved.
//! - `on_settled` fires once per settle, success or error.
//! - Notifications are processed sequentially (FIFO) per observer.
//! - A slow observer only delays its own queue; on overflow the notification
//!   is dropped for that observer alone.

use async_trait::async_trait;

use serde_json::Value;

use crate::error::QueryError;
use crate::query::QueryState;

/// Observer of one query's lifecycle.
///
/// All callbacks default to no-ops; implement the subset you care about.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Called with a fresh snapshot on every observable state change.
    async fn on_state_update(&self, state: &QueryState) {
        let _ = state;
    }

    /// Called with the fetched data after each successful settle.
    async fn on_success(&self, data: &Value) {
        let _ = data;
    }

    /// Called with the final error after retries are exhausted.
    async fn on_error(&self, error: &QueryError) {
        let _ = error;
    }

    /// Called after every settle, success or error.
    async fn on_settled(&self, data: Option<&Value>, error: Option<&QueryError>) {
        let _ = (data, error);
    }

    /// Returns the observer name used in logs when a queue overflows or a
    /// callback panics.
    ///
    /// Prefer short, descriptive names; the default uses `type_name::<Self>()`,
    /// which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this observer.
    ///
    /// On overflow the new notification is dropped for this observer only and
    /// a warning is logged. The runtime clamps capacity to a minimum of 1.
    ///
    /// Default: 64.
    fn queue_capacity(&self) -> usize {
        64
    }
}
