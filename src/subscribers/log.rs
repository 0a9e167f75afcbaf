//! # Simple logging observer for debugging and demos.
//!
//! [`LogObserver`] prints query lifecycle notifications to stdout in a
//! human-readable format. This is primarily useful for development,
//! debugging, and examples.
//!
//! ## Output format
//! ```text
//! [state] status=loading fetching=true stale=true failures=0
//! [success] data="todos"
//! [error] err="connection refused"
//! [settled] ok=false
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QueryError;
use crate::query::QueryState;
use crate::subscribers::Observe;

/// Simple stdout logging observer.
///
/// Enabled via the `logging` feature. Not intended for production use —
/// implement a custom [`Observe`] for structured logging or metrics.
pub struct LogObserver;

#[async_trait]
impl Observe for LogObserver {
    async fn on_state_update(&self, state: &QueryState) {
        println!(
            "[state] status={} fetching={} stale={} failures={}",
            state.status.as_label(),
            state.is_fetching,
            state.is_stale,
            state.failure_count,
        );
    }

    async fn on_success(&self, data: &Value) {
        println!("[success] data={data}");
    }

    async fn on_error(&self, error: &QueryError) {
        println!("[error] err={error:?}");
    }

    async fn on_settled(&self, _data: Option<&Value>, error: Option<&QueryError>) {
        println!("[settled] ok={}", error.is_none());
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
