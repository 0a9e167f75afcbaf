//! Observable snapshot of a query.

use std::time::SystemTime;

use serde_json::Value;

use crate::error::QueryError;

/// Lifecycle status of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// Built with `enabled = false`; no fetch has been attempted.
    Idle,
    /// A first fetch is outstanding (no data yet).
    Loading,
    /// The last completed fetch succeeded.
    Success,
    /// Retries are exhausted; the last attempt failed.
    Error,
}

impl QueryStatus {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        }
    }
}

/// Point-in-time snapshot of a query's observable state.
///
/// Snapshots are what observers receive on every update; reading one never
/// blocks a fetch.
#[derive(Clone, Debug)]
pub struct QueryState {
    /// Lifecycle status.
    pub status: QueryStatus,
    /// Last successfully fetched (or seeded) data.
    pub data: Option<Value>,
    /// Error of the last settle, if it failed.
    pub error: Option<QueryError>,
    /// Consecutive failures in the current fetch cycle; resets to 0 on success.
    pub failure_count: u32,
    /// Whether the cached data should be refetched on the next opportunity.
    pub is_stale: bool,
    /// Whether a fetch is outstanding right now (independent of `status`:
    /// a background refetch keeps `status = Success`).
    pub is_fetching: bool,
    /// Wall-clock time of the last successful settle.
    pub updated_at: Option<SystemTime>,
}

impl QueryState {
    /// Initial state for an enabled query with no seed data.
    ///
    /// Having nothing cached counts as stale, so the first subscriber
    /// triggers a fetch.
    pub(crate) fn loading() -> Self {
        Self {
            status: QueryStatus::Loading,
            data: None,
            error: None,
            failure_count: 0,
            is_stale: true,
            is_fetching: false,
            updated_at: None,
        }
    }

    /// Initial state for a disabled query.
    pub(crate) fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            ..Self::loading()
        }
    }

    /// Initial state for a query seeded with data.
    pub(crate) fn seeded(data: Value) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            failure_count: 0,
            is_stale: false,
            is_fetching: false,
            updated_at: Some(SystemTime::now()),
        }
    }
}
