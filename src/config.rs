//! # Per-query configuration.
//!
//! [`QueryConfig`] bundles every knob that shapes a query's behavior. It is
//! resolved in three layers, highest priority first:
//!
//! 1. **Per-call** overrides passed to `build_query`/`prefetch_query`
//! 2. **Cache defaults** supplied to [`QueryCache::with_defaults`](crate::QueryCache::with_defaults)
//! 3. **Library defaults** ([`QueryConfig::default`])
//!
//! A config is built by inheriting a defaults layer and overriding fields
//! with the `with_*` builders:
//!
//! ```rust
//! use std::time::Duration;
//! use requery::{QueryConfig, RetryPolicy};
//!
//! let cfg = QueryConfig::default()
//!     .with_retry(RetryPolicy::Limit(1))
//!     .with_stale_time(Some(Duration::ZERO));
//! ```
//!
//! ## Finite/disabled semantics
//! - `stale_time`: `Some(d)` marks data stale `d` after a successful settle
//!   (`Some(ZERO)` on the immediate next tick); `None` never marks stale.
//! - `cache_time`: `Some(d)` garbage-collects a data-bearing query `d` after
//!   its last unsubscribe; `None` retains it indefinitely.
//! - `refetch_interval`: `Some(d)` refetches every `d` while subscribed;
//!   `None` disables periodic refetching.
//!
//! The query holds a *current config* cell that is replaced on every rebuild;
//! retry decisions, timers, and result hooks read it at fire time rather than
//! capturing it by value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::QueryError;
use crate::policies::{RetryDelay, RetryPolicy};

/// Result hook invoked with the fetched data after a successful settle.
pub type SuccessHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// Result hook invoked with the final error after retries are exhausted.
pub type ErrorHook = Arc<dyn Fn(&QueryError) + Send + Sync>;

/// Result hook invoked after every settle, success or error.
pub type SettledHook = Arc<dyn Fn(Option<&Value>, Option<&QueryError>) + Send + Sync>;

/// Seed data for a query: a plain value or a closure producing one.
#[derive(Clone)]
pub enum InitialData {
    /// A ready value, stored as-is (falsy values such as `0` count).
    Value(Value),
    /// A closure evaluated once when the query is first built.
    Compute(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl InitialData {
    /// Builds the closure form.
    pub fn compute<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        InitialData::Compute(Arc::new(f))
    }

    pub(crate) fn resolve(&self) -> Value {
        match self {
            InitialData::Value(v) => v.clone(),
            InitialData::Compute(f) => f(),
        }
    }
}

impl From<Value> for InitialData {
    fn from(value: Value) -> Self {
        InitialData::Value(value)
    }
}

impl fmt::Debug for InitialData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitialData::Value(v) => f.debug_tuple("Value").field(v).finish(),
            InitialData::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// Configuration for a single query.
///
/// All fields are public for flexibility; prefer the `with_*` builders so a
/// config reads as a diff against its defaults layer.
#[derive(Clone)]
pub struct QueryConfig {
    /// `false` starts the query idle and suppresses every automatic fetch.
    pub enabled: bool,

    /// Whether a failed fetch is retried.
    pub retry: RetryPolicy,

    /// Delay before each retry attempt.
    pub retry_delay: RetryDelay,

    /// Time after a successful settle before the data counts as stale.
    ///
    /// `None` disables staleness; only an explicit invalidate marks the data
    /// stale then.
    pub stale_time: Option<Duration>,

    /// Garbage-collection delay after the last unsubscribe for a data-bearing
    /// query. `None` retains the entry indefinitely.
    pub cache_time: Option<Duration>,

    /// Periodic refetch interval while the query has subscribers.
    ///
    /// Individual subscribers may request a smaller one; the query ticks at
    /// the smallest interval in effect.
    pub refetch_interval: Option<Duration>,

    /// Allow interval refetches while the visibility gate reports hidden.
    pub refetch_interval_in_background: bool,

    /// Seeds `data` and a `Success` status before any fetch.
    pub initial_data: Option<InitialData>,

    /// Suppresses the automatic "refetch if stale" on subscribe/focus.
    pub manual: bool,

    /// Carried for binding layers that implement suspense semantics; the
    /// cache itself ignores it.
    pub suspense: bool,

    /// Invoked with the data after each successful settle.
    pub on_success: Option<SuccessHook>,

    /// Invoked with the error after retries are exhausted.
    pub on_error: Option<ErrorHook>,

    /// Invoked after every settle.
    pub on_settled: Option<SettledHook>,
}

/// Library default garbage-collection delay (five minutes).
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(300);

impl Default for QueryConfig {
    /// Library defaults:
    ///
    /// - `enabled = true`
    /// - `retry = RetryPolicy::Limit(3)`
    /// - `retry_delay` = capped exponential backoff (1s × 2ⁿ, max 30s)
    /// - `stale_time = Some(0)` (stale on the tick after each settle)
    /// - `cache_time = Some(300s)`
    /// - no interval refetch, no initial data, automatic fetching on
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RetryPolicy::default(),
            retry_delay: RetryDelay::default(),
            stale_time: Some(Duration::ZERO),
            cache_time: Some(DEFAULT_CACHE_TIME),
            refetch_interval: None,
            refetch_interval_in_background: false,
            initial_data: None,
            manual: false,
            suspense: false,
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

impl QueryConfig {
    /// Starts a config from an existing defaults layer.
    ///
    /// Equivalent to cloning; exists to make call sites read as
    /// "defaults, then overrides".
    pub fn with_defaults(defaults: &QueryConfig) -> Self {
        defaults.clone()
    }

    /// Sets whether the query fetches automatically.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the retry delay policy.
    pub fn with_retry_delay(mut self, delay: RetryDelay) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the time-to-stale (`None` disables staleness).
    pub fn with_stale_time(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Sets the garbage-collection delay (`None` retains indefinitely).
    pub fn with_cache_time(mut self, cache_time: Option<Duration>) -> Self {
        self.cache_time = cache_time;
        self
    }

    /// Sets the periodic refetch interval.
    pub fn with_refetch_interval(mut self, interval: Option<Duration>) -> Self {
        self.refetch_interval = interval;
        self
    }

    /// Allows interval refetches while hidden.
    pub fn with_refetch_interval_in_background(mut self, allow: bool) -> Self {
        self.refetch_interval_in_background = allow;
        self
    }

    /// Seeds the query with initial data.
    pub fn with_initial_data(mut self, data: impl Into<InitialData>) -> Self {
        self.initial_data = Some(data.into());
        self
    }

    /// Suppresses automatic refetch-if-stale on subscribe/focus.
    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    /// Marks the config for suspense-aware bindings.
    pub fn with_suspense(mut self, suspense: bool) -> Self {
        self.suspense = suspense;
        self
    }

    /// Registers a success hook.
    pub fn with_on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Registers an error hook.
    pub fn with_on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&QueryError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Registers a settled hook.
    pub fn with_on_settled<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, Option<&QueryError>) + Send + Sync + 'static,
    {
        self.on_settled = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("enabled", &self.enabled)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("stale_time", &self.stale_time)
            .field("cache_time", &self.cache_time)
            .field("refetch_interval", &self.refetch_interval)
            .field(
                "refetch_interval_in_background",
                &self.refetch_interval_in_background,
            )
            .field("initial_data", &self.initial_data)
            .field("manual", &self.manual)
            .field("suspense", &self.suspense)
            .finish_non_exhaustive()
    }
}
