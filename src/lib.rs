//! # requery
//!
//! **requery** is an in-memory cache for the results of asynchronous
//! resource-fetching operations, keyed by a normalized identifier and shared
//! across arbitrarily many concurrent consumers.
//!
//! It solves three problems for any caller performing repeated async reads of
//! the same logical resource: duplicate concurrent work is coalesced into one
//! fetch per key, cached data is tracked for staleness so consumers know when
//! to refresh, and entries nobody observes anymore are garbage collected —
//! with transient failures retried on a configurable backoff that pauses
//! while the application is not visible.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   consumer   │   │   consumer   │   │   consumer   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  QueryCache (registry)                                            │
//! │  - canonical key → Query                                          │
//! │  - defaults layer (QueryConfig)                                   │
//! │  - VisibilityGate (externally driven)                             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Query     │   │    Query     │   │    Query     │
//!     │ (state       │   │ (state       │   │ (state       │
//!     │  machine +   │   │  machine +   │   │  machine +   │
//!     │  retry loop) │   │  retry loop) │   │  retry loop) │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ notifies          │                  │
//!      ▼                   ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ObserverSet per query: bounded queue + worker per observer       │
//! │  on_state_update / on_success / on_error / on_settled             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Query lifecycle
//! ```text
//! build ──► Idle | Loading | Success(seeded)
//!
//! fetch() {
//!   ├─► already in flight ─► join the shared handle (fetcher runs ONCE)
//!   └─► mark loading synchronously, then:
//!         attempt ─► Ok  ─► settle success ─► re-arm stale timer
//!                 ─► Err ─► failure_count += 1
//!                       ├─► retry denied ─► settle error
//!                       └─► sleep(delay) ─► wait visible ─► next attempt
//! }
//!
//! last unsubscribe ─► no data?   ─► removed immediately
//!                  ─► cache_time ─► GC timer ─► removed (unless resubscribed)
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                     |
//! |-----------------|---------------------------------------------------------|----------------------------------------|
//! | **Cache**       | Keyed registry: build, prefetch, invalidate, clear.     | [`QueryCache`]                         |
//! | **Queries**     | Per-key state machine with fetch dedup and timers.      | [`Query`], [`QueryState`]              |
//! | **Keys**        | Three key shapes, canonical normalization.              | [`KeySpec`], [`QuerySpec`], [`QueryKey`] |
//! | **Fetchers**    | Async reads as trait objects or plain closures.         | [`Fetch`], [`FetchFn`], [`FetchRef`]   |
//! | **Policies**    | Retry decisions and backoff curves.                     | [`RetryPolicy`], [`RetryDelay`], [`BackoffPolicy`] |
//! | **Observers**   | Subscribe to state/settlement notifications.            | [`Observe`], [`Subscription`]          |
//! | **Visibility**  | External focus signal gating retries and intervals.     | [`VisibilityGate`]                     |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogObserver` _(demo/reference only)_.
//!
//! All cache operations assume a running tokio runtime; timers and fetch
//! tasks are spawned onto it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use serde_json::Value;
//! use requery::{FetchFn, FetchRef, QueryCache, QueryConfig, RetryPolicy};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = QueryCache::new();
//!
//!     let todos: FetchRef = FetchFn::arc("todos", |_key: String, _vars: Value| async move {
//!         // call your transport here...
//!         Ok::<_, anyhow::Error>(Value::from(vec!["buy milk"]))
//!     });
//!
//!     let config = QueryConfig::with_defaults(cache.defaults())
//!         .with_retry(RetryPolicy::Limit(1))
//!         .with_stale_time(Some(Duration::from_secs(30)));
//!
//!     let query = cache.build_query("todos", Some(todos), Some(config))?;
//!     let data = query.fetch().await?;
//!     assert_eq!(data, Value::from(vec!["buy milk"]));
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod fetch;
mod key;
mod policies;
mod query;
mod subscribers;
mod visibility;

// ---- Public re-exports ----

pub use cache::QueryCache;
pub use config::{
    DEFAULT_CACHE_TIME, ErrorHook, InitialData, QueryConfig, SettledHook, SuccessHook,
};
pub use error::{BuildError, PrefetchError, QueryError};
pub use fetch::{BoxFetchFuture, Fetch, FetchFn, FetchRef};
pub use key::{KeySpec, QueryKey, QuerySpec};
pub use policies::{
    BackoffPolicy, JitterPolicy, RetryDelay, RetryDelayFn, RetryPolicy, RetryPredicate,
};
pub use query::{Query, QueryState, QueryStatus, SharedFetch, SubscribeOptions, Subscription};
pub use subscribers::Observe;
pub use visibility::VisibilityGate;

// Optional: expose a simple built-in logging observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogObserver;
