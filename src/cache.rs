//! # Query cache: the keyed registry.
//!
//! A [`QueryCache`] owns the mapping from canonical key to [`Query`], the
//! default configuration layer, and the visibility gate shared by every
//! query.
//!
//! ## Architecture
//! ```text
//! consumer ──► build_query(key, fetcher, config)
//!                 ├─► normalize key (exhaustive match over the three shapes)
//!                 ├─► existing entry? ─► refresh fn/config, return same Arc
//!                 └─► else ─► Query::new ─► insert into registry
//!
//! registry ◄── Query::remove_from_registry (GC fire / orphan cleanup)
//!          ◄── remove_query / clear (explicit)
//! ```
//!
//! ## Rules
//! - Exactly one query exists per canonical key at any instant.
//! - Removal is idempotent; removing an absent key is a no-op.
//! - A removed key rebuilds from scratch on the next request; no residual
//!   state is carried over.
//! - The cache is cheap to clone (an `Arc`-backed handle); clones share the
//!   registry.
//!
//! Construct caches explicitly and pass them by reference. [`QueryCache::global`]
//! exists as an opt-in convenience for applications that want a process-wide
//! instance; the core logic never consults it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::config::QueryConfig;
use crate::error::{BuildError, PrefetchError};
use crate::fetch::FetchRef;
use crate::key::KeySpec;
use crate::query::Query;
use crate::visibility::VisibilityGate;

/// State shared between the cache handle and its queries.
pub(crate) struct CacheShared {
    pub(crate) queries: Mutex<HashMap<String, Arc<Query>>>,
    pub(crate) defaults: QueryConfig,
    pub(crate) visibility: VisibilityGate,
}

/// Registry of queries keyed by canonical key. See the module docs.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<CacheShared>,
}

impl QueryCache {
    /// Creates a cache with library-default configuration.
    pub fn new() -> Self {
        Self::with_defaults(QueryConfig::default())
    }

    /// Creates a cache whose defaults layer is `defaults`.
    ///
    /// Per-call configs still take precedence; queries built without one
    /// inherit these defaults.
    pub fn with_defaults(defaults: QueryConfig) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                queries: Mutex::new(HashMap::new()),
                defaults,
                visibility: VisibilityGate::default(),
            }),
        }
    }

    /// Lazily-constructed process-wide instance, as an opt-in convenience.
    pub fn global() -> &'static QueryCache {
        static GLOBAL: Lazy<QueryCache> = Lazy::new(QueryCache::new);
        &GLOBAL
    }

    /// The cache's default configuration layer.
    pub fn defaults(&self) -> &QueryConfig {
        &self.shared.defaults
    }

    /// The externally driven visibility signal shared by all queries.
    pub fn visibility(&self) -> &VisibilityGate {
        &self.shared.visibility
    }

    /// Updates the visibility signal (see [`VisibilityGate::set_visible`]).
    pub fn set_visible(&self, visible: bool) {
        self.shared.visibility.set_visible(visible);
    }

    /// The external "focus regained" event.
    ///
    /// Marks the app visible (resuming any deferred retries) and refetches
    /// every stale, enabled, non-manual query that currently has subscribers.
    pub fn notify_focus(&self) {
        self.shared.visibility.set_visible(true);
        for query in self.snapshot() {
            if query.observer_count() > 0 && query.should_auto_fetch() {
                drop(query.fetch());
            }
        }
    }

    /// Returns the query for `key`, building it if absent.
    ///
    /// An existing query keeps its state and `Arc` identity; its stored
    /// fetcher and config are replaced by this call's values so the *next*
    /// fetch or timer fire uses them. A new query starts `Success` when
    /// seeded with `initial_data`, `Idle` when disabled, `Loading` otherwise.
    pub fn build_query(
        &self,
        key: impl Into<KeySpec>,
        fetcher: Option<FetchRef>,
        config: Option<QueryConfig>,
    ) -> Result<Arc<Query>, BuildError> {
        let (key, fetcher, config) = key.into().into_parts(fetcher, config)?;
        let config = config.unwrap_or_else(|| self.shared.defaults.clone());

        let mut queries = self.shared.queries.lock().unwrap();
        if let Some(existing) = queries.get(key.canonical()) {
            existing.refresh(fetcher, config);
            return Ok(Arc::clone(existing));
        }

        let canonical = key.canonical().to_string();
        let query = Query::new(key, fetcher, config, Arc::downgrade(&self.shared));
        queries.insert(canonical, Arc::clone(&query));
        drop(queries);

        tracing::trace!(key = query.key().canonical(), "query created");
        Ok(query)
    }

    /// Looks a query up by its canonical key.
    pub fn get_query(&self, canonical_key: &str) -> Option<Arc<Query>> {
        self.shared
            .queries
            .lock()
            .unwrap()
            .get(canonical_key)
            .cloned()
    }

    /// Removes a query, cancelling its timers. No-op on absent keys.
    pub fn remove_query(&self, canonical_key: &str) {
        let removed = self.shared.queries.lock().unwrap().remove(canonical_key);
        if let Some(query) = removed {
            query.teardown();
            tracing::debug!(key = canonical_key, "query removed");
        }
    }

    /// Builds the query if absent and fetches it without a subscriber.
    ///
    /// After settling, if the query still has zero subscribers, the
    /// garbage-collection policy applies exactly as if a subscriber had just
    /// unsubscribed (a failed prefetch leaves no data and is removed
    /// immediately). Specification errors are produced before the first
    /// await.
    pub async fn prefetch_query(
        &self,
        key: impl Into<KeySpec>,
        fetcher: Option<FetchRef>,
        config: Option<QueryConfig>,
    ) -> Result<Value, PrefetchError> {
        let query = self.build_query(key, fetcher, config)?;
        let outcome = query.fetch().await;
        if query.observer_count() == 0 {
            query.schedule_gc();
        }
        outcome.map_err(PrefetchError::from)
    }

    /// Marks every matching query stale immediately.
    ///
    /// Pending stale timers are cleared; no fetch is forced — refetching is
    /// left to each query's own subscribe/focus rule. Returns the number of
    /// matches.
    pub fn invalidate_queries<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Query) -> bool,
    {
        let mut matched = 0;
        for query in self.snapshot() {
            if predicate(&query) {
                query.invalidate();
                matched += 1;
            }
        }
        matched
    }

    /// Removes every query, cancelling all timers.
    pub fn clear(&self) {
        let removed: Vec<Arc<Query>> = {
            let mut queries = self.shared.queries.lock().unwrap();
            queries.drain().map(|(_, query)| query).collect()
        };
        for query in &removed {
            query.teardown();
        }
        tracing::debug!(count = removed.len(), "cache cleared");
    }

    /// Number of live queries.
    pub fn len(&self) -> usize {
        self.shared.queries.lock().unwrap().len()
    }

    /// True when the registry holds no queries.
    pub fn is_empty(&self) -> bool {
        self.shared.queries.lock().unwrap().is_empty()
    }

    /// Clones the current entries out of the registry so callers can walk
    /// them without holding the lock.
    fn snapshot(&self) -> Vec<Arc<Query>> {
        self.shared.queries.lock().unwrap().values().cloned().collect()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchFn;
    use crate::key::QuerySpec;
    use crate::policies::{RetryDelay, RetryPolicy};
    use crate::query::{QueryStatus, SubscribeOptions};
    use crate::subscribers::Observe;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Silent;

    #[async_trait::async_trait]
    impl Observe for Silent {}

    fn value_fetcher(value: Value) -> (FetchRef, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: FetchRef = FetchFn::arc("value", move |_key: String, _vars: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            let value = value.clone();
            async move { Ok::<_, anyhow::Error>(value) }
        });
        (fetcher, calls)
    }

    fn failing_fetcher(message: &'static str) -> (FetchRef, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: FetchRef = FetchFn::arc("failing", move |_key: String, _vars: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(anyhow::anyhow!(message)) }
        });
        (fetcher, calls)
    }

    fn no_retry() -> QueryConfig {
        QueryConfig::default()
            .with_retry(RetryPolicy::Never)
            .with_retry_delay(RetryDelay::Fixed(Duration::from_millis(1)))
    }

    #[tokio::test(start_paused = true)]
    async fn one_query_per_canonical_key() {
        let cache = QueryCache::new();
        let (a, _) = value_fetcher(Value::from("a"));
        let (b, _) = value_fetcher(Value::from("b"));

        let first = cache.build_query("k", Some(a), None).unwrap();
        let second = cache.build_query("k", Some(b), None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rebuild_updates_the_fetcher_used_next() {
        let cache = QueryCache::new();
        let (old, old_calls) = value_fetcher(Value::from("old"));
        let (new, new_calls) = value_fetcher(Value::from("new"));

        let query = cache.build_query("k", Some(old), None).unwrap();
        cache.build_query("k", Some(new), None).unwrap();

        assert_eq!(query.fetch().await.unwrap(), Value::from("new"));
        assert_eq!(old_calls.load(Ordering::SeqCst), 0);
        assert_eq!(new_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetcher_receives_original_variables() {
        let cache = QueryCache::new();
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::new(Mutex::new(None));
        let record = Arc::clone(&seen);
        let fetcher: FetchRef = FetchFn::arc("record", move |key: String, vars: Value| {
            *record.lock().unwrap() = Some((key, vars));
            async move { Ok::<_, anyhow::Error>(Value::Null) }
        });

        let variables = json!({ "number": 5, "boolean": false, "object": {}, "array": [] });
        let query = cache
            .build_query(("test", variables.clone()), Some(fetcher), None)
            .unwrap();
        query.fetch().await.unwrap();

        let (key, vars) = seen.lock().unwrap().take().unwrap();
        assert_eq!(key, "test");
        assert_eq!(vars, variables);
        assert_ne!(query.key().canonical(), "test");
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_form_carries_its_own_fetcher_and_config() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let spec = QuerySpec::new()
            .with_key("key")
            .with_fetcher(fetcher)
            .with_config(QueryConfig::default().with_enabled(false));

        let query = cache.build_query(spec, None, None).unwrap();
        assert_eq!(query.state().status, QueryStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_explicit_spec_fails_synchronously() {
        let cache = QueryCache::new();
        let err = cache
            .build_query(QuerySpec::new(), None, None)
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingKey));

        let err = cache
            .build_query(QuerySpec::new().with_key("key"), None, None)
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingFetcher));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn initial_data_seeds_success_without_fetching() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("fetched"));
        // A falsy seed value still counts as provided.
        let config = QueryConfig::default().with_initial_data(Value::from(0));

        let query = cache.build_query("seeded", Some(fetcher), Some(config)).unwrap();
        let state = query.state();
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(state.data, Some(Value::from(0)));
        assert!(!state.is_fetching);
        assert!(!state.is_stale);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_queries_stay_idle_on_subscribe() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_enabled(false);

        let query = cache.build_query("idle", Some(fetcher), Some(config)).unwrap();
        let _sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(query.state().status, QueryStatus::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_time_zero_marks_stale_after_settle() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let query = cache.build_query("s0", Some(fetcher), None).unwrap();

        query.fetch().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(query.state().is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_time_disabled_never_marks_stale() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_stale_time(None);
        let query = cache.build_query("sinf", Some(fetcher), Some(config)).unwrap();

        query.fetch().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!query.state().is_stale);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_marks_stale_without_fetching() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_stale_time(None);
        let query = cache.build_query("inv", Some(fetcher), Some(config)).unwrap();
        query.fetch().await.unwrap();
        assert!(!query.state().is_stale);

        let matched = cache.invalidate_queries(|q| q.key().base() == "inv");
        assert_eq!(matched, 1);
        assert!(query.state().is_stale);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn data_bearing_query_is_collected_after_cache_time() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_cache_time(Some(Duration::from_millis(100)));
        let query = cache.build_query("gc", Some(fetcher), Some(config)).unwrap();

        let sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(query.state().data.is_some());

        sub.unsubscribe();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_query("gc").is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get_query("gc").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribing_cancels_garbage_collection() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_cache_time(Some(Duration::from_millis(100)));
        let query = cache.build_query("keep", Some(fetcher), Some(config)).unwrap();

        let sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;
        sub.unsubscribe();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get_query("keep").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cache_time_disabled_retains_indefinitely() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let config = QueryConfig::default().with_cache_time(None);
        let query = cache.build_query("pin", Some(fetcher), Some(config)).unwrap();

        let sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;
        sub.unsubscribe();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(cache.get_query("pin").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn data_less_queries_are_collected_immediately() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: FetchRef = FetchFn::arc("slow", move |_key: String, _vars: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, anyhow::Error>(Value::from("late"))
            }
        });

        let query = cache.build_query("orphan", Some(fetcher), None).unwrap();
        let sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        sub.unsubscribe();

        // No data yet, so no grace period applies.
        assert!(cache.get_query("orphan").is_none());

        // The in-flight settlement is discarded silently.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get_query("orphan").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn prefetched_entries_refetch_once_stale() {
        let cache = QueryCache::new();
        let (prefetcher, prefetch_calls) = value_fetcher(Value::from("not yet..."));
        let config = QueryConfig::default().with_stale_time(Some(Duration::ZERO));

        let data = cache
            .prefetch_query("test", Some(prefetcher), Some(config))
            .await
            .unwrap();
        assert_eq!(data, Value::from("not yet..."));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let (fetcher, fetch_calls) = value_fetcher(Value::from("data"));
        let query = cache.build_query("test", Some(fetcher), None).unwrap();
        let _sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;

        // The prefetched entry was already stale, so subscribing fetched again.
        assert_eq!(prefetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(query.state().data, Some(Value::from("data")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_prefetch_leaves_no_entry_behind() {
        let cache = QueryCache::new();
        let (fetcher, calls) = failing_fetcher("nope");

        let err = cache
            .prefetch_query("bad", Some(fetcher), Some(no_retry()))
            .await
            .unwrap_err();
        assert!(matches!(err, PrefetchError::Fetch(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn prefetch_with_malformed_spec_fails_before_fetching() {
        let cache = QueryCache::new();
        let err = cache
            .prefetch_query(QuerySpec::new(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PrefetchError::Build(BuildError::MissingKey)));
    }

    #[tokio::test(start_paused = true)]
    async fn focus_refetches_stale_subscribed_queries() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("data"));
        let query = cache.build_query("focus", Some(fetcher), None).unwrap();
        let _sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Settled and stale again (stale_time defaults to zero).
        cache.notify_focus();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_skips_disabled_and_unobserved_queries() {
        let cache = QueryCache::new();
        let (disabled, disabled_calls) = value_fetcher(Value::from(1));
        let (unobserved, unobserved_calls) = value_fetcher(Value::from(2));

        let query = cache
            .build_query(
                "disabled",
                Some(disabled),
                Some(QueryConfig::default().with_enabled(false)),
            )
            .unwrap();
        let _sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        cache.build_query("unobserved", Some(unobserved), None).unwrap();

        cache.notify_focus();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(disabled_calls.load(Ordering::SeqCst), 0);
        assert_eq!(unobserved_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_refetches_at_the_smallest_request() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("tick"));
        let query = cache.build_query("interval", Some(fetcher), None).unwrap();

        let _slow = query.subscribe(
            Arc::new(Silent),
            SubscribeOptions::refetch_every(Duration::from_millis(500)),
        );
        let _fast = query.subscribe(
            Arc::new(Silent),
            SubscribeOptions::refetch_every(Duration::from_millis(100)),
        );

        tokio::time::sleep(Duration::from_millis(320)).await;
        // Mount fetches plus ticks at 100/200/300 — far more than the 500ms
        // timer alone could produce.
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn config_level_interval_ticks_while_subscribed() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("tick"));
        let config =
            QueryConfig::default().with_refetch_interval(Some(Duration::from_millis(100)));
        let query = cache
            .build_query("cfg-interval", Some(fetcher), Some(config))
            .unwrap();

        let sub = query.subscribe(Arc::new(Silent), SubscribeOptions::default());
        tokio::time::sleep(Duration::from_millis(320)).await;
        assert!(calls.load(Ordering::SeqCst) >= 4);

        // The interval only runs while somebody observes the query.
        sub.unsubscribe();
        let quiet = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), quiet);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_skips_ticks_while_hidden() {
        let cache = QueryCache::new();
        let (fetcher, calls) = value_fetcher(Value::from("tick"));
        let query = cache.build_query("bg", Some(fetcher), None).unwrap();

        let _sub = query.subscribe(
            Arc::new(Silent),
            SubscribeOptions::refetch_every(Duration::from_millis(100)),
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        let after_mount = calls.load(Ordering::SeqCst);

        cache.set_visible(false);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_mount);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_in_background_when_allowed() {
        let cache = QueryCache::new();
        cache.set_visible(false);
        let (fetcher, calls) = value_fetcher(Value::from("tick"));
        let config = QueryConfig::default().with_refetch_interval_in_background(true);
        let query = cache.build_query("bg2", Some(fetcher), Some(config)).unwrap();

        let _sub = query.subscribe(
            Arc::new(Silent),
            SubscribeOptions::refetch_every(Duration::from_millis(100)),
        );
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_query_is_idempotent() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from(1));
        cache.build_query("gone", Some(fetcher), None).unwrap();

        cache.remove_query("gone");
        assert!(cache.get_query("gone").is_none());
        cache.remove_query("gone");
        cache.remove_query("never-existed");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_empties_the_registry() {
        let cache = QueryCache::new();
        let (a, _) = value_fetcher(Value::from(1));
        let (b, _) = value_fetcher(Value::from(2));
        cache.build_query("a", Some(a), None).unwrap();
        cache.build_query("b", Some(b), None).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removed_keys_rebuild_from_scratch() {
        let cache = QueryCache::new();
        let (fetcher, _) = value_fetcher(Value::from("data"));
        let query = cache.build_query("fresh", Some(fetcher.clone()), None).unwrap();
        query.fetch().await.unwrap();
        assert!(query.state().data.is_some());

        cache.remove_query("fresh");
        let rebuilt = cache.build_query("fresh", Some(fetcher), None).unwrap();
        assert!(!Arc::ptr_eq(&query, &rebuilt));
        assert_eq!(rebuilt.state().status, QueryStatus::Loading);
        assert!(rebuilt.state().data.is_none());
    }

    #[tokio::test]
    async fn global_cache_is_a_single_instance() {
        let a = QueryCache::global();
        let b = QueryCache::global();
        assert!(Arc::ptr_eq(&a.shared, &b.shared));
    }
}
