//! # Query: per-key fetch state machine.
//!
//! A [`Query`] supervises every read of one logical resource:
//! - deduplicates concurrent fetches into a single fetcher invocation,
//! - retries failures per [`RetryPolicy`](crate::RetryPolicy) with delays per
//!   [`RetryDelay`](crate::RetryDelay), deferring while the app is hidden,
//! - tracks staleness and garbage-collection timers,
//! - broadcasts state and settlement notifications to its observers.
//!
//! ## Lifecycle
//! ```text
//! build ──► Idle (enabled = false)          subscribe/fetch ──► Loading
//!       ──► Success (initial_data seeded)
//!       ──► Loading (default)
//!
//! fetch() {
//!   ├─► in-flight task present? ──► return the shared handle (dedup)
//!   ├─► mark loading/is_fetching **synchronously**
//!   └─► spawn fetch task:
//!         loop {
//!           ├─► invoke fetcher(base, variables)      (current fn, read at attempt time)
//!           ├─► Ok  ──► settle success: data, failure_count = 0, re-arm stale timer
//!           └─► Err ──► failure_count += 1, notify
//!                 ├─► retry denied ──► settle error
//!                 └─► sleep(retry_delay) ─► wait visible ─► next attempt
//!         }
//!         settle ──► broadcast to all observers + config result hooks
//! }
//! ```
//!
//! ## Rules
//! - At most **one** in-flight fetch per query; concurrent callers share it.
//! - The loading transition happens **before** `fetch()` returns, so a state
//!   read immediately after the call observes it deterministically.
//! - Every armed timer is owned as a scoped handle; each exit path that makes
//!   a timer irrelevant drops (cancels) it.
//! - A settlement for a query that was removed from the registry is discarded
//!   without mutating state or notifying anyone; the shared handle still
//!   resolves with the raw outcome.

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::cache::CacheShared;
use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::fetch::FetchRef;
use crate::key::QueryKey;
use crate::query::timer::Timer;
use crate::subscribers::{Notification, Observe, ObserverSet};

mod state;
mod timer;

pub use state::{QueryState, QueryStatus};

/// Handle to an in-flight fetch, shared by every concurrent caller.
///
/// Awaiting it yields the settled outcome of the whole cycle (after retries).
pub type SharedFetch = Shared<BoxFuture<'static, Result<Value, QueryError>>>;

/// Per-subscriber options.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscribeOptions {
    /// Periodic refetch interval requested by this subscriber. The query runs
    /// a single timer at the smallest interval among active subscribers.
    pub refetch_interval: Option<Duration>,
}

impl SubscribeOptions {
    /// Shorthand for requesting a refetch interval.
    pub fn refetch_every(interval: Duration) -> Self {
        Self {
            refetch_interval: Some(interval),
        }
    }
}

/// Membership handle returned by [`Query::subscribe`].
///
/// Call [`unsubscribe`](Subscription::unsubscribe) on teardown; dropping the
/// handle performs the same removal, so a forgotten handle cannot leak an
/// observer. When the last subscriber leaves, the query's garbage-collection
/// policy applies.
#[derive(Debug)]
pub struct Subscription {
    query: Weak<Query>,
    id: u64,
    active: bool,
}

impl Subscription {
    /// Removes the observer from the query.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(query) = self.query.upgrade() {
            query.unsubscribe_id(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Mutable half of a query, guarded by a mutex that is never held across an
/// await point.
struct Inner {
    state: QueryState,
    /// Current fetcher; replaced on every rebuild, read at attempt time.
    fetcher: FetchRef,
    /// Current config; replaced on every rebuild, read at fire time by the
    /// retryer, the timers, and the result hooks.
    config: QueryConfig,
    in_flight: Option<SharedFetch>,
    stale_timer: Option<Timer>,
    gc_timer: Option<Timer>,
    interval_timer: Option<Timer>,
    current_interval: Option<Duration>,
}

/// Per-key fetch state machine. See the module docs for the lifecycle.
pub struct Query {
    key: QueryKey,
    cache: Weak<CacheShared>,
    observers: ObserverSet,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query").field("key", &self.key).finish_non_exhaustive()
    }
}

impl Query {
    /// Builds a query with its initial state derived from the config:
    /// seeded `Success` when `initial_data` is present, `Idle` when disabled,
    /// `Loading` otherwise.
    pub(crate) fn new(
        key: QueryKey,
        fetcher: FetchRef,
        config: QueryConfig,
        cache: Weak<CacheShared>,
    ) -> Arc<Self> {
        let state = match &config.initial_data {
            Some(seed) => QueryState::seeded(seed.resolve()),
            None if !config.enabled => QueryState::idle(),
            None => QueryState::loading(),
        };

        let query = Arc::new(Self {
            key,
            cache,
            observers: ObserverSet::new(),
            inner: Mutex::new(Inner {
                state,
                fetcher,
                config,
                in_flight: None,
                stale_timer: None,
                gc_timer: None,
                interval_timer: None,
                current_interval: None,
            }),
        });

        // Seeded data ages like fetched data.
        let mut inner = query.inner.lock().unwrap();
        if inner.state.data.is_some() {
            query.arm_stale_locked(&mut inner);
        }
        drop(inner);

        query
    }

    /// The normalized identity of this query.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> QueryState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Number of active subscribers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Replaces the stored fetcher and config with the latest build's values.
    ///
    /// State is untouched; only the behavior of the next fetch and timer
    /// fires changes. The interval timer is re-armed in case the new config
    /// moved the minimum.
    pub(crate) fn refresh(self: &Arc<Self>, fetcher: FetchRef, config: QueryConfig) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fetcher = fetcher;
            inner.config = config;
        }
        self.update_interval_timer();
    }

    /// Registers an observer and returns its membership handle.
    ///
    /// A new subscriber cancels any pending garbage collection. If the query
    /// is enabled, not `manual`, and its data is stale, a fetch is triggered.
    pub fn subscribe(
        self: &Arc<Self>,
        observer: Arc<dyn Observe>,
        options: SubscribeOptions,
    ) -> Subscription {
        self.inner.lock().unwrap().gc_timer = None;

        let id = self.observers.add(observer, options.refetch_interval);
        self.update_interval_timer();

        if self.should_auto_fetch() {
            drop(self.fetch());
        }

        Subscription {
            query: Arc::downgrade(self),
            id,
            active: true,
        }
    }

    /// The "refetch if stale" rule applied on subscribe and on focus:
    /// enabled, not manual, and holding stale (or absent) data.
    pub(crate) fn should_auto_fetch(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.config.enabled && !inner.config.manual && inner.state.is_stale
    }

    fn unsubscribe_id(self: &Arc<Self>, id: u64) {
        if !self.observers.remove(id) {
            return;
        }
        self.update_interval_timer();
        if self.observers.is_empty() {
            self.schedule_gc();
        }
    }

    /// Starts a fetch, or joins the one already in flight.
    ///
    /// The returned handle can be awaited by any number of callers; the
    /// fetcher runs exactly once per cycle. The loading transition is visible
    /// as soon as this method returns.
    pub fn fetch(self: &Arc<Self>) -> SharedFetch {
        let (task, tx, snapshot) = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(task) = &inner.in_flight {
                return task.clone();
            }

            inner.state.is_fetching = true;
            if inner.state.status != QueryStatus::Success {
                inner.state.status = QueryStatus::Loading;
            }

            let (tx, rx) = oneshot::channel::<Result<Value, QueryError>>();
            let task: SharedFetch = async move {
                match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(QueryError::new(anyhow::anyhow!(
                        "fetch task dropped before settling"
                    ))),
                }
            }
            .boxed()
            .shared();
            inner.in_flight = Some(task.clone());
            (task, tx, inner.state.clone())
        };

        // Loading is observable before the attempt starts.
        self.observers.emit(Notification::StateUpdate(snapshot));
        tokio::spawn(Self::run_fetch(Arc::clone(self), tx));
        task
    }

    async fn run_fetch(query: Arc<Query>, tx: oneshot::Sender<Result<Value, QueryError>>) {
        let outcome = query.fetch_with_retries().await;

        if query.is_current() {
            match &outcome {
                Ok(value) => query.settle_success(value.clone()),
                Err(error) => query.settle_error(error.clone()),
            }
        } else {
            // Removed (or replaced) while in flight: discard silently.
            query.inner.lock().unwrap().in_flight = None;
            tracing::trace!(key = query.key.canonical(), "settlement discarded");
        }

        let _ = tx.send(outcome);
    }

    /// One fetch cycle: attempts until success or the retryer gives up.
    async fn fetch_with_retries(self: &Arc<Self>) -> Result<Value, QueryError> {
        loop {
            let fetcher = self.inner.lock().unwrap().fetcher.clone();
            let attempt = fetcher.fetch(self.key.base().to_string(), self.key.variables().clone());

            let error = match attempt.await {
                Ok(value) => return Ok(value),
                Err(err) => QueryError::new(err),
            };

            let (should_retry, delay, snapshot) = {
                let mut inner = self.inner.lock().unwrap();
                inner.state.failure_count += 1;
                let count = inner.state.failure_count;
                (
                    inner.config.retry.should_retry(count, &error),
                    inner.config.retry_delay.delay(count),
                    inner.state.clone(),
                )
            };
            // Failures inside the retry window surface only as the counter.
            self.observers.emit(Notification::StateUpdate(snapshot));

            if !should_retry {
                return Err(error);
            }

            tokio::time::sleep(delay).await;
            self.wait_visible().await;

            if !self.is_current() {
                // Removed while paused; abandon without re-invoking the fetcher.
                return Err(error);
            }
        }
    }

    /// Defers while the cache's visibility gate reports hidden.
    async fn wait_visible(&self) {
        if let Some(cache) = self.cache.upgrade() {
            cache.visibility.wait_visible().await;
        }
    }

    fn settle_success(self: &Arc<Self>, value: Value) {
        let (snapshot, on_success, on_settled) = {
            let mut inner = self.inner.lock().unwrap();
            inner.in_flight = None;
            inner.state.status = QueryStatus::Success;
            inner.state.data = Some(value.clone());
            inner.state.error = None;
            inner.state.failure_count = 0;
            inner.state.is_fetching = false;
            inner.state.is_stale = false;
            inner.state.updated_at = Some(SystemTime::now());
            self.arm_stale_locked(&mut inner);
            (
                inner.state.clone(),
                inner.config.on_success.clone(),
                inner.config.on_settled.clone(),
            )
        };

        self.observers.emit(Notification::StateUpdate(snapshot));
        self.observers.emit(Notification::Success(value.clone()));
        self.observers
            .emit(Notification::Settled(Some(value.clone()), None));

        if let Some(hook) = on_success {
            hook(&value);
        }
        if let Some(hook) = on_settled {
            hook(Some(&value), None);
        }
    }

    fn settle_error(self: &Arc<Self>, error: QueryError) {
        let (snapshot, on_error, on_settled) = {
            let mut inner = self.inner.lock().unwrap();
            inner.in_flight = None;
            inner.state.status = QueryStatus::Error;
            inner.state.error = Some(error.clone());
            inner.state.is_fetching = false;
            (
                inner.state.clone(),
                inner.config.on_error.clone(),
                inner.config.on_settled.clone(),
            )
        };

        self.observers.emit(Notification::StateUpdate(snapshot));
        self.observers.emit(Notification::Error(error.clone()));
        self.observers
            .emit(Notification::Settled(None, Some(error.clone())));

        if let Some(hook) = on_error {
            hook(&error);
        }
        if let Some(hook) = on_settled {
            hook(None, Some(&error));
        }
    }

    /// Marks the cached data stale immediately.
    ///
    /// Clears any pending stale timer; does not force a fetch — refetching is
    /// left to the next subscribe/focus. Also the fire action of the stale
    /// timer itself.
    pub fn invalidate(&self) {
        let snapshot = {
            let mut inner = self.inner.lock().unwrap();
            inner.stale_timer = None;
            if inner.state.is_stale {
                None
            } else {
                inner.state.is_stale = true;
                Some(inner.state.clone())
            }
        };
        if let Some(state) = snapshot {
            self.observers.emit(Notification::StateUpdate(state));
        }
    }

    /// Arms (or disarms) the stale timer per the current config.
    ///
    /// Every settle replaces the previous handle, cancelling it.
    fn arm_stale_locked(self: &Arc<Self>, inner: &mut Inner) {
        inner.stale_timer = inner.config.stale_time.map(|delay| {
            let weak = Arc::downgrade(self);
            Timer::arm(delay, async move {
                if let Some(query) = weak.upgrade() {
                    query.invalidate();
                }
            })
        });
    }

    /// Applies the garbage-collection policy for a query nobody observes.
    ///
    /// Data-less queries are not worth retaining and are removed immediately;
    /// data-bearing queries get a grace period of `cache_time` (or live
    /// forever when it is disabled).
    pub(crate) fn schedule_gc(self: &Arc<Self>) {
        enum Gc {
            Immediate,
            After(Duration),
            Retain,
        }

        let decision = {
            let inner = self.inner.lock().unwrap();
            if inner.state.data.is_none() {
                Gc::Immediate
            } else {
                match inner.config.cache_time {
                    Some(delay) => Gc::After(delay),
                    None => Gc::Retain,
                }
            }
        };

        match decision {
            Gc::Immediate => self.remove_from_registry(),
            Gc::After(delay) => {
                let weak = Arc::downgrade(self);
                let timer = Timer::arm(delay, async move {
                    if let Some(query) = weak.upgrade() {
                        query.gc_fire();
                    }
                });
                self.inner.lock().unwrap().gc_timer = Some(timer);
            }
            Gc::Retain => {}
        }
    }

    fn gc_fire(self: &Arc<Self>) {
        // Cancellation is cooperative; re-check that nobody re-subscribed.
        if !self.observers.is_empty() {
            return;
        }
        self.remove_from_registry();
    }

    /// Deletes this query from its registry, if it is still the entry for its
    /// key, and cancels its timers.
    fn remove_from_registry(self: &Arc<Self>) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        let removed = {
            let mut queries = cache.queries.lock().unwrap();
            match queries.get(self.key.canonical()) {
                Some(current) if Arc::ptr_eq(current, self) => {
                    queries.remove(self.key.canonical())
                }
                _ => None,
            }
        };
        if let Some(query) = removed {
            query.teardown();
            tracing::debug!(key = query.key.canonical(), "query garbage collected");
        }
    }

    /// Cancels every live timer. Called on removal from the registry.
    pub(crate) fn teardown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stale_timer = None;
        inner.gc_timer = None;
        inner.interval_timer = None;
        inner.current_interval = None;
    }

    /// Re-arms the single interval timer at the smallest interval in effect:
    /// the config-level `refetch_interval` (while anyone subscribes) and
    /// every subscriber-requested one.
    fn update_interval_timer(self: &Arc<Self>) {
        let requested = self.observers.min_interval();
        let observed = !self.observers.is_empty();
        let mut inner = self.inner.lock().unwrap();
        let baseline = inner.config.refetch_interval.filter(|_| observed);
        let min = match (requested, baseline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if inner.current_interval == min {
            return;
        }
        inner.current_interval = min;
        inner.interval_timer = min.map(|period| {
            let weak = Arc::downgrade(self);
            Timer::arm_periodic(period, move || {
                let weak = weak.clone();
                async move {
                    if let Some(query) = weak.upgrade() {
                        query.interval_tick();
                    }
                }
            })
        });
    }

    fn interval_tick(self: &Arc<Self>) {
        let (enabled, in_background) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.config.enabled,
                inner.config.refetch_interval_in_background,
            )
        };
        if !enabled {
            return;
        }
        let visible = self
            .cache
            .upgrade()
            .is_none_or(|cache| cache.visibility.is_visible());
        if visible || in_background {
            drop(self.fetch());
        }
    }

    /// Whether this instance is still the registry entry for its key.
    fn is_current(self: &Arc<Self>) -> bool {
        match self.cache.upgrade() {
            Some(cache) => {
                let queries = cache.queries.lock().unwrap();
                queries
                    .get(self.key.canonical())
                    .is_some_and(|current| Arc::ptr_eq(current, self))
            }
            None => false,
        }
    }
}
