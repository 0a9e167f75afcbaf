//! # ObserverSet: non-blocking fan-out over a query's observers.
//!
//! Distributes each notification to every registered observer **without
//! awaiting** their processing; the fetch and timer paths never block on a
//! slow observer.
//!
//! ## What it guarantees
//! - `emit` returns immediately.
//! - Per-observer FIFO (queue order).
//! - Panics inside observer callbacks are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different observers.
//! - No retries on per-observer queue overflow (the notification is dropped
//!   for that observer).
//!
//! ## Diagram
//! ```text
//!    emit(Notification)
//!        │                        (Arc-clone per observer)
//!        ├────────────────► [queue O1] ─► worker O1 ─► callbacks
//!        ├────────────────► [queue O2] ─► worker O2 ─► callbacks
//!        └────────────────► [queue ON] ─► worker ON ─► callbacks
//! ```
//!
//! Unlike a fixed fan-out, membership changes over a query's lifetime:
//! observers come and go with subscribe/unsubscribe, and each entry remembers
//! the refetch interval its subscriber asked for so the query can run a
//! single timer at the smallest one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::QueryError;
use crate::query::QueryState;

use super::Observe;

/// One delivery to an observer.
pub(crate) enum Notification {
    /// A fresh state snapshot; sent on every observable change.
    StateUpdate(QueryState),
    /// A fetch cycle settled successfully.
    Success(Value),
    /// A fetch cycle settled with an error (retries exhausted).
    Error(QueryError),
    /// A fetch cycle settled, either way.
    Settled(Option<Value>, Option<QueryError>),
}

/// Per-observer channel with metadata.
struct Entry {
    id: u64,
    name: &'static str,
    sender: mpsc::Sender<Arc<Notification>>,
    interval: Option<Duration>,
}

/// Dynamic fan-out with per-observer bounded queues and worker tasks.
pub(crate) struct ObserverSet {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl ObserverSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an observer and spawns its worker; returns its membership id.
    pub fn add(&self, observer: Arc<dyn Observe>, interval: Option<Duration>) -> u64 {
        let cap = observer.queue_capacity().max(1);
        let name = observer.name();
        let (tx, mut rx) = mpsc::channel::<Arc<Notification>>(cap);

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let fut = dispatch(observer.as_ref(), notification.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    tracing::warn!(
                        observer = observer.name(),
                        "observer panicked while handling a notification: {panic_err:?}"
                    );
                }
            }
        });

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().unwrap().push(Entry {
            id,
            name,
            sender: tx,
            interval,
        });
        id
    }

    /// Removes an observer; its queue closes and the worker drains out.
    ///
    /// Returns `false` if the id was not present (already removed).
    pub fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True when nobody is observing.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Smallest refetch interval requested by any current observer.
    pub fn min_interval(&self) -> Option<Duration> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.interval)
            .min()
    }

    /// Fans one notification out to every observer (non-blocking).
    ///
    /// A full or closed queue drops the notification for that observer only.
    pub fn emit(&self, notification: Notification) {
        let notification = Arc::new(notification);
        let entries = self.entries.lock().unwrap();
        for entry in entries.iter() {
            match entry.sender.try_send(Arc::clone(&notification)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(observer = entry.name, "notification dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(observer = entry.name, "notification dropped: worker closed");
                }
            }
        }
    }
}

async fn dispatch(observer: &dyn Observe, notification: &Notification) {
    match notification {
        Notification::StateUpdate(state) => observer.on_state_update(state).await,
        Notification::Success(data) => observer.on_success(data).await,
        Notification::Error(error) => observer.on_error(error).await,
        Notification::Settled(data, error) => {
            observer.on_settled(data.as_ref(), error.as_ref()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Recorder {
        tx: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Observe for Recorder {
        async fn on_state_update(&self, state: &QueryState) {
            let _ = self.tx.send(format!("state:{}", state.status.as_label()));
        }

        async fn on_success(&self, data: &Value) {
            let _ = self.tx.send(format!("success:{data}"));
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn notifications_arrive_in_order() {
        let set = ObserverSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.add(Arc::new(Recorder { tx }), None);

        set.emit(Notification::StateUpdate(QueryState::loading()));
        set.emit(Notification::Success(Value::from("ok")));

        assert_eq!(rx.recv().await.unwrap(), "state:loading");
        assert_eq!(rx.recv().await.unwrap(), "success:\"ok\"");
    }

    #[tokio::test]
    async fn removed_observers_stop_receiving() {
        let set = ObserverSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = set.add(Arc::new(Recorder { tx }), None);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());

        set.emit(Notification::Success(Value::from(1)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn min_interval_tracks_membership() {
        let set = ObserverSet::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let slow = set.add(Arc::new(Recorder { tx }), Some(Duration::from_secs(10)));
        let fast = set.add(Arc::new(Recorder { tx: tx2 }), Some(Duration::from_secs(1)));
        assert_eq!(set.min_interval(), Some(Duration::from_secs(1)));

        set.remove(fast);
        assert_eq!(set.min_interval(), Some(Duration::from_secs(10)));
        set.remove(slow);
        assert_eq!(set.min_interval(), None);
    }
}
