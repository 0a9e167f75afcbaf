//! # Retry decision and delay policies for failed fetches.
//!
//! Pure decision logic, independent of timers and IO:
//!
//! - [`RetryPolicy`] whether to retry after a failure (never / always /
//!   bounded count / predicate);
//! - [`RetryDelay`] how long to wait before the next attempt (fixed /
//!   backoff curve / custom function).
//!
//! Both are consulted with the **already-incremented** failure count: after
//! the first failed attempt the count is 1. `RetryPolicy::Limit(n)` therefore
//! allows `n` retries, i.e. `n + 1` fetcher invocations in total.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::QueryError;
use crate::policies::BackoffPolicy;

/// Predicate deciding a retry from `(failure_count, error)`.
pub type RetryPredicate = Arc<dyn Fn(u32, &QueryError) -> bool + Send + Sync>;

/// Custom delay function of the failure count.
pub type RetryDelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Policy controlling whether a failed fetch is retried.
#[derive(Clone)]
pub enum RetryPolicy {
    /// Never retry: the first failure settles the query as errored.
    Never,
    /// Retry unconditionally.
    Always,
    /// Retry while `failure_count <= n` (`n` retries, `n + 1` total attempts).
    Limit(u32),
    /// Ask a predicate; receives the failure count and the error payload.
    Predicate(RetryPredicate),
}

impl Default for RetryPolicy {
    /// Returns [`RetryPolicy::Limit`]`(3)`.
    fn default() -> Self {
        RetryPolicy::Limit(3)
    }
}

impl RetryPolicy {
    /// Builds the predicate form from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(u32, &QueryError) -> bool + Send + Sync + 'static,
    {
        RetryPolicy::Predicate(Arc::new(f))
    }

    /// Decides whether to retry after the given (already-incremented)
    /// failure count.
    pub fn should_retry(&self, failure_count: u32, error: &QueryError) -> bool {
        match self {
            RetryPolicy::Never => false,
            RetryPolicy::Always => true,
            RetryPolicy::Limit(n) => failure_count <= *n,
            RetryPolicy::Predicate(f) => f(failure_count, error),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Never => f.write_str("Never"),
            RetryPolicy::Always => f.write_str("Always"),
            RetryPolicy::Limit(n) => f.debug_tuple("Limit").field(n).finish(),
            RetryPolicy::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Policy controlling the delay before the next retry attempt.
#[derive(Clone)]
pub enum RetryDelay {
    /// The same delay before every retry.
    Fixed(Duration),
    /// A capped exponential curve (see [`BackoffPolicy`]).
    Backoff(BackoffPolicy),
    /// A custom function of the failure count (first retry sees 1).
    Custom(RetryDelayFn),
}

impl Default for RetryDelay {
    /// Returns [`RetryDelay::Backoff`] with [`BackoffPolicy::default`].
    fn default() -> Self {
        RetryDelay::Backoff(BackoffPolicy::default())
    }
}

impl RetryDelay {
    /// Builds the custom form from a closure.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryDelay::Custom(Arc::new(f))
    }

    /// Computes the delay before the retry following the given failure count.
    pub fn delay(&self, failure_count: u32) -> Duration {
        match self {
            RetryDelay::Fixed(d) => *d,
            // Backoff attempts are 0-indexed; the first retry uses `first`.
            RetryDelay::Backoff(policy) => policy.next(failure_count.saturating_sub(1)),
            RetryDelay::Custom(f) => f(failure_count),
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            RetryDelay::Backoff(policy) => f.debug_tuple("Backoff").field(policy).finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
