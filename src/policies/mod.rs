//! Retry policies.
//!
//! This module groups the knobs that control **if** a failed fetch is retried
//! and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`] whether to retry (never / always / limit / predicate)
//! - [`RetryDelay`]  delay before each retry (fixed / backoff / custom)
//! - [`BackoffPolicy`] the capped exponential curve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization strategy to spread synchronized refetches
//!
//! ## Quick wiring
//! ```text
//! QueryConfig { retry: RetryPolicy, retry_delay: RetryDelay, .. }
//!      └─► the query's fetch task uses, after each failure:
//!           - retry.should_retry(failure_count, &error) to continue/settle
//!           - retry_delay.delay(failure_count) to schedule the next attempt
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::Limit(3)` (three retries, four attempts in total).
//! - `RetryDelay::Backoff(BackoffPolicy::default())` → first=1s, factor=2.0, max=30s.
//! - `JitterPolicy::None` by default; consider `Equal` for balanced randomness.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::{RetryDelay, RetryDelayFn, RetryPolicy, RetryPredicate};
