//! Error types used by the cache and its queries.
//!
//! This module defines three error types:
//!
//! - [`BuildError`] — programmer errors in a query specification, raised
//!   synchronously when the query is built.
//! - [`QueryError`] — an opaque, cheaply cloneable wrapper around whatever a
//!   fetcher returned; surfaced as query state after retries are exhausted.
//! - [`PrefetchError`] — composite error of the prefetch entry point.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// # Errors in a query specification.
///
/// These represent misuse of the build API, not runtime fetch failures.
/// They are raised synchronously from `build_query`/`prefetch_query`,
/// never deferred into the async query state.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// The explicit specification form carried no query key.
    #[error("query specification is missing a query key")]
    MissingKey,

    /// No fetch function was supplied, neither inline nor in the specification.
    #[error("query specification is missing a fetch function")]
    MissingFetcher,
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use requery::BuildError;
    ///
    /// assert_eq!(BuildError::MissingKey.as_label(), "build_missing_key");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::MissingKey => "build_missing_key",
            BuildError::MissingFetcher => "build_missing_fetcher",
        }
    }
}

/// # Opaque fetch error.
///
/// Whatever value a fetcher rejected with, forwarded verbatim. The cache never
/// classifies the payload; it is stored in query state, broadcast to
/// observers, and counted by the retryer.
///
/// Internally `Arc`-backed so the same error can live in query state and be
/// delivered to any number of observers without copying the payload.
#[derive(Clone)]
pub struct QueryError {
    inner: Arc<anyhow::Error>,
}

impl QueryError {
    /// Wraps a fetcher error.
    pub fn new(err: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(err),
        }
    }

    /// Borrows the underlying error value.
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// # Errors produced by [`prefetch_query`](crate::QueryCache::prefetch_query).
///
/// Either the specification was malformed (produced before the first await)
/// or the fetch itself failed after exhausting retries.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PrefetchError {
    /// The query specification was malformed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The fetch failed after exhausting retries.
    #[error(transparent)]
    Fetch(#[from] QueryError),
}
