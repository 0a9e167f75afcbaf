//! # Fetch abstraction and function-backed fetcher.
//!
//! This module defines the [`Fetch`] trait (an async resource read producing a
//! fresh future per invocation) and the closure adapter [`FetchFn`]. The
//! common handle type is [`FetchRef`], an `Arc<dyn Fetch>` shared between the
//! cache registry and in-flight fetch tasks.
//!
//! A fetcher receives the *original* base id and variables of the query key,
//! never the canonical registry string. The cache treats the returned value
//! and any error as opaque payloads.
//!
//! ## Concurrency semantics
//! - Each [`Fetch::fetch`] call creates a **new** future owning its state.
//! - The cache guarantees at most one outstanding future per query; concurrent
//!   callers share it rather than invoking the fetcher again.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Boxed future returned by a fetcher.
pub type BoxFetchFuture = Pin<Box<dyn Future<Output = Result<Value, anyhow::Error>> + Send>>;

/// Shared fetcher handle.
pub type FetchRef = Arc<dyn Fetch>;

/// # Asynchronous resource read.
///
/// Implementors produce a fresh future per call; the arguments are the
/// original (non-canonical) base id and variables of the query key.
///
/// # Example
/// ```
/// use requery::{Fetch, BoxFetchFuture};
/// use serde_json::Value;
///
/// struct Static;
///
/// impl Fetch for Static {
///     fn fetch(&self, _key: String, _variables: Value) -> BoxFetchFuture {
///         Box::pin(async { Ok(Value::from("data")) })
///     }
/// }
/// ```
pub trait Fetch: Send + Sync + 'static {
    /// Starts one read of the resource.
    fn fetch(&self, key: String, variables: Value) -> BoxFetchFuture;
}

impl std::fmt::Debug for dyn Fetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Fetch")
    }
}

/// Function-backed fetcher implementation.
///
/// Wraps a closure that *creates* a new future per call.
pub struct FetchFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> FetchFn<F> {
    /// Creates a new function-backed fetcher.
    ///
    /// Prefer [`FetchFn::arc`] when you immediately need a [`FetchRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the fetcher and returns it as a shared handle.
    ///
    /// ## Example
    /// ```
    /// use requery::{FetchFn, FetchRef};
    /// use serde_json::Value;
    ///
    /// let f: FetchRef = FetchFn::arc("todos", |_key: String, _vars: Value| async move {
    ///     Ok::<_, anyhow::Error>(Value::from("data"))
    /// });
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Returns the fetcher name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F, Fut> Fetch for FetchFn<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<Value, anyhow::Error>> + Send + 'static,
{
    fn fetch(&self, key: String, variables: Value) -> BoxFetchFuture {
        let fut = (self.f)(key, variables);
        Box::pin(fut)
    }
}
