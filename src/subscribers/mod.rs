//! # Query observers.
//!
//! This module provides the [`Observe`] trait — the contract a binding layer
//! implements to receive state and settlement notifications — and the
//! [`ObserverSet`] fan-out each query owns.
//!
//! ## Architecture
//! ```text
//! Notification flow:
//!   Query settle / state change ──► ObserverSet::emit
//!                                        │
//!                                   ┌────┴────┬─────────┐
//!                                   ▼         ▼         ▼
//!                              [queue O1] [queue O2] [queue ON]   (bounded, per observer)
//!                                   ▼         ▼         ▼
//!                               worker O1 worker O2 worker ON
//!                                   ▼         ▼         ▼
//!                              on_state_update / on_success / on_error / on_settled
//! ```
//!
//! ## Implementing custom observers
//! ```no_run
//! use requery::{Observe, QueryState};
//! use async_trait::async_trait;
//!
//! struct RenderTrigger;
//!
//! #[async_trait]
//! impl Observe for RenderTrigger {
//!     async fn on_state_update(&self, state: &QueryState) {
//!         // schedule a re-render with the fresh snapshot
//!         let _ = state;
//!     }
//! }
//! ```

mod observer;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use observer::Observe;
pub(crate) use set::{Notification, ObserverSet};

#[cfg(feature = "logging")]
pub use log::LogObserver;
