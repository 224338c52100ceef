//! Worker-to-worker delegation for the Ensemble coordination core.
//!
//! A worker that discovers work outside its specialty hands it to another
//! worker type through the [`HandoffManager`]: routing and capacity are
//! checked against a [`HandoffPolicy`], the handoff moves through a small
//! state machine until a terminal state, and every transition is published
//! on the shared event bus. Each handoff carries a deadline; one that is
//! still unfinished when it elapses is failed automatically.
//!
//! # Main types
//!
//! - [`HandoffManager`] — Tracks handoffs; cheap to clone and share.
//! - [`HandoffPolicy`] — Routing, capacity, timeout, and acceptance rules.
//! - [`HandoffRequest`] — Immutable record of one delegation request.
//! - [`ActiveHandoff`] — A tracked handoff and its lifecycle state.
//! - [`HandoffResult`] — The terminal outcome of a handoff.
//! - [`HandoffError`] — Refusals: bad route, capacity, unknown ID, bad state.

/// Error types for handoff operations.
pub mod error;
/// The handoff manager and its statistics.
pub mod manager;
/// Routing and capacity policy.
pub mod policy;
/// Handoff requests, statuses, and outcomes.
pub mod types;

pub use error::HandoffError;
pub use manager::{HandoffManager, HandoffStats, HISTORY_CAPACITY, TIMEOUT_REASON};
pub use policy::{HandoffPolicy, PolicyUpdate};
pub use types::{
    ActiveHandoff, HandoffOptions, HandoffPriority, HandoffRequest, HandoffResult, HandoffStatus,
};
