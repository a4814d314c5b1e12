//! One-shot failure forwarding.
//!
//! Each request owns a [`FailureSlot`]. Handlers receive a [`Forwarder`] that
//! writes into it. The slot accepts exactly one failure; every later forward
//! is dropped and logged, as is any forward after the slot has been closed.

use crate::error::Failure;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct SlotState {
    failure: Option<Failure>,
    filled: bool,
    closed: bool,
    dropped: usize,
}

/// Per-request slot holding at most one forwarded failure.
///
/// # Example
///
/// ```
/// use missive_core::{Failure, FailureSlot};
///
/// let slot = FailureSlot::new();
/// assert!(slot.fill(Failure::bad_request("first")));
/// assert!(!slot.fill(Failure::bad_request("second")));
/// assert_eq!(slot.take().unwrap().to_string(), "first");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FailureSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl FailureSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `failure` if the slot is still empty and open.
    ///
    /// Returns `true` if the failure was accepted.
    pub fn fill(&self, failure: Failure) -> bool {
        let mut state = self.inner.lock();
        if state.filled || state.closed {
            state.dropped += 1;
            let closed = state.closed;
            drop(state);
            tracing::warn!(
                error = %failure,
                source = failure.source_label(),
                after_close = closed,
                "Failure already forwarded for this request; dropping"
            );
            return false;
        }
        state.filled = true;
        state.failure = Some(failure);
        true
    }

    /// Returns `true` once a failure has been accepted.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.inner.lock().filled
    }

    /// Removes the accepted failure.
    ///
    /// The slot stays filled, so later forwards are still rejected.
    #[must_use]
    pub fn take(&self) -> Option<Failure> {
        self.inner.lock().failure.take()
    }

    /// Closes the slot. Forwards after this point are dropped.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Returns `true` once the slot has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Returns how many forwards were dropped.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.inner.lock().dropped
    }

    /// Returns a handle handlers can forward through.
    #[must_use]
    pub fn forwarder(&self) -> Forwarder {
        Forwarder { slot: self.clone() }
    }
}

/// Handle for explicitly forwarding a failure out of a handler.
///
/// Forwarding does not stop the handler. Whatever the handler later returns,
/// the forwarded failure is the one that reaches the dispatcher.
#[derive(Debug, Clone)]
pub struct Forwarder {
    slot: FailureSlot,
}

impl Forwarder {
    /// Forwards `failure` to the dispatcher.
    ///
    /// Returns `false` if a failure was already forwarded for this request.
    pub fn forward(&self, failure: impl Into<Failure>) -> bool {
        self.slot.fill(failure.into())
    }

    /// Returns `true` if a failure has been forwarded.
    #[must_use]
    pub fn has_forwarded(&self) -> bool {
        self.slot.is_filled()
    }
}
