//! Connection binding lifecycle and the close-time guard.
//!
//! ```text
//! UNBOUND --bind--> BOUND --close--> CLEARED
//!    |                                  ^
//!    +-------------close----------------+
//! ```
//!
//! `CLEARED` is terminal: a closed connection is never bound again.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::connection::TracedConnection;
use crate::trace_value::HasTraceValue;

/// Binding state of one connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unbound = 0,
    Bound = 1,
    Cleared = 2,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Bound,
            2 => LifecycleState::Cleared,
            _ => LifecycleState::Unbound,
        }
    }
}

/// Atomic holder for a [`LifecycleState`].
#[derive(Debug, Default)]
pub(crate) struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    pub(crate) fn get(&self) -> LifecycleState {
        self.0.load(Ordering::Acquire).into()
    }

    /// Move `UNBOUND -> BOUND`. Returns false from any other state.
    pub(crate) fn try_bind(&self) -> bool {
        self.0
            .compare_exchange(
                LifecycleState::Unbound as u8,
                LifecycleState::Bound as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `CLEARED`, returning the previous state.
    pub(crate) fn clear(&self) -> LifecycleState {
        self.0
            .swap(LifecycleState::Cleared as u8, Ordering::AcqRel)
            .into()
    }
}

/// Clear a connection's endpoint as part of closing it.
///
/// Runs whether or not the physical close succeeded. Safe to call any number
/// of times; the slot stays empty afterwards.
pub fn on_close(connection: &TracedConnection) {
    let previous = connection.lifecycle_cell().clear();

    if let Some(value) = connection.trace_value() {
        value.clear_trace_endpoint();
    }

    if previous == LifecycleState::Bound && connection.config().log_lifecycle {
        tracing::debug!(state = ?previous, "Endpoint cleared on close");
    }
}
