//! Busy state and cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// The kind of cycle holding the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Load,
    Apply,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "save",
            Self::Load => "load",
            Self::Apply => "apply",
        })
    }
}

/// Whether a manager is free to start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkState {
    #[default]
    Idle,
    Working(Operation),
}

/// Holds a manager in [`WorkState::Working`] until dropped.
pub(crate) struct WorkGuard<'a> {
    state: &'a Mutex<WorkState>,
}

impl<'a> WorkGuard<'a> {
    /// Move `state` from idle to working, or return `None` if it is taken.
    pub(crate) fn try_acquire(state: &'a Mutex<WorkState>, operation: Operation) -> Option<Self> {
        let mut current = state.lock();
        if *current != WorkState::Idle {
            return None;
        }
        *current = WorkState::Working(operation);
        Some(Self { state })
    }
}

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = WorkState::Idle;
    }
}

/// Cooperative cancellation flag shared between a caller and an apply cycle.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
