//! Collection sessions and their shutdown protocol
//!
//! A session is one tokio task sampling one scope on a fixed interval.
//! Sessions belonging to one owner share a [`CancellationToken`] and are
//! tracked in a [`SessionRegistry`]; `drain` bounds how long shutdown
//! may take across all of them. Separate registries hold separate
//! tokens and never share state.

mod cancel;
mod collection;
mod registry;

pub use cancel::{CancellationToken, TokenState};
pub use collection::CollectionSession;
pub use registry::{SessionHandle, SessionRegistry};

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Draining,
    Stopped,
}

/// Session state shared between the task and its handle.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> SessionState {
        match self.0.load(Ordering::SeqCst) {
            0 => SessionState::Created,
            1 => SessionState::Running,
            2 => SessionState::Draining,
            _ => SessionState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}
