//! Session registry and drain protocol

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{CancellationToken, SessionState, StateCell};
use crate::errors::{DrainError, SessionError};
use crate::observability::HarvesterMetrics;

/// Handle to a spawned session task.
pub struct SessionHandle {
    name: String,
    state: Arc<StateCell>,
    join: JoinHandle<Result<(), SessionError>>,
}

impl SessionHandle {
    pub(crate) fn new(
        name: String,
        state: Arc<StateCell>,
        join: JoinHandle<Result<(), SessionError>>,
    ) -> Self {
        Self { name, state, join }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Wait for the session task to finish and surface its result. A
    /// panicked task is reported as [`SessionError::Panicked`].
    pub async fn join(self) -> Result<(), SessionError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(SessionError::Panicked(e.to_string())),
        }
    }
}

/// Tracks the sessions of one owner and coordinates their shutdown.
///
/// `drain` treats `timeout` as one shared budget: the token is set once,
/// the registered handles are snapshotted, and each join is awaited
/// within whatever remains of the budget. Total drain time is therefore
/// bounded by the caller's single timeout, not timeout times sessions.
pub struct SessionRegistry {
    token: CancellationToken,
    sessions: DashMap<String, SessionHandle>,
    metrics: HarvesterMetrics,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            sessions: DashMap::new(),
            metrics: HarvesterMetrics::new(),
        }
    }

    /// The token sessions of this registry must observe.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn register(&self, handle: SessionHandle) {
        info!(session = %handle.name(), "registered collection session");
        self.sessions.insert(handle.name().to_string(), handle);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop every registered session within `timeout`.
    ///
    /// On success the token is reset and the registry is empty, ready
    /// for a fresh run; the per-session results (including a fatal
    /// schema-drift failure a session may have died with earlier) are
    /// returned for reporting. A session that does not stop in time is a
    /// fatal shutdown failure: the token stays set and the caller must
    /// not proceed to analysis of the run's stores.
    pub async fn drain(
        &self,
        timeout: Duration,
    ) -> Result<Vec<(String, Result<(), SessionError>)>, DrainError> {
        let started = Instant::now();
        self.token.request_stop();

        // Snapshot first; handles are then removed one by one so the
        // iteration source is never mutated while iterated.
        let names: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        info!(sessions = names.len(), "draining collection sessions");

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let Some((_, handle)) = self.sessions.remove(&name) else {
                continue;
            };
            let remaining = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, handle.join()).await {
                Ok(result) => {
                    if let Err(ref e) = result {
                        warn!(session = %name, error = %e, "session ended with failure");
                    }
                    outcomes.push((name, result));
                }
                Err(_) => {
                    let waited = started.elapsed();
                    warn!(session = %name, ?waited, "session did not stop in time");
                    return Err(DrainError::Timeout {
                        session: name,
                        waited,
                    });
                }
            }
        }

        self.token.reset();
        self.sessions.clear();
        self.metrics
            .observe_drain_duration(started.elapsed().as_secs_f64());
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "drain complete");
        Ok(outcomes)
    }
}
