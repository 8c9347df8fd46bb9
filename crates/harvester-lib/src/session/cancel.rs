//! Cooperative cancellation
//!
//! One token is shared by one owner (writer) and its sessions (readers).
//! The flag only ever moves Running -> StopRequested during a run; the
//! owner resets it after a successful drain so the registry can host a
//! fresh run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Running,
    StopRequested,
}

/// Shared stop flag with a notifier so sleeping sessions wake as soon as
/// stop is requested instead of finishing their interval.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Default)]
struct TokenInner {
    stop_requested: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TokenState {
        if self.is_stop_requested() {
            TokenState::StopRequested
        } else {
            TokenState::Running
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    /// Request stop and wake every waiting session.
    pub fn request_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Return the token to `Running` after all sessions stopped.
    pub fn reset(&self) {
        self.inner.stop_requested.store(false, Ordering::SeqCst);
    }

    /// Resolves once stop has been requested. Resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        loop {
            if self.is_stop_requested() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Re-check after arming the notifier: a request_stop between
            // the first check and notified() would otherwise be missed.
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_token_state_transitions() {
        let token = CancellationToken::new();
        assert_eq!(token.state(), TokenState::Running);

        token.request_stop();
        assert_eq!(token.state(), TokenState::StopRequested);
        assert!(token.is_stop_requested());

        token.reset();
        assert_eq!(token.state(), TokenState::Running);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let reader = token.clone();

        token.request_stop();
        assert!(reader.is_stop_requested());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_stopped() {
        let token = CancellationToken::new();
        token.request_stop();

        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("cancelled() should not block on a stopped token");
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiting_task() {
        let token = CancellationToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.request_stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake promptly")
            .expect("waiter task should not panic");
    }
}
