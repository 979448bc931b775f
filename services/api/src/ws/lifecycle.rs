//! Lifecycle state shared between a session's inbound and outbound loops.

use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Connecting = 1,
    Active = 2,
    Closing = 3,
    Closed = 4,
    Failed = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Active,
            3 => Self::Closing,
            4 => Self::Closed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An atomically updated [`SessionState`] that wakes waiters on every change.
///
/// This is the only mutable state the two loops of a session share.
#[derive(Debug)]
pub struct StateCell {
    value: AtomicU8,
    changed: Notify,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            value: AtomicU8::new(SessionState::Idle as u8),
            changed: Notify::new(),
        }
    }
}

impl StateCell {
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.value.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.get() == SessionState::Active
    }

    /// Moves from `from` to `to`, returning `false` if the state was not `from`.
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self
            .value
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved {
            self.changed.notify_waiters();
        }
        moved
    }

    /// Marks an active session as failed after a send or receive error.
    pub fn degrade(&self) -> bool {
        self.transition(SessionState::Active, SessionState::Failed)
    }

    pub fn set(&self, to: SessionState) {
        self.value.store(to as u8, Ordering::Release);
        self.changed.notify_waiters();
    }

    /// Resolves once the state is anything other than `Active`.
    pub async fn deactivated(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn test_transition_requires_expected_state() {
        let cell = StateCell::default();
        assert_eq!(cell.get(), SessionState::Idle);

        assert!(!cell.transition(SessionState::Active, SessionState::Closing));
        assert!(cell.transition(SessionState::Idle, SessionState::Connecting));
        assert!(cell.transition(SessionState::Connecting, SessionState::Active));
        assert!(cell.is_active());

        assert!(cell.degrade());
        assert_eq!(cell.get(), SessionState::Failed);
        assert!(!cell.degrade(), "degrading twice has no effect");
    }

    #[tokio::test]
    async fn test_deactivated_wakes_on_change() {
        let cell = Arc::new(StateCell::default());
        cell.set(SessionState::Active);

        let waiter = tokio::spawn({
            let cell = cell.clone();
            async move { cell.deactivated().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        cell.degrade();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_deactivated_returns_immediately_when_inactive() {
        let cell = StateCell::default();
        cell.deactivated().await;
    }
}
