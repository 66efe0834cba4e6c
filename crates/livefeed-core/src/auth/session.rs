use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Tokens issued by the backend for one login.
///
/// The refresh token and session id outlive access-token rotations; only
/// `access_token` is replaced by a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Only issued by some backend versions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Whether the user is considered logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn,
}

/// Observable session state, owned by the `SessionController` and shared
/// with the refresher so a failed refresh can force a logout.
///
/// The generation counts session boundaries (login, logout). Work started
/// under one generation must not touch state or storage under another.
#[derive(Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<AuthState>>,
    generation: Arc<AtomicU64>,
}

impl SessionState {
    pub fn new(initial: AuthState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Start a new session generation. Must be called before storage for
    /// the new session is written or cleared.
    pub(crate) fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Set `next` only if no session boundary has passed since `generation`
    /// was read. The check runs under the channel's write lock, so a
    /// concurrent `advance` followed by `set` always wins.
    pub(crate) fn set_if_current(&self, generation: u64, next: AuthState) -> bool {
        let mut current = false;
        let mut previous = next;
        self.tx.send_if_modified(|state| {
            current = self.is_current(generation);
            previous = *state;
            if current && *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
        if current && previous != next {
            info!(from = ?previous, to = ?next, "Session state changed");
        }
        current
    }

    pub fn get(&self) -> AuthState {
        *self.tx.borrow()
    }

    pub fn set(&self, state: AuthState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(from = ?previous, to = ?state, "Session state changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(AuthState::LoggedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_wire_format() {
        let json = r#"{"accessToken":"a","refreshToken":"r","sessionId":"s"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_id.as_deref(), Some("s"));

        // Older backends omit the session id entirely
        let json = r#"{"accessToken":"a","refreshToken":"r"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_id, None);
    }

    #[tokio::test]
    async fn test_state_broadcast() {
        let state = SessionState::default();
        let mut rx = state.subscribe();
        assert_eq!(*rx.borrow(), AuthState::LoggedOut);

        state.set(AuthState::LoggedIn);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::LoggedIn);
        assert_eq!(state.get(), AuthState::LoggedIn);
    }

    #[test]
    fn test_set_if_current_ignores_older_generation() {
        let state = SessionState::new(AuthState::LoggedIn);
        let started = state.generation();

        assert!(state.set_if_current(started, AuthState::LoggedIn));

        state.advance();
        state.set(AuthState::LoggedOut);
        assert!(!state.set_if_current(started, AuthState::LoggedIn));
        assert_eq!(state.get(), AuthState::LoggedOut);
    }
}
