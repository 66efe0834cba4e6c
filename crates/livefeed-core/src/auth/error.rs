use thiserror::Error;

use crate::api::{ApiResponse, TransportError};

/// Credential storage failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Credential storage error: {0}")]
pub struct StorageError(pub String);

impl StorageError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Outcome of a failed refresh exchange.
///
/// Cloneable because every caller waiting on the same in-flight refresh
/// receives its own copy of the result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token or session ID available")]
    MissingCredentials,

    #[error("Refresh rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A login or logout happened while the exchange was running; its
    /// outcome was discarded.
    #[error("Session changed during refresh")]
    Superseded,
}

/// Failure of an authenticated operation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No access token and no refresh material; nothing was sent.
    #[error("Not logged in")]
    MissingCredentials,

    /// No access token and the silent refresh failed; nothing was sent.
    #[error("Authentication failed: {0}")]
    Unauthenticated(RefreshError),

    /// The backend reported an expired token and the refresh failed.
    /// Carries the original response.
    #[error("Session expired: {cause}")]
    ExpiredToken {
        response: ApiResponse,
        cause: RefreshError,
    },

    #[error(transparent)]
    Network(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Map a refresh failure that happened before any request was sent
    pub(crate) fn from_initial_refresh(err: RefreshError) -> Self {
        match err {
            RefreshError::MissingCredentials => AuthError::MissingCredentials,
            other => AuthError::Unauthenticated(other),
        }
    }

    /// Whether this failure ends the session. Terminal failures should send
    /// the user back to the login screen; the rest are retryable.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredentials
                | AuthError::Unauthenticated(_)
                | AuthError::ExpiredToken { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_initial_refresh_mapping() {
        assert!(matches!(
            AuthError::from_initial_refresh(RefreshError::MissingCredentials),
            AuthError::MissingCredentials
        ));
        assert!(matches!(
            AuthError::from_initial_refresh(RefreshError::Transport(TransportError::Timeout)),
            AuthError::Unauthenticated(RefreshError::Transport(TransportError::Timeout))
        ));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(AuthError::MissingCredentials.is_terminal());
        assert!(AuthError::ExpiredToken {
            response: ApiResponse::new(StatusCode::UNAUTHORIZED, "{}"),
            cause: RefreshError::MissingCredentials,
        }
        .is_terminal());
        assert!(!AuthError::Network(TransportError::Timeout).is_terminal());
        assert!(!AuthError::InvalidResponse("bad".into()).is_terminal());
    }
}
