//! Authenticated request gateway.
//!
//! Wraps an outbound call with bearer token attachment and a strict
//! "retry at most once, only on the expiry signal" policy. Arbitrary errors
//! are never retried: re-sending a non-idempotent call such as posting a
//! comment could duplicate it.

use std::future::Future;
use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::credentials::{CredentialField, CredentialStore};
use super::error::AuthError;
use super::refresher::TokenRefresher;
use crate::api::{ApiResponse, PendingRequest, Transport, TransportError};

/// Backend message marking an expired access token
pub const ACCESS_TOKEN_EXPIRED: &str = "Access token expired";

/// Decides whether a response means "the access token expired".
pub type ExpiryPredicate = Arc<dyn Fn(&ApiResponse) -> bool + Send + Sync>;

/// Default expiry signal: a 401 whose `message` is exactly
/// [`ACCESS_TOKEN_EXPIRED`]. Other 401s are ordinary failures.
pub fn access_token_expired(response: &ApiResponse) -> bool {
    response.status == StatusCode::UNAUTHORIZED
        && response.message().as_deref() == Some(ACCESS_TOKEN_EXPIRED)
}

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    refresher: TokenRefresher,
    is_expired: ExpiryPredicate,
    timeout_triggers_refresh: bool,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        refresher: TokenRefresher,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            is_expired: Arc::new(access_token_expired),
            timeout_triggers_refresh: true,
        }
    }

    /// Replace the expiry predicate
    pub fn with_expiry_predicate(mut self, predicate: ExpiryPredicate) -> Self {
        self.is_expired = predicate;
        self
    }

    /// Treat a timed-out first attempt like an expired token
    pub fn with_timeout_triggers_refresh(mut self, enabled: bool) -> Self {
        self.timeout_triggers_refresh = enabled;
        self
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Send `request` with the current access token, refreshing and retrying
    /// once if the backend reports the token expired.
    pub async fn authenticated_request(
        &self,
        request: PendingRequest,
    ) -> Result<ApiResponse, AuthError> {
        let transport = &self.transport;
        let request = &request;
        self.call(|token| async move { transport.send(request, Some(&token)).await })
            .await
    }

    /// The retry decorator around an arbitrary outbound call.
    ///
    /// `send` is invoked with the bearer token to use: once, or twice when
    /// the first attempt signals expiry and the refresh succeeds.
    pub async fn call<F, Fut>(&self, mut send: F) -> Result<ApiResponse, AuthError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<ApiResponse, TransportError>>,
    {
        let token = match self.store.get(CredentialField::AccessToken).await? {
            Some(token) => token,
            None => {
                debug!("No access token, refreshing before request");
                self.refresher
                    .refresh()
                    .await
                    .map_err(AuthError::from_initial_refresh)?
            }
        };

        let first = send(token.clone()).await;
        let expired = match &first {
            Ok(response) => (self.is_expired)(response),
            Err(TransportError::Timeout) => self.timeout_triggers_refresh,
            Err(_) => false,
        };
        if !expired {
            return Ok(first?);
        }

        info!("Access token rejected, refreshing once before retry");
        match self.refresher.refresh_stale(&token).await {
            Ok(fresh) => Ok(send(fresh).await?),
            Err(cause) => {
                warn!(error = %cause, "Refresh failed, request not retried");
                // The failed refresh ended the session, so both outcomes are terminal
                match first {
                    Ok(response) => Err(AuthError::ExpiredToken { response, cause }),
                    Err(_) => Err(AuthError::Unauthenticated(cause)),
                }
            }
        }
    }
}
