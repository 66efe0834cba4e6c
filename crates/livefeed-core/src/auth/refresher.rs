//! Single-flight access token refresh.
//!
//! At most one refresh exchange runs per process. Callers arriving while one
//! is in flight await the same shared future instead of starting a second
//! exchange, which would spend the refresh token twice and race the backend's
//! rotation bookkeeping.
//!
//! Any failure is fail-closed: the whole session is cleared from storage and
//! the state drops to `LoggedOut`, so no stale half-session survives.
//!
//! An exchange belongs to the session generation it started in. If a login
//! or logout happens before it finishes, its outcome is discarded: the new
//! session is neither overwritten nor cleared.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::credentials::{CredentialField, CredentialStore};
use super::error::RefreshError;
use super::session::{AuthState, SessionState};
use crate::api::{Endpoints, PendingRequest, Transport};

/// Whether the backend needs a session id alongside the refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIdPolicy {
    /// Send the session id when one is stored
    #[default]
    Optional,
    /// Refuse to refresh without a session id
    Required,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// An in-flight exchange and the session generation it runs for
type InFlight = (u64, RefreshFuture);

struct Exchange {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    state: SessionState,
    refresh_url: String,
    policy: SessionIdPolicy,
}

impl Exchange {
    /// Run one exchange on behalf of session `generation`. Side effects are
    /// applied only while that generation is still current.
    async fn run(&self, generation: u64) -> Result<String, RefreshError> {
        let result = match self.exchange(generation).await {
            Ok(token) if self.state.set_if_current(generation, AuthState::LoggedIn) => Ok(token),
            Ok(_) => Err(RefreshError::Superseded),
            Err(err) => Err(err),
        };

        match result {
            Ok(token) => {
                info!("Access token refreshed");
                Ok(token)
            }
            Err(RefreshError::Superseded) => {
                debug!("Session changed during refresh, discarding result");
                Err(RefreshError::Superseded)
            }
            Err(err) => {
                let state = self.state.clone();
                match self
                    .store
                    .clear_session_if(move || state.is_current(generation))
                    .await
                {
                    Ok(true) => warn!(error = %err, "Token refresh failed, session cleared"),
                    Ok(false) => {
                        debug!(error = %err, "Token refresh failed for an ended session");
                        return Err(RefreshError::Superseded);
                    }
                    Err(e) => error!(error = %e, "Failed to clear session after refresh failure"),
                }
                self.state.set_if_current(generation, AuthState::LoggedOut);
                Err(err)
            }
        }
    }

    async fn exchange(&self, generation: u64) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .get(CredentialField::RefreshToken)
            .await?
            .ok_or(RefreshError::MissingCredentials)?;
        let session_id = self.store.get(CredentialField::SessionId).await?;
        if session_id.is_none() && self.policy == SessionIdPolicy::Required {
            return Err(RefreshError::MissingCredentials);
        }

        let body = RefreshRequest {
            refresh_token: &refresh_token,
            session_id: session_id.as_deref(),
        };
        let request = PendingRequest::post(&self.refresh_url).with_json(&body)?;

        debug!(with_session_id = session_id.is_some(), "Exchanging refresh token");
        let response = self.transport.send(&request, None).await?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
                message: response
                    .message()
                    .unwrap_or_else(|| "Refresh failed".to_string()),
            });
        }

        let payload: RefreshResponse = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
        if payload.access_token.is_empty() {
            return Err(RefreshError::InvalidResponse(
                "empty access token".to_string(),
            ));
        }

        let state = self.state.clone();
        let written = self
            .store
            .set_if(CredentialField::AccessToken, &payload.access_token, move || {
                state.is_current(generation)
            })
            .await?;
        if !written {
            return Err(RefreshError::Superseded);
        }
        Ok(payload.access_token)
    }
}

/// Exchanges the stored refresh token for a new access token.
/// Clone is cheap; clones share the in-flight slot.
#[derive(Clone)]
pub struct TokenRefresher {
    exchange: Arc<Exchange>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
}

impl TokenRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        state: SessionState,
        endpoints: &Endpoints,
        policy: SessionIdPolicy,
    ) -> Self {
        Self {
            exchange: Arc::new(Exchange {
                transport,
                store,
                state,
                refresh_url: endpoints.refresh(),
                policy,
            }),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Refresh the access token, joining an in-flight refresh if there is one
    /// for the current session
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let generation = self.exchange.state.generation();
        let shared = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some((started, pending)) if *started == generation => {
                    debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                _ => {
                    let exchange = Arc::clone(&self.exchange);
                    let fut = async move { exchange.run(generation).await }
                        .boxed()
                        .shared();
                    *slot = Some((generation, fut.clone()));
                    fut
                }
            }
        };

        let result = shared.clone().await;

        // First waiter to finish empties the slot; later waiters find either
        // nothing or a newer refresh, which they must not clear.
        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|(_, current)| current.ptr_eq(&shared)) {
            *slot = None;
        }
        result
    }

    /// Refresh after `used_token` was rejected.
    ///
    /// If the stored access token already differs from `used_token`, another
    /// caller rotated it in the meantime and it is returned without a new
    /// exchange.
    pub async fn refresh_stale(&self, used_token: &str) -> Result<String, RefreshError> {
        if let Ok(Some(current)) = self.exchange.store.get(CredentialField::AccessToken).await {
            if current != used_token {
                debug!("Access token already rotated by another request");
                return Ok(current);
            }
        }
        self.refresh().await
    }
}
