//! Session controller: the LoggedOut/LoggedIn state machine.
//!
//! Owns the observable [`SessionState`] and hands it to the refresher, so a
//! failed refresh anywhere forces the whole client back to `LoggedOut`.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::credentials::CredentialStore;
use super::error::{AuthError, StorageError};
use super::gateway::Gateway;
use super::refresher::TokenRefresher;
use super::session::{AuthState, Session, SessionState};
use crate::api::{ApiClient, ApiError, ApiResponse, Endpoints, HttpTransport, PendingRequest, Transport};
use crate::config::Config;
use crate::models::{LoginCredentials, SignupProfile, User};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: User,
    #[serde(flatten)]
    session: Session,
}

/// Signup may or may not log the new account in, depending on the backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupResponse {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    session_id: Option<String>,
}

impl SignupResponse {
    fn into_session(self) -> (Option<User>, Option<Session>) {
        let session = match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Some(Session {
                access_token,
                refresh_token,
                session_id: self.session_id,
            }),
            _ => None,
        };
        (self.user, session)
    }
}

/// Clone is cheap; clones share state, storage and the refresh slot.
#[derive(Clone)]
pub struct SessionController {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    state: SessionState,
    gateway: Gateway,
    api: ApiClient,
    endpoints: Endpoints,
}

impl SessionController {
    /// Build a controller from configuration, using the HTTP transport and
    /// the configured credential backend
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
        let store = config.credential_store()?;
        Ok(Self::new(transport, store, config))
    }

    pub fn new(transport: Arc<dyn Transport>, store: CredentialStore, config: &Config) -> Self {
        let endpoints = config.endpoints();
        let state = SessionState::default();
        let refresher = TokenRefresher::new(
            Arc::clone(&transport),
            store.clone(),
            state.clone(),
            &endpoints,
            config.session_id_policy,
        );
        let gateway = Gateway::new(Arc::clone(&transport), store.clone(), refresher)
            .with_timeout_triggers_refresh(config.timeout_triggers_refresh);
        let api = ApiClient::new(gateway.clone(), endpoints.clone(), store.clone());

        Self {
            transport,
            store,
            state,
            gateway,
            api,
            endpoints,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == AuthState::LoggedIn
    }

    /// Watch state transitions, e.g. to route to the login screen
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Recover the session persisted by a previous run.
    ///
    /// A stored access token means logged in. A refresh token alone is
    /// exchanged for a new access token. Anything else is logged out.
    pub async fn restore(&self) -> AuthState {
        let stored = match self.store.snapshot().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credentials");
                self.state.set(AuthState::LoggedOut);
                return AuthState::LoggedOut;
            }
        };

        let restored = if stored.access_token.is_some() {
            AuthState::LoggedIn
        } else if stored.refresh_token.is_some() {
            debug!("Only a refresh token stored, refreshing");
            match self.gateway.refresher().refresh().await {
                Ok(_) => AuthState::LoggedIn,
                Err(_) => AuthState::LoggedOut,
            }
        } else {
            AuthState::LoggedOut
        };

        self.state.set(restored);
        info!(state = ?restored, "Session restored");
        restored
    }

    /// Log in and persist the issued session
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<User, ApiError> {
        credentials.validate().map_err(ApiError::Validation)?;

        let request = PendingRequest::post(self.endpoints.login()).with_json(credentials)?;
        let response = self.transport.send(&request, None).await?;
        let response = Self::check_response(response)?;

        let payload: LoginResponse = response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;
        self.establish(&payload.session).await?;

        info!(email = %payload.user.email, "Logged in");
        Ok(payload.user)
    }

    /// Create an account and log it in
    pub async fn signup(&self, profile: &SignupProfile) -> Result<User, ApiError> {
        profile.validate().map_err(ApiError::Validation)?;

        let request = PendingRequest::post(self.endpoints.signup()).with_json(profile)?;
        let response = self.transport.send(&request, None).await?;
        let response = Self::check_response(response)?;

        // Some backends answer signup with an empty body
        let payload: SignupResponse = if response.body.trim().is_empty() {
            SignupResponse {
                user: None,
                access_token: None,
                refresh_token: None,
                session_id: None,
            }
        } else {
            response.json().map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse signup response: {}", e))
            })?
        };

        match payload.into_session() {
            (user, Some(session)) => {
                self.establish(&session).await?;
                info!(email = %profile.user.email, "Signed up");
                Ok(user.unwrap_or_else(|| profile.user.clone()))
            }
            (_, None) => {
                debug!("Signup issued no tokens, logging in");
                self.login(&profile.credentials()).await
            }
        }
    }

    /// Log out. The server-side invalidation is best effort; local
    /// credentials are cleared regardless of its outcome.
    pub async fn logout(&self) -> Result<(), StorageError> {
        if let Err(e) = self.api.logout_remote().await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.clear_local().await
    }

    /// Delete the account on the server, then drop the local session
    pub async fn delete_account(&self, email: &str) -> Result<(), ApiError> {
        self.api.delete_profile(email).await?;
        info!(email = %email, "Account deleted");
        self.clear_local().await.map_err(AuthError::from)?;
        Ok(())
    }

    /// Route a backend call through the gateway. Terminal failures leave the
    /// controller `LoggedOut`.
    pub async fn authenticated_request(
        &self,
        request: PendingRequest,
    ) -> Result<ApiResponse, AuthError> {
        let generation = self.state.generation();
        let result = self.gateway.authenticated_request(request).await;
        if let Err(ref e) = result {
            if e.is_terminal() && self.is_logged_in() {
                let state = self.state.clone();
                match self
                    .store
                    .clear_session_if(move || state.is_current(generation))
                    .await
                {
                    Ok(true) => warn!(error = %e, "Irrecoverable session failure, logged out"),
                    Ok(false) => debug!("Session replaced while request was in flight"),
                    Err(clear_err) => error!(error = %clear_err, "Failed to clear session"),
                }
                self.state.set_if_current(generation, AuthState::LoggedOut);
            }
        }
        result
    }

    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response))
        }
    }

    async fn establish(&self, session: &Session) -> Result<(), ApiError> {
        if session.access_token.is_empty() || session.refresh_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Session is missing tokens".to_string(),
            ));
        }

        self.state.advance();

        // Drop leftovers of any previous session, e.g. a linked social account
        let stored = match self.store.clear_session().await {
            Ok(()) => self.store.store_session(session).await,
            Err(e) => Err(e),
        };

        if let Err(e) = stored {
            // Never leave a half-written session behind
            if let Err(clear_err) = self.store.clear_session().await {
                error!(error = %clear_err, "Failed to roll back partially stored session");
            }
            self.state.set(AuthState::LoggedOut);
            return Err(AuthError::from(e).into());
        }

        self.state.set(AuthState::LoggedIn);
        Ok(())
    }

    async fn clear_local(&self) -> Result<(), StorageError> {
        self.state.advance();
        let result = self.store.clear_session().await;
        self.state.set(AuthState::LoggedOut);
        info!("Logged out");
        result
    }
}
