//! Session and authentication core.
//!
//! This module provides:
//! - `CredentialStore`: durable storage of session fields (keychain, file, memory)
//! - `TokenRefresher`: single-flight access token refresh, fail-closed
//! - `Gateway`: bearer attachment with one refresh-and-retry on expiry
//! - `SessionController`: login/signup/logout and observable `AuthState`

pub mod controller;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod refresher;
pub mod session;

pub use controller::SessionController;
pub use credentials::{
    CredentialField, CredentialStore, FileStore, KeyringStore, MemoryStore, SecretStore,
    StoredCredentials,
};
pub use error::{AuthError, RefreshError, StorageError};
pub use gateway::{access_token_expired, ExpiryPredicate, Gateway, ACCESS_TOKEN_EXPIRED};
pub use refresher::{SessionIdPolicy, TokenRefresher};
pub use session::{AuthState, Session, SessionState};
