//! Core library for the Live Feed client.
//!
//! This crate owns the session lifecycle shared by every front end:
//!
//! - `auth`: credential persistence, single-flight token refresh, the
//!   authenticated request gateway, and the session controller
//! - `api`: the outbound transport and typed backend operations
//! - `models`: backend user and feed types
//! - `config`: persisted client configuration
//!
//! Front ends call `SessionController::login` / `signup` / `logout` and route
//! every other backend call through the gateway, observing `AuthState` to
//! decide whether to show the login screen.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, ApiResponse, HttpTransport, PendingRequest, Transport, TransportError};
pub use auth::{
    AuthError, AuthState, CredentialField, CredentialStore, Gateway, RefreshError, Session,
    SessionController, SessionIdPolicy, TokenRefresher,
};
pub use config::{Config, CredentialBackend};
pub use models::{LoginCredentials, Post, SignupProfile, SocialAccountLink, User};
