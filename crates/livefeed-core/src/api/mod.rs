//! Backend API access.
//!
//! `transport` holds the outbound-call primitive, `client` the typed
//! backend operations that run through the authenticated gateway.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use endpoints::{Endpoints, DEFAULT_API_BASE_URL};
pub use error::ApiError;
pub use transport::{
    ApiResponse, HttpTransport, PendingRequest, Transport, TransportError,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
