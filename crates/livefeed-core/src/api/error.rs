use reqwest::StatusCode;
use thiserror::Error;

use super::transport::{ApiResponse, TransportError};
use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a non-success response, preferring the backend's `message` field
    pub fn from_response(response: &ApiResponse) -> Self {
        let detail = response
            .message()
            .unwrap_or_else(|| Self::truncate_body(&response.body));
        Self::from_status(response.status, detail)
    }

    pub fn from_status(status: StatusCode, detail: String) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized(detail),
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            code => ApiError::Rejected {
                status: code,
                message: detail,
            },
        }
    }

    /// Whether the session has ended and the user must log in again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApiError::Auth(e) if e.is_terminal())
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Auth(AuthError::Network(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_uses_message_field() {
        let resp = ApiResponse::new(StatusCode::CONFLICT, r#"{"message":"Email already registered"}"#);
        match ApiError::from_response(&resp) {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Email already registered");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_long_bodies_truncated() {
        let body = "x".repeat(2000);
        let resp = ApiResponse::new(StatusCode::BAD_GATEWAY, body);
        let msg = ApiError::from_response(&resp).to_string();
        assert!(msg.contains("truncated, 2000 total bytes"));
        assert!(msg.len() < 700);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, String::new()),
            ApiError::NotFound(_)
        ));
        assert!(ApiError::Auth(AuthError::MissingCredentials).is_terminal());
        assert!(!ApiError::RateLimited.is_terminal());
    }
}
