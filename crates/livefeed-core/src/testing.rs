//! Scripted transport for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::api::{ApiResponse, PendingRequest, Transport, TransportError};

pub(crate) const BASE_URL: &str = "http://backend.test/api";

type Handler =
    dyn Fn(&PendingRequest, Option<&str>) -> Result<ApiResponse, TransportError> + Send + Sync;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Answers every request with a closure and records what was sent.
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
    refresh_delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&PendingRequest, Option<&str>) -> Result<ApiResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            refresh_delay: None,
        }
    }

    /// Hold refresh exchanges open so concurrent callers overlap
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = Some(delay);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose URL ends with `suffix`
    pub fn count(&self, suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.url.ends_with(suffix))
            .count()
    }

    pub fn bearers(&self, suffix: &str) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.ends_with(suffix))
            .map(|c| c.bearer)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &PendingRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                method: request.method.clone(),
                url: request.url.clone(),
                bearer: bearer.map(str::to_string),
                body: request.body.clone(),
            });
        }
        if let Some(delay) = self.refresh_delay {
            if request.url.ends_with("/refresh") {
                tokio::time::sleep(delay).await;
            }
        }
        (self.handler)(request, bearer)
    }
}

pub(crate) fn json(status: StatusCode, value: serde_json::Value) -> Result<ApiResponse, TransportError> {
    Ok(ApiResponse::new(status, value.to_string()))
}

pub(crate) fn expired() -> Result<ApiResponse, TransportError> {
    json(
        StatusCode::UNAUTHORIZED,
        serde_json::json!({ "message": "Access token expired" }),
    )
}

pub(crate) fn url(path: &str) -> String {
    format!("{}/{}", BASE_URL, path)
}
