//! Transport seam between the retry loop and the HTTP stack

use crate::search::RequestBody;
use async_trait::async_trait;
use std::collections::HashMap;

/// Raw HTTP reply from the upstream API
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers, lowercased names
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
}

impl ApiResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            text: text.into(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_lowercase(), value.into());
        self
    }

    /// Parse response as JSON
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.text)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(String::as_str)
    }

    /// `error.message` from a JSON error body, if there is one
    pub fn error_message(&self) -> Option<String> {
        let body = self.json().ok()?;
        body.get("error")?
            .get("message")?
            .as_str()
            .map(ToString::to_string)
    }
}

/// Failure below the HTTP status level.
///
/// Variants carry a short kind label only, never the underlying error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The request exceeded its timeout
    Timeout,
    /// Connect, DNS, or connection reset
    Network(&'static str),
    /// Anything else
    Unexpected(&'static str),
}

/// Sends one request body and returns the raw reply
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, body: &RequestBody) -> Result<ApiResponse, TransportFailure>;
}
