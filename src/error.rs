//! Error types for the search pipeline

use thiserror::Error;

/// Everything that can go wrong between receiving a query and returning a result.
///
/// `Display` output is internal detail. Only [`SearchError::Validation`] may be
/// shown to the caller as-is; everything else goes through
/// [`crate::sanitize::sanitize_error`] first.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Bad caller input, detected before any network call
    #[error("{0}")]
    Validation(String),

    /// The upstream rejected the credential (HTTP 401)
    #[error("API authentication failed. Check your PERPLEXITY_API_KEY configuration.")]
    Authentication,

    /// HTTP 429 on every attempt
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimit {
        attempts: u32,
        retry_after: Option<String>,
    },

    /// HTTP 5xx on the final attempt
    #[error("Server error after {attempts} attempts: status {status}")]
    Server { status: u16, attempts: u32 },

    /// The request timed out on the final attempt
    #[error("Request timeout after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// Connection, DNS or reset failure on the final attempt
    #[error("Network error after {attempts} attempts")]
    Network { attempts: u32 },

    /// Anything else that went wrong on the final attempt
    #[error("Request failed after {attempts} attempts: {kind}")]
    Unexpected { kind: String, attempts: u32 },

    /// Non-retryable HTTP status other than 401
    #[error("API request failed: {message}")]
    Api { status: u16, message: String },

    /// Reply was structurally invalid
    #[error("Error parsing API response ({field}): {reason}")]
    Parse { field: String, reason: String },
}

impl SearchError {
    pub fn parse(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Category name, the only detail of a generic failure shown to callers
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Authentication => "AuthenticationError",
            Self::RateLimit { .. } => "RateLimitError",
            Self::Server { .. } => "ServerError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Network { .. } => "NetworkError",
            Self::Unexpected { .. } => "UnexpectedError",
            Self::Api { .. } => "ApiError",
            Self::Parse { .. } => "ParseError",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Attempts spent before giving up, where the variant tracks it
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RateLimit { attempts, .. }
            | Self::Server { attempts, .. }
            | Self::Timeout { attempts }
            | Self::Network { attempts }
            | Self::Unexpected { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

/// Failure as seen by the tool caller
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Bad input; the message is safe to show verbatim
    #[error("{0}")]
    InvalidInput(String),

    /// Runtime failure; the message has already been sanitized
    #[error("{0}")]
    Failed(String),
}
