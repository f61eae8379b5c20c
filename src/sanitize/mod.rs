//! Boundary sanitizer
//!
//! Last stage before a result reaches the calling agent: drops citations
//! whose URL is not plain `http`/`https`, and replaces internal error detail
//! with fixed messages so credentials and internals never leak.

use crate::error::SearchError;
use crate::search::Citation;
use tracing::{error, warn};
use url::Url;

pub const AUTH_FAILED_MESSAGE: &str =
    "API authentication failed. Check your PERPLEXITY_API_KEY configuration.";
pub const TIMEOUT_MESSAGE: &str =
    "Request timed out. Please try again or check your network connection.";
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please wait a moment and try again.";

const CREDENTIAL_TERMS: [&str; 2] = ["api_key", "api key"];

/// Whether `url` is an absolute URL with an `http` or `https` scheme
pub fn is_safe_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    match Url::parse(url) {
        // `Url` lowercases the scheme while parsing
        Ok(parsed) => {
            let ok = matches!(parsed.scheme(), "http" | "https");
            if !ok {
                warn!("Invalid URL scheme detected: {} (URL sanitized)", parsed.scheme());
            }
            ok
        }
        Err(e) => {
            warn!("URL validation error: {}", e);
            false
        }
    }
}

/// Keep only citations with safe URLs, preserving order and indices
pub fn sanitize_citations(citations: Vec<Citation>) -> Vec<Citation> {
    citations
        .into_iter()
        .filter(|citation| {
            let keep = is_safe_url(&citation.url);
            if !keep {
                warn!(
                    "Removed citation with invalid URL: {}...",
                    truncate(&citation.url, 50)
                );
            }
            keep
        })
        .collect()
}

/// Map an internal error to a fixed, caller-safe message
pub fn sanitize_error(err: &SearchError) -> String {
    let text = err.to_string().to_lowercase();

    if CREDENTIAL_TERMS.iter().any(|term| text.contains(term)) {
        return AUTH_FAILED_MESSAGE.to_string();
    }

    if text.contains("timeout") {
        return TIMEOUT_MESSAGE.to_string();
    }

    if text.contains("rate limit") {
        return RATE_LIMIT_MESSAGE.to_string();
    }

    error!("Error sanitized for client: {}: {}", err.category(), err);

    format!("An error occurred: {}. Please try again.", err.category())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "pplx-LEAKME0123456789abcdef";

    #[test]
    fn test_safe_urls() {
        assert!(is_safe_url("https://example.com"));
        assert!(is_safe_url("http://example.com/a?b=c"));
        assert!(is_safe_url("HTTPS://EXAMPLE.COM"));
    }

    #[test]
    fn test_unsafe_urls() {
        for url in [
            "javascript:alert(1)",
            "file:///etc/passwd",
            "data:text/html,<script>",
            "ftp://example.com",
            "example.com/no-scheme",
            "",
        ] {
            assert!(!is_safe_url(url), "{} should be rejected", url);
        }
    }

    #[test]
    fn test_sanitize_citations_keeps_order_and_indices() {
        let citations = vec![
            Citation::new(1, "https://example.com"),
            Citation::new(2, "javascript:alert(1)"),
            Citation::new(3, "http://b.org"),
        ];
        let kept = sanitize_citations(citations);
        let indices: Vec<u32> = kept.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn test_authentication_message() {
        assert_eq!(sanitize_error(&SearchError::Authentication), AUTH_FAILED_MESSAGE);
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            sanitize_error(&SearchError::Timeout { attempts: 3 }),
            TIMEOUT_MESSAGE
        );
    }

    #[test]
    fn test_rate_limit_message() {
        let err = SearchError::RateLimit {
            attempts: 3,
            retry_after: Some("10".into()),
        };
        assert_eq!(sanitize_error(&err), RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn test_generic_message_names_only_category() {
        let err = SearchError::Api {
            status: 400,
            message: "model /srv/internal/models.yaml not found".into(),
        };
        let msg = sanitize_error(&err);
        assert_eq!(msg, "An error occurred: ApiError. Please try again.");
        assert!(!msg.contains("/srv"));
    }

    #[test]
    fn test_credential_never_echoed() {
        let errors = vec![
            SearchError::Api {
                status: 400,
                message: format!("Invalid key {}", KEY),
            },
            SearchError::Api {
                status: 403,
                message: format!("api key {} revoked", KEY),
            },
            SearchError::Parse {
                field: KEY.into(),
                reason: format!("timeout for {}", KEY),
            },
            SearchError::Unexpected {
                kind: format!("rate limit {}", KEY),
                attempts: 3,
            },
            SearchError::Validation(KEY.into()),
            SearchError::Network { attempts: 3 },
            SearchError::Server {
                status: 500,
                attempts: 3,
            },
        ];

        for err in errors {
            let msg = sanitize_error(&err);
            assert!(!msg.contains(KEY), "{:?} leaked into {}", err, msg);
            assert!(!msg.contains("LEAKME"));
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("ééé", 2), "éé");
        assert_eq!(truncate("abc", 50), "abc");
    }
}
