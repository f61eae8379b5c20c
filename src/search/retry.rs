//! Bounded-retry execution of one chat completions call
//!
//! Every call walks `Attempting(1) .. Attempting(max)` and ends in either a
//! decoded JSON reply or a classified [`SearchError`]. Retryable failures
//! (429, 5xx, timeouts, network and unexpected failures) wait
//! `initial_delay * multiplier^(n-1)` before attempt `n+1`; there is no wait
//! after the last attempt. 401 and other statuses end the call at once.

use super::payload::RequestBody;
use crate::config::{clamp_secs, SearchSettings};
use crate::error::SearchError;
use crate::network::{ApiResponse, ChatTransport, TransportFailure};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt ceiling
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Growth factor for the delay
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Longest single backoff wait
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Retry schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
        }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(
            settings.max_attempts,
            clamp_secs(settings.initial_retry_delay, Duration::ZERO, MAX_RETRY_DELAY),
            settings.backoff_multiplier,
        )
    }

    /// Wait after failed attempt `attempt` (1-based), before the next one.
    ///
    /// Capped at [`MAX_RETRY_DELAY`]; a non-finite or negative product waits zero
    /// or the cap rather than panicking.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        clamp_secs(secs, Duration::ZERO, MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, INITIAL_RETRY_DELAY, BACKOFF_MULTIPLIER)
    }
}

/// Outcome of a single attempt that did not produce a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// HTTP 401
    Unauthorized,
    /// HTTP 429
    RateLimited { retry_after: Option<String> },
    /// HTTP 5xx
    ServerError(u16),
    /// Any other non-200 status
    Rejected { status: u16, message: String },
    Timeout,
    Network(&'static str),
    Unexpected(&'static str),
}

impl AttemptFailure {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unauthorized | Self::Rejected { .. })
    }

    /// Terminal error for a call that stopped after `attempts` attempts
    pub fn into_error(self, attempts: u32) -> SearchError {
        match self {
            Self::Unauthorized => SearchError::Authentication,
            Self::RateLimited { retry_after } => SearchError::RateLimit {
                attempts,
                retry_after,
            },
            Self::ServerError(status) => SearchError::Server { status, attempts },
            Self::Rejected { status, message } => SearchError::Api { status, message },
            Self::Timeout => SearchError::Timeout { attempts },
            Self::Network(_) => SearchError::Network { attempts },
            Self::Unexpected(kind) => SearchError::Unexpected {
                kind: kind.to_string(),
                attempts,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Unauthorized => "authentication failed".to_string(),
            Self::RateLimited { retry_after } => format!(
                "rate limit exceeded (retry after: {} seconds)",
                retry_after.as_deref().unwrap_or("unknown")
            ),
            Self::ServerError(status) => format!("server error (status {})", status),
            Self::Rejected { status, .. } => format!("request rejected (status {})", status),
            Self::Timeout => "request timed out".to_string(),
            Self::Network(kind) => format!("network error ({})", kind),
            Self::Unexpected(kind) => format!("unexpected error ({})", kind),
        }
    }
}

impl From<TransportFailure> for AttemptFailure {
    fn from(failure: TransportFailure) -> Self {
        match failure {
            TransportFailure::Timeout => Self::Timeout,
            TransportFailure::Network(kind) => Self::Network(kind),
            TransportFailure::Unexpected(kind) => Self::Unexpected(kind),
        }
    }
}

/// Classify an HTTP reply: a decoded body on 200, a failure otherwise
pub fn classify_response(response: ApiResponse) -> Result<Value, AttemptFailure> {
    match response.status {
        200 => response
            .json()
            .map_err(|_| AttemptFailure::Unexpected("invalid json body")),
        401 => Err(AttemptFailure::Unauthorized),
        429 => Err(AttemptFailure::RateLimited {
            retry_after: response.header("retry-after").map(ToString::to_string),
        }),
        status if status >= 500 => Err(AttemptFailure::ServerError(status)),
        status => Err(AttemptFailure::Rejected {
            status,
            message: response
                .error_message()
                .unwrap_or_else(|| format!("HTTP {}", status)),
        }),
    }
}

/// Per-call retry bookkeeping. Lives only as long as one `execute`.
#[derive(Debug, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub last_failure: Option<AttemptFailure>,
}

impl RetryState {
    fn describe_last(&self) -> String {
        self.last_failure
            .as_ref()
            .map(AttemptFailure::describe)
            .unwrap_or_else(|| "no failure recorded".to_string())
    }

    /// Terminal error built from the last recorded failure
    pub fn into_error(self) -> SearchError {
        match self.last_failure {
            Some(failure) => failure.into_error(self.attempt),
            None => SearchError::Unexpected {
                kind: "no attempt made".to_string(),
                attempts: self.attempt,
            },
        }
    }
}

/// A decoded reply and the number of attempts it took
#[derive(Debug, Clone)]
pub struct Execution {
    pub reply: Value,
    pub attempts: u32,
}

/// Drives a [`ChatTransport`] through the retry schedule
#[derive(Clone)]
pub struct RetryingTransport {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(transport: Arc<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Same transport, different schedule
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            transport: self.transport.clone(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `body`, retrying retryable failures until the attempt ceiling
    pub async fn execute(&self, body: &RequestBody) -> Result<Execution, SearchError> {
        let max = self.policy.max_attempts;
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            debug!("API request attempt {}/{}", state.attempt, max);

            let outcome = match self.transport.send(body).await {
                Ok(response) => classify_response(response),
                Err(failure) => Err(failure.into()),
            };

            let failure = match outcome {
                Ok(reply) => {
                    return Ok(Execution {
                        reply,
                        attempts: state.attempt,
                    })
                }
                Err(failure) => failure,
            };

            let retryable = failure.is_retryable();
            state.last_failure = Some(failure);

            if !retryable || state.attempt >= max {
                if retryable {
                    warn!(
                        "Giving up after {} attempts: {}",
                        state.attempt,
                        state.describe_last()
                    );
                }
                return Err(state.into_error());
            }

            let delay = self.policy.delay_after(state.attempt);
            warn!(
                "Attempt {}/{} failed: {}. Retrying in {:.2}s...",
                state.attempt,
                max,
                state.describe_last(),
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::PayloadBuilder;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Replays a fixed script of outcomes, one per attempt
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<ApiResponse, TransportFailure>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<ApiResponse, TransportFailure>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _body: &RequestBody) -> Result<ApiResponse, TransportFailure> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn ok() -> Result<ApiResponse, TransportFailure> {
        Ok(ApiResponse::new(200, r#"{"choices": []}"#))
    }

    fn status(code: u16) -> Result<ApiResponse, TransportFailure> {
        Ok(ApiResponse::new(code, ""))
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10), 2.0)
    }

    fn body() -> RequestBody {
        PayloadBuilder::default().build("q", "sonar-pro", None, None)
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_never_panics_on_extreme_settings() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), 1e200);
        assert_eq!(policy.delay_after(3), MAX_RETRY_DELAY);
        assert_eq!(policy.delay_after(u32::MAX), MAX_RETRY_DELAY);

        let policy = RetryPolicy::new(3, Duration::from_secs(1), f64::NAN);
        assert_eq!(policy.delay_after(2), Duration::ZERO);

        let policy = RetryPolicy::new(3, Duration::from_secs(1), -2.0);
        assert_eq!(policy.delay_after(2), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_extreme_settings() {
        let settings = SearchSettings {
            initial_retry_delay: f64::INFINITY,
            backoff_multiplier: 1e200,
            ..Default::default()
        };
        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy.initial_delay, MAX_RETRY_DELAY);
        assert_eq!(policy.delay_after(3), MAX_RETRY_DELAY);

        let settings = SearchSettings {
            initial_retry_delay: -1.0,
            ..Default::default()
        };
        assert_eq!(RetryPolicy::from_settings(&settings).initial_delay, Duration::ZERO);
    }

    #[test]
    fn test_retry_state_keeps_last_failure() {
        let state = RetryState {
            attempt: 2,
            last_failure: Some(AttemptFailure::ServerError(502)),
        };
        assert_eq!(state.describe_last(), "server error (status 502)");
        assert_eq!(
            state.into_error(),
            SearchError::Server {
                status: 502,
                attempts: 2
            }
        );
        assert!(matches!(
            RetryState::default().into_error(),
            SearchError::Unexpected { attempts: 0, .. }
        ));
    }

    #[test]
    fn test_policy_never_below_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, 2.0).max_attempts, 1);
    }

    #[test]
    fn test_classification() {
        assert!(classify_response(ApiResponse::new(200, "{}")).is_ok());
        assert_eq!(
            classify_response(ApiResponse::new(200, "not json")).unwrap_err(),
            AttemptFailure::Unexpected("invalid json body")
        );
        assert_eq!(
            classify_response(ApiResponse::new(401, "")).unwrap_err(),
            AttemptFailure::Unauthorized
        );
        assert_eq!(
            classify_response(ApiResponse::new(429, "").with_header("Retry-After", "7"))
                .unwrap_err(),
            AttemptFailure::RateLimited {
                retry_after: Some("7".to_string())
            }
        );
        assert_eq!(
            classify_response(ApiResponse::new(502, "")).unwrap_err(),
            AttemptFailure::ServerError(502)
        );
        assert_eq!(
            classify_response(ApiResponse::new(
                400,
                r#"{"error": {"message": "Invalid model 'x'"}}"#
            ))
            .unwrap_err(),
            AttemptFailure::Rejected {
                status: 400,
                message: "Invalid model 'x'".to_string()
            }
        );
        assert_eq!(
            classify_response(ApiResponse::new(404, "nope")).unwrap_err(),
            AttemptFailure::Rejected {
                status: 404,
                message: "HTTP 404".to_string()
            }
        );
        // 2xx other than 200 is not treated as success
        assert!(!classify_response(ApiResponse::new(204, "")).unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let transport = ScriptedTransport::new(vec![ok()]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let execution = retrying.execute(&body()).await.unwrap();
        assert_eq!(execution.attempts, 1);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_not_retried() {
        let transport = ScriptedTransport::new(vec![status(401)]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let err = retrying.execute(&body()).await.unwrap_err();
        assert_eq!(err, SearchError::Authentication);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(ApiResponse::new(
            400,
            r#"{"error": {"message": "bad request"}}"#,
        ))]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let err = retrying.execute(&body()).await.unwrap_err();
        assert_eq!(
            err,
            SearchError::Api {
                status: 400,
                message: "bad request".to_string()
            }
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let transport = ScriptedTransport::new(vec![status(429), status(429), ok()]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let start = Instant::now();
        let execution = retrying.execute(&body()).await.unwrap();
        assert_eq!(execution.attempts, 3);
        assert_eq!(transport.calls(), 3);
        // 10ms + 20ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_attempts() {
        let transport = ScriptedTransport::new(vec![status(500), status(502), status(503)]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let err = retrying.execute(&body()).await.unwrap_err();
        assert_eq!(
            err,
            SearchError::Server {
                status: 503,
                attempts: 3
            }
        );
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausted() {
        let transport = ScriptedTransport::new(vec![status(429), status(429), status(429)]);
        let retrying = RetryingTransport::new(transport, fast_policy());

        let err = retrying.execute(&body()).await.unwrap_err();
        assert!(matches!(err, SearchError::RateLimit { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_transport_failures_retried_and_classified() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportFailure::Network("connect")),
            Err(TransportFailure::Unexpected("body")),
            Err(TransportFailure::Timeout),
        ]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        let err = retrying.execute(&body()).await.unwrap_err();
        assert_eq!(err, SearchError::Timeout { attempts: 3 });
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_unexpected_failure_is_its_own_variant() {
        let transport = ScriptedTransport::new(vec![Err(TransportFailure::Unexpected("body"))]);
        let retrying = RetryingTransport::new(
            transport,
            RetryPolicy::new(1, Duration::ZERO, 2.0),
        );

        let err = retrying.execute(&body()).await.unwrap_err();
        assert_eq!(
            err,
            SearchError::Unexpected {
                kind: "body".to_string(),
                attempts: 1
            }
        );
    }

    #[tokio::test]
    async fn test_retry_then_non_retryable_stops() {
        let transport = ScriptedTransport::new(vec![status(503), status(401)]);
        let retrying = RetryingTransport::new(transport.clone(), fast_policy());

        assert_eq!(
            retrying.execute(&body()).await.unwrap_err(),
            SearchError::Authentication
        );
        assert_eq!(transport.calls(), 2);
    }
}
