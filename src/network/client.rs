//! HTTP client for the Perplexity chat completions API

use super::transport::{ApiResponse, ChatTransport, TransportFailure};
use crate::config::{ApiSettings, Credentials};
use crate::search::RequestBody;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client wrapper holding the shared connection pool.
///
/// Built once at startup; cloning shares the same pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client authenticated with `credentials`
    pub fn new(settings: &ApiSettings, credentials: &Credentials) -> Result<Self> {
        let timeout = settings.timeout();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credentials.api_key()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&user_agent())?);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Parse response into ApiResponse
    async fn parse_response(response: Response) -> Result<ApiResponse, TransportFailure> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        let text = response.text().await.map_err(classify)?;

        Ok(ApiResponse {
            status,
            headers,
            text,
        })
    }
}

#[async_trait]
impl ChatTransport for HttpClient {
    async fn send(&self, body: &RequestBody) -> Result<ApiResponse, TransportFailure> {
        debug!("POST {} (model: {})", self.endpoint, body.model);

        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        Self::parse_response(response).await
    }
}

/// Map a reqwest error to a failure kind without keeping its text
fn classify(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Network("connect")
    } else if err.is_request() {
        TransportFailure::Network("request")
    } else if err.is_body() || err.is_decode() {
        TransportFailure::Unexpected("body")
    } else if err.is_builder() {
        TransportFailure::Unexpected("builder")
    } else {
        TransportFailure::Unexpected("unknown")
    }
}

fn user_agent() -> String {
    format!("perplexity-mcp/{}", crate::VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::PayloadBuilder;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "pplx-test0123456789abcdef";

    fn client_for(server: &MockServer, timeout: f64) -> HttpClient {
        let settings = ApiSettings {
            api_key: KEY.to_string(),
            endpoint: format!("{}/chat/completions", server.uri()),
            request_timeout: timeout,
            ..Default::default()
        };
        let credentials = Credentials::from_settings(&settings).unwrap();
        HttpClient::new(&settings, &credentials).unwrap()
    }

    #[tokio::test]
    async fn test_out_of_range_timeout_is_clamped() {
        let server = MockServer::start().await;
        assert_eq!(
            client_for(&server, f64::INFINITY).timeout(),
            Duration::from_secs(3600)
        );
        assert_eq!(client_for(&server, -1.0).timeout(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_sends_bearer_and_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", format!("Bearer {}", KEY).as_str()))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "model": "sonar-pro",
                "max_tokens": 4096,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "abc")
                    .set_body_json(serde_json::json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 5.0);
        let body = PayloadBuilder::default().build("hello", "sonar-pro", None, None);
        let response = client.send(&body).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-Request-Id"), Some("abc"));
        assert_eq!(response.json().unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_a_transport_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let client = client_for(&server, 5.0);
        let body = PayloadBuilder::default().build("q", "sonar", None, None);
        let response = client.send(&body).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.text, "busy");
    }

    #[tokio::test]
    async fn test_timeout_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = client_for(&server, 0.05);
        let body = PayloadBuilder::default().build("q", "sonar", None, None);
        assert_eq!(client.send(&body).await.unwrap_err(), TransportFailure::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_classified_as_network() {
        let settings = ApiSettings {
            api_key: KEY.to_string(),
            endpoint: "http://127.0.0.1:9/chat/completions".to_string(),
            request_timeout: 5.0,
            ..Default::default()
        };
        let credentials = Credentials::from_settings(&settings).unwrap();
        let client = HttpClient::new(&settings, &credentials).unwrap();

        let body = PayloadBuilder::default().build("q", "sonar", None, None);
        assert!(matches!(
            client.send(&body).await.unwrap_err(),
            TransportFailure::Network(_)
        ));
    }
}
