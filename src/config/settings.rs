//! Settings structures for perplexity-mcp configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default Perplexity chat completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

/// Default answer model
pub const DEFAULT_MODEL: &str = "sonar-pro";

/// Main settings structure, loadable from settings.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable source
    pub fn merge_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = var("PERPLEXITY_API_KEY") {
            self.api.api_key = val;
        }
        if let Some(val) = var("PERPLEXITY_API_URL") {
            self.api.endpoint = val;
        }
        if let Some(val) = var("DEFAULT_MODEL") {
            if !val.trim().is_empty() {
                self.api.default_model = val;
            }
        }
        if let Some(val) = var("CACHE_ENABLED") {
            self.cache.enabled = val.eq_ignore_ascii_case("true");
        }
        if let Some(val) = var("LOG_LEVEL") {
            self.logging.level = val.to_lowercase();
        }
        if let Some(val) = var("PERPLEXITY_MCP_TRANSPORT") {
            if let Some(transport) = Transport::parse(&val) {
                self.server.transport = transport;
            }
        }
        if let Some(val) = var("PERPLEXITY_MCP_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("PERPLEXITY_MCP_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
    }
}

/// Upstream API settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Bearer credential, normally supplied through PERPLEXITY_API_KEY
    pub api_key: String,
    /// Chat completions endpoint
    pub endpoint: String,
    /// Model used when the caller does not name one
    pub default_model: String,
    /// Overall per-request timeout in seconds
    pub request_timeout: f64,
}

impl ApiSettings {
    /// Per-request timeout, kept within one millisecond and one hour
    pub fn timeout(&self) -> Duration {
        clamp_secs(
            self.request_timeout,
            Duration::from_millis(1),
            Duration::from_secs(3600),
        )
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            request_timeout: 60.0,
        }
    }
}

// Hand-written so the key never reaches a log line through `{:?}`.
impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key", &mask_secret(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Search pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Maximum query length in characters
    pub max_query_length: usize,
    /// Attempt ceiling for the retry loop
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds
    pub initial_retry_delay: f64,
    /// Growth factor applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Answer token budget sent with every request
    pub max_tokens: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_query_length: 10_000,
            max_attempts: 3,
            initial_retry_delay: 1.0,
            backoff_multiplier: 2.0,
            max_tokens: 4096,
        }
    }
}

/// Cache settings. The flag is accepted and reported, nothing is cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Which transport exposes the tool
    pub transport: Transport,
    /// Bind address for the HTTP transport
    pub bind_address: String,
    /// Port for the HTTP transport
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind_address: "127.0.0.1".to_string(),
            port: 8808,
        }
    }
}

/// Tool transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout
    #[default]
    Stdio,
    /// JSON-RPC and plain JSON routes over HTTP
    Http,
}

impl Transport {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Seconds from a settings file as a `Duration` within `[min, max]`.
///
/// NaN counts as zero; negative values give `min`, infinite or overflowing
/// values give `max`.
pub fn clamp_secs(secs: f64, min: Duration, max: Duration) -> Duration {
    let secs = if secs.is_nan() { 0.0 } else { secs };
    let fallback = if secs > 0.0 { max } else { min };
    Duration::try_from_secs_f64(secs)
        .unwrap_or(fallback)
        .clamp(min, max)
}

/// Render a secret as its first and last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
