//! Configuration module for perplexity-mcp
//!
//! Handles loading settings from YAML files and environment variables, and
//! validating the upstream credential before anything is sent with it.

mod settings;

pub use settings::*;

use thiserror::Error;

/// Prefix every Perplexity API key carries
pub const API_KEY_PREFIX: &str = "pplx-";

/// Shortest key length accepted as plausible
pub const MIN_API_KEY_LENGTH: usize = 20;

/// Configuration errors raised at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "PERPLEXITY_API_KEY not found in environment. \
         Copy .env.example to .env and add your API key."
    )]
    MissingApiKey,

    #[error("PERPLEXITY_API_KEY must start with 'pplx-'. Got key starting with: {0}")]
    InvalidPrefix(String),

    #[error("PERPLEXITY_API_KEY appears to be too short. Please verify your API key is correct.")]
    TooShort,
}

/// Validated credential and default model handed to the transport
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    default_model: String,
}

impl Credentials {
    /// Validate the credential found in settings
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, ConfigError> {
        Self::new(&settings.api_key, &settings.default_model)
    }

    pub fn new(api_key: &str, default_model: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !api_key.starts_with(API_KEY_PREFIX) {
            let shown = if api_key.chars().count() >= 4 {
                api_key.chars().take(4).collect()
            } else {
                "invalid".to_string()
            };
            return Err(ConfigError::InvalidPrefix(shown));
        }

        if api_key.len() < MIN_API_KEY_LENGTH {
            return Err(ConfigError::TooShort);
        }

        Ok(Self {
            api_key: api_key.to_string(),
            default_model: default_model.to_string(),
        })
    }

    /// The raw key, for the Authorization header only
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Key safe to write to logs
    pub fn masked(&self) -> String {
        mask_secret(&self.api_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.masked())
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "pplx-0123456789abcdefXYZ";

    #[test]
    fn test_valid_key() {
        let creds = Credentials::new(KEY, "sonar-pro").unwrap();
        assert_eq!(creds.api_key(), KEY);
        assert_eq!(creds.default_model(), "sonar-pro");
        assert_eq!(creds.masked(), "pplx...fXYZ");
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            Credentials::new("  ", "sonar-pro").unwrap_err(),
            ConfigError::MissingApiKey
        );
    }

    #[test]
    fn test_wrong_prefix_reveals_only_four_chars() {
        let err = Credentials::new("sk-live-0123456789abcdef", "sonar-pro").unwrap_err();
        assert_eq!(err, ConfigError::InvalidPrefix("sk-l".to_string()));
        assert!(!err.to_string().contains("0123456789"));
    }

    #[test]
    fn test_short_key() {
        assert_eq!(
            Credentials::new("pplx-short", "sonar-pro").unwrap_err(),
            ConfigError::TooShort
        );
    }

    #[test]
    fn test_debug_is_masked() {
        let creds = Credentials::new(KEY, "sonar-pro").unwrap();
        assert!(!format!("{:?}", creds).contains(KEY));
    }
}
