//! perplexity-mcp: a Perplexity AI search tool served over the Model Context Protocol
//!
//! Validates tool arguments, calls the Perplexity chat completions API with
//! bounded retries, links inline `[n]` citation markers, and returns a
//! sanitized structured result over stdio or HTTP.

pub mod config;
pub mod error;
pub mod mcp;
pub mod metrics;
pub mod network;
pub mod query;
pub mod sanitize;
pub mod search;
pub mod state;
pub mod web;

pub use config::{Credentials, Settings};
pub use error::{SearchError, ToolError};
pub use search::{Search, SearchResult};
pub use state::AppState;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
