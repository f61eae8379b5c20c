//! Request body construction for the chat completions endpoint

use super::models::SearchRequest;
use crate::query::SearchFocus;
use serde::{Deserialize, Serialize};

/// Answer token budget sent with every request
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Wire-format request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_mode: Option<String>,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Nested search options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_recency_filter: Option<String>,
}

/// Builds request bodies with a fixed token budget
#[derive(Debug, Clone, Copy)]
pub struct PayloadBuilder {
    max_tokens: u32,
}

impl PayloadBuilder {
    pub fn new(max_tokens: u32) -> Self {
        Self { max_tokens }
    }

    /// Build a body from already-validated parts.
    ///
    /// A `search_focus` outside the recognised set is dropped silently.
    pub fn build(
        &self,
        query: &str,
        model: &str,
        search_focus: Option<&str>,
        recency: Option<&str>,
    ) -> RequestBody {
        let web_search_options = recency
            .filter(|r| !r.is_empty())
            .map(|r| WebSearchOptions {
                search_recency_filter: Some(r.to_string()),
            });

        let search_mode = search_focus
            .and_then(|f| f.parse::<SearchFocus>().ok())
            .map(|f| f.as_str().to_string());

        RequestBody {
            model: model.to_string(),
            messages: vec![Message::user(query)],
            max_tokens: self.max_tokens,
            web_search_options,
            search_mode,
        }
    }

    pub fn build_for(&self, request: &SearchRequest) -> RequestBody {
        self.build(
            &request.query,
            &request.model,
            request.search_focus.map(|f| f.as_str()),
            request.recency.map(|r| r.as_str()),
        )
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}
