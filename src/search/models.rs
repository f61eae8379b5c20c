//! Search request and result data models

use crate::query::{Recency, SearchFocus};
use serde::{Deserialize, Serialize};

/// A validated search request. Built once per call and never mutated after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The search question
    pub query: String,
    /// Model identifier
    pub model: String,
    /// Optional search focus mode
    pub search_focus: Option<SearchFocus>,
    /// Optional recency filter
    pub recency: Option<Recency>,
}

impl SearchRequest {
    /// Create a request with no optional filters
    pub fn new(query: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model: model.into(),
            search_focus: None,
            recency: None,
        }
    }

    pub fn with_search_focus(mut self, focus: SearchFocus) -> Self {
        self.search_focus = Some(focus);
        self
    }

    pub fn with_recency(mut self, recency: Recency) -> Self {
        self.recency = Some(recency);
        self
    }
}

/// A source referenced by the answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the reply's source list
    pub index: u32,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

impl Citation {
    pub fn new(index: u32, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            title: String::new(),
            snippet: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Marker the answer text uses to reference this citation, e.g. `[3]`
    pub fn marker(&self) -> String {
        format!("[{}]", self.index)
    }

    /// Link text: the trimmed title, else the URL's host segment
    pub fn display_text(&self) -> &str {
        let title = self.title.trim();
        if !title.is_empty() {
            return title;
        }
        host_segment(&self.url)
    }
}

/// Third `/`-delimited segment of a URL (the host for `scheme://host/...`),
/// or the whole URL when there is no such segment.
pub fn host_segment(url: &str) -> &str {
    if !url.contains('/') {
        return url;
    }
    url.split('/').nth(2).unwrap_or(url)
}

/// Request metadata returned with every result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub model_used: String,
    pub query_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_focus: Option<String>,
}

/// Structured, citation-annotated answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Answer text with inline citation links
    pub answer: String,
    /// Sources in order of first appearance
    pub citations: Vec<Citation>,
    pub metadata: SearchMetadata,
}
