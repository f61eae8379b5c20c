//! Tool argument parsing and validation
//!
//! Raw arguments arrive as loosely typed strings from the agent host. This
//! module turns them into a [`SearchRequest`] or a validation error before
//! anything touches the network:
//! - `query`: required, non-blank, bounded length
//! - `search_focus`: `web`, `academic` or `sec`
//! - `recency`: `hour`, `day`, `week`, `month` or `year`

use crate::error::SearchError;
use crate::search::SearchRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search focus mode forwarded as `search_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFocus {
    Web,
    Academic,
    Sec,
}

impl SearchFocus {
    pub const ALL: [SearchFocus; 3] = [Self::Web, Self::Academic, Self::Sec];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Academic => "academic",
            Self::Sec => "sec",
        }
    }
}

impl FromStr for SearchFocus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|f| f.as_str() == s).ok_or(())
    }
}

impl fmt::Display for SearchFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recency filter forwarded as `search_recency_filter`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recency {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Recency {
    pub const ALL: [Recency; 5] = [Self::Hour, Self::Day, Self::Week, Self::Month, Self::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl FromStr for Recency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|r| r.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `perplexity_search` arguments as sent by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub search_focus: Option<String>,
    #[serde(default)]
    pub recency: Option<String>,
}

/// Message for a missing or non-string `query`
pub const QUERY_REQUIRED_MESSAGE: &str = "Query parameter is required and must be a string.";

impl SearchParams {
    /// Decode raw JSON arguments; a wrongly typed field is a validation error
    pub fn from_value(arguments: serde_json::Value) -> Result<Self, SearchError> {
        serde_json::from_value(arguments)
            .map_err(|_| SearchError::Validation(QUERY_REQUIRED_MESSAGE.to_string()))
    }

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_search_focus(mut self, focus: impl Into<String>) -> Self {
        self.search_focus = Some(focus.into());
        self
    }

    pub fn with_recency(mut self, recency: impl Into<String>) -> Self {
        self.recency = Some(recency.into());
        self
    }

    /// Validate into a request, filling the model from `default_model`
    pub fn validate(
        self,
        default_model: &str,
        max_query_length: usize,
    ) -> Result<SearchRequest, SearchError> {
        let query = match self.query {
            Some(q) => q,
            None => {
                return Err(SearchError::Validation(QUERY_REQUIRED_MESSAGE.to_string()))
            }
        };

        validate_query(&query, max_query_length)?;

        let search_focus = non_empty(self.search_focus)
            .map(|focus| {
                focus.parse::<SearchFocus>().map_err(|_| {
                    SearchError::Validation(format!(
                        "Invalid search_focus: {}. Must be one of: web, academic, sec",
                        focus
                    ))
                })
            })
            .transpose()?;

        let recency = non_empty(self.recency)
            .map(|recency| {
                recency.parse::<Recency>().map_err(|_| {
                    SearchError::Validation(format!(
                        "Invalid recency: {}. Must be one of: hour, day, week, month, year",
                        recency
                    ))
                })
            })
            .transpose()?;

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        Ok(SearchRequest {
            query,
            model,
            search_focus,
            recency,
        })
    }
}

/// Check a query is non-blank and within the length bound
pub fn validate_query(query: &str, max_length: usize) -> Result<(), SearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(SearchError::Validation("Query cannot be empty.".to_string()));
    }

    let length = trimmed.chars().count();
    if length > max_length {
        return Err(SearchError::Validation(format!(
            "Query too long (max {} characters). Got {} characters.",
            max_length, length
        )));
    }

    Ok(())
}

/// Only the empty string counts as "not given"; whitespace is validated
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(params: SearchParams) -> Result<SearchRequest, SearchError> {
        params.validate("sonar-pro", 10_000)
    }

    fn validation_message(err: SearchError) -> String {
        match err {
            SearchError::Validation(msg) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_model() {
        let request = validate(SearchParams::new("what is rust?")).unwrap();
        assert_eq!(request.query, "what is rust?");
        assert_eq!(request.model, "sonar-pro");
        assert!(request.search_focus.is_none());
        assert!(request.recency.is_none());
    }

    #[test]
    fn test_explicit_options() {
        let request = validate(
            SearchParams::new("filings")
                .with_model("sonar")
                .with_search_focus("sec")
                .with_recency("week"),
        )
        .unwrap();
        assert_eq!(request.model, "sonar");
        assert_eq!(request.search_focus, Some(SearchFocus::Sec));
        assert_eq!(request.recency, Some(Recency::Week));
    }

    #[test]
    fn test_missing_query() {
        let msg = validation_message(validate(SearchParams::default()).unwrap_err());
        assert!(msg.contains("required"));
    }

    #[test]
    fn test_blank_queries_rejected() {
        for query in ["", " ", "\t\n  "] {
            let msg = validation_message(validate(SearchParams::new(query)).unwrap_err());
            assert_eq!(msg, "Query cannot be empty.");
        }
    }

    #[test]
    fn test_query_too_long() {
        let query = "a".repeat(10_001);
        let msg = validation_message(validate(SearchParams::new(query)).unwrap_err());
        assert!(msg.contains("too long"));
        assert!(msg.contains("10000"));
        assert!(msg.contains("10001"));
    }

    #[test]
    fn test_query_at_limit_accepted() {
        assert!(validate(SearchParams::new("a".repeat(10_000))).is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        // 10,000 two-byte characters stay within the bound
        assert!(validate(SearchParams::new("é".repeat(10_000))).is_ok());
    }

    #[test]
    fn test_invalid_focus() {
        let msg = validation_message(
            validate(SearchParams::new("q").with_search_focus("news")).unwrap_err(),
        );
        assert_eq!(msg, "Invalid search_focus: news. Must be one of: web, academic, sec");
    }

    #[test]
    fn test_invalid_recency() {
        let msg = validation_message(
            validate(SearchParams::new("q").with_recency("decade")).unwrap_err(),
        );
        assert!(msg.starts_with("Invalid recency: decade."));
    }

    #[test]
    fn test_empty_optionals_ignored() {
        let request = validate(
            SearchParams::new("q")
                .with_model("")
                .with_search_focus("")
                .with_recency(""),
        )
        .unwrap();
        assert_eq!(request.model, "sonar-pro");
        assert!(request.search_focus.is_none());
        assert!(request.recency.is_none());
    }

    #[test]
    fn test_from_value_rejects_wrong_types() {
        let params = SearchParams::from_value(serde_json::json!({"query": "q", "recency": "day"}))
            .unwrap();
        assert_eq!(params.query.as_deref(), Some("q"));

        for arguments in [
            serde_json::json!({"query": 42}),
            serde_json::json!({"query": ["q"]}),
            serde_json::json!("q"),
        ] {
            let msg = validation_message(SearchParams::from_value(arguments).unwrap_err());
            assert_eq!(msg, QUERY_REQUIRED_MESSAGE);
        }
    }

    #[test]
    fn test_whitespace_options_rejected() {
        let msg = validation_message(
            validate(SearchParams::new("q").with_search_focus("   ")).unwrap_err(),
        );
        assert_eq!(msg, "Invalid search_focus:    . Must be one of: web, academic, sec");

        let msg = validation_message(
            validate(SearchParams::new("q").with_recency("  ")).unwrap_err(),
        );
        assert_eq!(msg, "Invalid recency:   . Must be one of: hour, day, week, month, year");
    }

    #[test]
    fn test_enum_round_trip_names() {
        assert_eq!("academic".parse::<SearchFocus>(), Ok(SearchFocus::Academic));
        assert!("Web".parse::<SearchFocus>().is_err());
        assert_eq!(Recency::Month.to_string(), "month");
    }
}
