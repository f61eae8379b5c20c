//! MCP tool definitions

use crate::query::{Recency, SearchFocus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name the search tool is registered under
pub const SEARCH_TOOL: &str = "perplexity_search";

/// Tool schema for MCP
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tools this server exposes
pub struct SearchTools;

impl SearchTools {
    /// Get all available tools
    pub fn list() -> Vec<ToolSchema> {
        vec![Self::perplexity_search()]
    }

    fn perplexity_search() -> ToolSchema {
        let focus: Vec<&str> = SearchFocus::ALL.iter().map(|f| f.as_str()).collect();
        let recency: Vec<&str> = Recency::ALL.iter().map(|r| r.as_str()).collect();

        ToolSchema {
            name: SEARCH_TOOL.to_string(),
            description: "Search Perplexity AI for current information and receive a structured \
                          answer with inline citation links, a citation list (index, url, title, \
                          snippet) and metadata (model_used, query_time_ms, search_focus)."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search question or query",
                        "minLength": 1,
                        "maxLength": 10000
                    },
                    "model": {
                        "type": "string",
                        "description": "Model to use (defaults to the configured model)"
                    },
                    "search_focus": {
                        "type": "string",
                        "enum": focus,
                        "description": "Search focus mode"
                    },
                    "recency": {
                        "type": "string",
                        "enum": recency,
                        "description": "Only use sources from this time window"
                    }
                },
                "required": ["query"]
            }),
        }
    }
}
