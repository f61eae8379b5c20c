//! MCP server implementation
//!
//! Implements the Model Context Protocol as newline-delimited JSON-RPC 2.0.
//! The same dispatcher backs the stdio transport and the HTTP `/mcp` route.

use super::tools::{SearchTools, SEARCH_TOOL};
use crate::error::ToolError;
use crate::query::SearchParams;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "perplexity-search";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

/// MCP JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    /// Absent for notifications
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// MCP JSON-RPC response
#[derive(Debug, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// MCP error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
}

impl McpError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// MCP server dispatching to the search tool
#[derive(Clone)]
pub struct McpServer {
    state: AppState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn run_stdio(&self) -> anyhow::Result<()> {
        info!("Serving MCP over stdio");
        let reader = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader` to `writer`.
    ///
    /// Each request runs on its own task, so a call waiting out a retry
    /// backoff does not hold up later requests. Responses are written by this
    /// task alone, one whole line at a time, in completion order. Returns once
    /// input is closed and every in-flight request has answered.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let mut tx = Some(tx);
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line(), if tx.is_some() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if let Some(tx) = &tx {
                            self.dispatch(line, tx.clone());
                        }
                    }
                    None => {
                        info!("MCP input closed");
                        tx = None;
                    }
                },
                Some(response) = rx.recv() => {
                    writer.write_all(response.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                else => break,
            }
        }

        Ok(())
    }

    /// Handle `line` on a new task and queue its response, if any
    fn dispatch(&self, line: String, responses: mpsc::UnboundedSender<String>) {
        let server = self.clone();
        tokio::spawn(async move {
            let Some(response) = server.handle_line(&line).await else {
                return;
            };
            match serde_json::to_string(&response) {
                Ok(json) => {
                    if responses.send(json).is_err() {
                        warn!("Response dropped: output closed");
                    }
                }
                Err(e) => error!("Failed to encode response: {}", e),
            }
        });
    }

    /// Handle one raw message; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<McpResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => Some(McpResponse::failure(
                Value::Null,
                McpError::new(PARSE_ERROR, format!("Parse error: {}", e)),
            )),
        }
    }

    /// Handle one decoded message; `None` for notifications
    pub async fn handle_value(&self, value: Value) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(McpResponse::failure(
                    Value::Null,
                    McpError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ))
            }
        };

        let Some(id) = request.id.clone() else {
            debug!("Notification received: {}", request.method);
            return None;
        };

        let response = match self.handle_method(&request).await {
            Ok(result) => McpResponse::success(id, result),
            Err(error) => McpResponse::failure(id, error),
        };
        Some(response)
    }

    /// Handle a specific method
    async fn handle_method(&self, request: &McpRequest) -> Result<Value, McpError> {
        match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(serde_json::json!({ "tools": SearchTools::list() })),
            "tools/call" => self.handle_tools_call(request.params.clone()).await,
            _ => Err(McpError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": crate::VERSION
            }
        })
    }

    /// Handle tools/call
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing params"))?;

        let name = params
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| McpError::new(INVALID_PARAMS, "Missing tool name"))?;

        if name != SEARCH_TOOL {
            return Err(McpError::new(INVALID_PARAMS, format!("Unknown tool: {}", name)));
        }

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let args = SearchParams::from_value(arguments)
            .map_err(|e| McpError::new(INVALID_PARAMS, e.to_string()))?;

        match self.state.search.search(args).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result)
                    .map_err(|e| McpError::new(-32603, format!("Internal error: {}", e)))?;
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": false
                }))
            }
            Err(ToolError::InvalidInput(message)) => Err(McpError::new(INVALID_PARAMS, message)),
            Err(ToolError::Failed(message)) => {
                warn!("perplexity_search failed: {}", message);
                Ok(serde_json::json!({
                    "content": [{ "type": "text", "text": message }],
                    "isError": true
                }))
            }
        }
    }
}
