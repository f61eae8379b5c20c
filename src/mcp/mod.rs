//! Model Context Protocol surface
//!
//! Exposes the `perplexity_search` tool over newline-delimited JSON-RPC.

mod server;
mod tools;

pub use server::{McpError, McpRequest, McpResponse, McpServer, PROTOCOL_VERSION, SERVER_NAME};
pub use tools::{SearchTools, ToolSchema, SEARCH_TOOL};
