//! HTTP request handlers

use crate::error::ToolError;
use crate::mcp::McpServer;
use crate::query::SearchParams;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Direct search handler
pub async fn search(State(state): State<AppState>, Json(arguments): Json<Value>) -> Response {
    let params = match SearchParams::from_value(arguments) {
        Ok(params) => params,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.search.search(params).await {
        Ok(result) => Json(result).into_response(),
        Err(ToolError::InvalidInput(message)) => error_response(StatusCode::BAD_REQUEST, message),
        Err(ToolError::Failed(message)) => error_response(StatusCode::BAD_GATEWAY, message),
    }
}

/// JSON-RPC over HTTP, one message per request
pub async fn mcp(State(state): State<AppState>, Json(message): Json<Value>) -> Response {
    match McpServer::new(state).handle_value(message).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Search statistics
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
