//! Web server module
//!
//! Provides the HTTP API: health, stats, direct search and the MCP endpoint.

mod handlers;
mod routes;

pub use routes::create_router;
