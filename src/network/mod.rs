//! HTTP networking module
//!
//! Provides the upstream HTTP client and the transport trait the retry loop
//! drives.

mod client;
mod transport;

pub use client::HttpClient;
pub use transport::{ApiResponse, ChatTransport, TransportFailure};
