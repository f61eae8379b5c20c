//! Search pipeline module
//!
//! Builds the request payload, executes it with bounded retries, and
//! transforms the reply into a citation-annotated result.

mod executor;
mod models;
mod payload;
pub mod retry;
pub mod transform;

pub use executor::Search;
pub use models::*;
pub use payload::{Message, PayloadBuilder, RequestBody, WebSearchOptions, DEFAULT_MAX_TOKENS};
pub use retry::{RetryPolicy, RetryingTransport};
