//! Search execution: validation, dispatch, transformation and sanitizing

use super::models::{SearchRequest, SearchResult};
use super::payload::PayloadBuilder;
use super::retry::{RetryPolicy, RetryingTransport};
use super::transform::parse_reply;
use crate::config::{Credentials, SearchSettings};
use crate::error::{SearchError, ToolError};
use crate::metrics::Metrics;
use crate::network::ChatTransport;
use crate::query::SearchParams;
use crate::sanitize::{sanitize_citations, sanitize_error};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs the `perplexity_search` pipeline for one call at a time.
///
/// Holds no per-call state, so one instance serves concurrent calls.
pub struct Search {
    transport: RetryingTransport,
    payload: PayloadBuilder,
    default_model: String,
    max_query_length: usize,
    metrics: Arc<Metrics>,
}

impl Search {
    /// Create a new search executor
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        credentials: &Credentials,
        settings: &SearchSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            transport: RetryingTransport::new(transport, RetryPolicy::from_settings(settings)),
            payload: PayloadBuilder::new(settings.max_tokens),
            default_model: credentials.default_model().to_string(),
            max_query_length: settings.max_query_length,
            metrics,
        }
    }

    /// Replace the retry schedule
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.transport = self.transport.with_policy(policy);
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Tool entry point: raw arguments in, caller-safe result or message out.
    ///
    /// Validation errors come back verbatim as [`ToolError::InvalidInput`];
    /// every other failure is sanitized into [`ToolError::Failed`].
    pub async fn search(&self, params: SearchParams) -> Result<SearchResult, ToolError> {
        self.metrics.inc_search();

        let request = match params.validate(&self.default_model, self.max_query_length) {
            Ok(request) => request,
            Err(e) => {
                warn!("Validation error: {}", e);
                self.metrics.record_failure(e.category(), None);
                return Err(ToolError::InvalidInput(e.to_string()));
            }
        };

        info!(
            "Tool invoked: perplexity_search (query length: {} chars, model: {}, search_focus: {}, recency: {})",
            request.query.chars().count(),
            request.model,
            request.search_focus.map(|f| f.as_str()).unwrap_or("none"),
            request.recency.map(|r| r.as_str()).unwrap_or("none"),
        );

        match self.execute(&request).await {
            Ok((mut result, attempts)) => {
                result.citations = sanitize_citations(result.citations);
                self.metrics
                    .record_success(result.metadata.query_time_ms, attempts);

                info!(
                    "Search completed successfully (citations: {}, answer length: {} chars)",
                    result.citations.len(),
                    result.answer.chars().count()
                );
                Ok(result)
            }
            Err(e) if e.is_validation() => {
                self.metrics.record_failure(e.category(), None);
                Err(ToolError::InvalidInput(e.to_string()))
            }
            Err(e) => {
                self.metrics.record_failure(e.category(), e.attempts());
                let message = sanitize_error(&e);
                error!("Search failed: {} - {}", e.category(), message);
                Err(ToolError::Failed(message))
            }
        }
    }

    /// Run a validated request through payload, transport and transformer.
    ///
    /// Returns the unsanitized result and the number of attempts used.
    pub async fn execute(
        &self,
        request: &SearchRequest,
    ) -> Result<(SearchResult, u32), SearchError> {
        info!(
            "Executing search (query length: {} chars, model: {})",
            request.query.chars().count(),
            request.model
        );

        let body = self.payload.build_for(request);

        let start = Instant::now();
        let execution = self.transport.execute(&body).await?;
        let query_time_ms = start.elapsed().as_millis() as u64;

        let result = parse_reply(&execution.reply, &request.model, query_time_ms)
            .inspect_err(|e| error!("Malformed API response: {}", e))?;

        Ok((result, execution.attempts))
    }
}
