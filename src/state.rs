//! Application state shared by both transports

use crate::config::{Credentials, Settings};
use crate::metrics::Metrics;
use crate::network::{ChatTransport, HttpClient};
use crate::search::Search;
use std::sync::Arc;
use tracing::info;

/// Shared application state, built once at startup
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Search executor
    pub search: Arc<Search>,
    /// Metrics registry
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Validate the credential and build the HTTP client from settings
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let credentials = Credentials::from_settings(&settings.api)?;
        info!("API key loaded: {}", credentials.masked());

        let client = HttpClient::new(&settings.api, &credentials)?;
        info!(
            "Perplexity client initialized with model: {}",
            credentials.default_model()
        );

        Ok(Self::new(settings, &credentials, Arc::new(client)))
    }

    /// Create new application state around an existing transport
    pub fn new(
        settings: Settings,
        credentials: &Credentials,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let search = Arc::new(Search::new(
            transport,
            credentials,
            &settings.search,
            metrics.clone(),
        ));

        Self {
            settings: Arc::new(settings),
            search,
            metrics,
        }
    }
}
