//! Shared application state

use crate::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use scoreline_model::{ScoringService, TracingSink};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Loaded scaler and graph
    pub scoring: Arc<ScoringService>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Load the model artifacts named by `config` and build the state
    pub fn load(config: ServerConfig, metrics_handle: PrometheusHandle) -> anyhow::Result<Self> {
        let paths = config.model_paths()?;
        let scoring = ScoringService::load(&paths, config.scoring_options())?;
        Ok(Self::new(config, scoring, metrics_handle))
    }

    /// Build the state around an already constructed scoring service
    pub fn new(
        config: ServerConfig,
        scoring: ScoringService,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let scoring = if config.prediction_log {
            info!("Prediction logging enabled");
            scoring.with_sink(Arc::new(TracingSink))
        } else {
            scoring
        };

        Self {
            config: Arc::new(config),
            scoring: Arc::new(scoring),
            metrics_handle,
        }
    }
}
