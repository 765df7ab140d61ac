//! Hook invoked whenever the graph produces a prediction
//!
//! Deployments that collect model inputs and outputs (for drift analysis or
//! auditing) plug in here. Storage backends live outside this crate.

use chrono::{DateTime, Utc};
use scoreline_core::Prediction;
use serde::Serialize;
use uuid::Uuid;

/// One successful inference, as seen by a [`PredictionSink`]
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub request_id: Uuid,
    pub timestamp: DateTime<Utc>,

    /// Feature row as received
    pub features: Vec<f64>,

    /// Feature row after scaling, as fed to the graph
    pub scaled: Vec<f32>,

    pub prediction: Prediction,
    pub latency_us: u64,
}

/// Receiver for prediction records.
///
/// Called synchronously on the request path, so implementations should hand
/// off anything slow. It cannot fail the request.
pub trait PredictionSink: Send + Sync {
    fn record(&self, record: &PredictionRecord);
}

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl PredictionSink for NoopSink {
    fn record(&self, _record: &PredictionRecord) {}
}

/// Emits each record as a structured `info` event on the
/// `scoreline::predictions` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PredictionSink for TracingSink {
    fn record(&self, record: &PredictionRecord) {
        match serde_json::to_string(record) {
            Ok(json) => tracing::info!(
                target: "scoreline::predictions",
                request_id = %record.request_id,
                latency_us = record.latency_us,
                record = %json,
                "prediction"
            ),
            Err(e) => tracing::warn!(
                target: "scoreline::predictions",
                request_id = %record.request_id,
                "failed to serialize prediction record: {}",
                e
            ),
        }
    }
}
