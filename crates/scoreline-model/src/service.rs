//! The scoring service: loads the artifacts once and serves every request

use crate::graph::{InferenceGraph, OnnxGraph};
use crate::model_config::{ModelPaths, ScoringOptions};
use crate::scaler::{FeatureMatrix, ScalerArtifact};
use crate::sink::{NoopSink, PredictionRecord, PredictionSink};
use chrono::Utc;
use scoreline_core::{Error, Prediction, RequestPayload, Result, ScoreResponse};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Loaded scaler and graph plus the graph's slot names.
///
/// Built once at startup and shared (`Arc<ScoringService>`) by every
/// request. Nothing in it changes after construction.
pub struct ScoringService {
    scaler: ScalerArtifact,
    graph: Box<dyn InferenceGraph>,
    input_name: String,
    output_name: String,
    options: ScoringOptions,
    sink: Arc<dyn PredictionSink>,
}

impl std::fmt::Debug for ScoringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringService")
            .field("scaler", &self.scaler.kind())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("options", &self.options)
            .finish()
    }
}

impl ScoringService {
    /// Load both artifacts from beneath `AZUREML_MODEL_DIR` with default
    /// options. Any failure is returned; there is no fallback.
    pub fn init() -> Result<Self> {
        Self::load(&ModelPaths::from_env()?, ScoringOptions::default())
    }

    /// Load both artifacts from explicit paths
    pub fn load(paths: &ModelPaths, options: ScoringOptions) -> Result<Self> {
        info!("Loading scaler from: {}", paths.scaler.display());
        let scaler = ScalerArtifact::from_file(&paths.scaler)?;

        info!("Loading inference graph from: {}", paths.graph.display());
        let graph = OnnxGraph::from_file(&paths.graph)?;

        Self::new(scaler, Box::new(graph), options)
    }

    /// Assemble a service from already-loaded parts.
    ///
    /// The graph's first declared input and output become the slots used
    /// for every request.
    pub fn new(
        scaler: ScalerArtifact,
        graph: Box<dyn InferenceGraph>,
        options: ScoringOptions,
    ) -> Result<Self> {
        if options.feature_count == 0 {
            return Err(Error::config("feature_count must be at least 1"));
        }

        let input_name = graph
            .input_names()
            .first()
            .cloned()
            .ok_or_else(|| Error::model("inference graph declares no inputs"))?;
        let output_name = graph
            .output_names()
            .first()
            .cloned()
            .ok_or_else(|| Error::model("inference graph declares no outputs"))?;

        if !options.refit_per_request {
            match scaler.n_features() {
                None => {
                    return Err(Error::config(
                        "scaler artifact has no learned statistics; per-request refit must stay enabled",
                    ))
                }
                Some(width) if width != options.feature_count => {
                    return Err(Error::config(format!(
                        "scaler artifact covers {} features but feature_count is {}",
                        width, options.feature_count
                    )))
                }
                Some(_) => {}
            }
        }
        if options.refit_per_request {
            warn!(
                "Scaler is re-fitted on every request row; single-row fits collapse the \
                 scaled features to constants"
            );
        }

        info!(
            input = %input_name,
            output = %output_name,
            feature_count = options.feature_count,
            "Scoring service ready"
        );

        Ok(Self {
            scaler,
            graph,
            input_name,
            output_name,
            options,
            sink: Arc::new(NoopSink),
        })
    }

    /// Attach a hook that receives every prediction
    pub fn with_sink(mut self, sink: Arc<dyn PredictionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn options(&self) -> ScoringOptions {
        self.options
    }

    pub fn scaler(&self) -> &ScalerArtifact {
        &self.scaler
    }

    /// Handle one raw request body, reporting failures as typed errors
    pub fn run(&self, raw: &str) -> Result<Prediction> {
        let start = Instant::now();
        let payload = RequestPayload::from_json(raw)?;
        let features = payload.features()?;
        self.infer(features, start)
    }

    /// Score an already-decoded feature vector
    pub fn predict(&self, features: &[f64]) -> Result<Prediction> {
        self.infer(features.to_vec(), Instant::now())
    }

    /// Handle one raw request body. Never fails: any error is logged and
    /// collapsed into the `"error"` sentinel.
    pub fn score(&self, raw: &str) -> ScoreResponse {
        metrics::counter!("scoreline_requests_total").increment(1);
        match self.run(raw) {
            Ok(prediction) => ScoreResponse::Prediction(prediction),
            Err(err) => Self::reject(err),
        }
    }

    /// Like [`score`](Self::score) for a body that may not be UTF-8
    pub fn score_bytes(&self, body: &[u8]) -> ScoreResponse {
        match std::str::from_utf8(body) {
            Ok(raw) => self.score(raw),
            Err(e) => {
                metrics::counter!("scoreline_requests_total").increment(1);
                Self::reject(Error::invalid_payload(format!("body is not UTF-8: {}", e)))
            }
        }
    }

    fn reject(err: Error) -> ScoreResponse {
        warn!(kind = err.kind(), "Scoring request failed: {}", err);
        metrics::counter!("scoreline_errors_total", "kind" => err.kind()).increment(1);
        ScoreResponse::from_error(&err)
    }

    fn infer(&self, features: Vec<f64>, start: Instant) -> Result<Prediction> {
        let width = self.options.feature_count;
        let count = features.len();
        let row = FeatureMatrix::from_shape_vec((1, width), features.clone()).map_err(|_| {
            Error::shape(format!(
                "cannot reshape {} values into a 1x{} feature row",
                count, width
            ))
        })?;

        let scaled = if self.options.refit_per_request {
            self.scaler.fit_transform(&row)?
        } else {
            self.scaler.transform(&row)?
        };
        let scaled = scaled.mapv(|v| v as f32);
        let scaled_row: Vec<f32> = scaled.iter().copied().collect();
        debug!(features = ?features, scaled = ?scaled_row, "Scaled feature row");

        let output = self
            .graph
            .run(&self.input_name, &self.output_name, scaled)?;
        let prediction = output.to_prediction();

        let latency_us = start.elapsed().as_micros() as u64;
        metrics::histogram!("scoreline_inference_latency_us").record(latency_us as f64);

        self.sink.record(&PredictionRecord {
            request_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            features,
            scaled: scaled_row,
            prediction: prediction.clone(),
            latency_us,
        });

        Ok(prediction)
    }
}
