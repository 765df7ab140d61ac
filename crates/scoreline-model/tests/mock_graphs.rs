//! Scoring service tests against mock graphs
//!
//! Provides configurable implementations of the InferenceGraph trait and a
//! collecting PredictionSink for exercising the request path end to end.

use ndarray::Array2;
use parking_lot::Mutex;
use proptest::prelude::*;
use scoreline_core::{Error, Result, ScoreResponse};
use scoreline_model::{
    InferenceGraph, ModelPaths, OutputTensor, PredictionRecord, PredictionSink, ScalerArtifact,
    ScalerKind, ScoringOptions, ScoringService, TensorData,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A configurable mock graph
pub struct MockGraph {
    inputs: Vec<String>,
    outputs: Vec<String>,
    output: OutputTensor,
    fail_with: Option<String>,
    call_count: AtomicU32,
    last_input: Mutex<Option<Array2<f32>>>,
}

impl MockGraph {
    /// Create a mock graph that always returns label 0
    pub fn new() -> Self {
        Self {
            inputs: vec!["float_input".to_string()],
            outputs: vec!["output_label".to_string(), "output_probability".to_string()],
            output: OutputTensor::labels(vec![0]),
            fail_with: None,
            call_count: AtomicU32::new(0),
            last_input: Mutex::new(None),
        }
    }

    /// Set the tensor this graph will return
    pub fn with_output(mut self, output: OutputTensor) -> Self {
        self.output = output;
        self
    }

    /// Make every run fail with this message
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    /// Get the number of times run was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The features passed to the most recent run
    pub fn last_input(&self) -> Option<Array2<f32>> {
        self.last_input.lock().clone()
    }
}

impl Default for MockGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceGraph for MockGraph {
    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }

    fn run(&self, input: &str, output: &str, features: Array2<f32>) -> Result<OutputTensor> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        assert_eq!(input, self.inputs[0]);
        assert_eq!(output, self.outputs[0]);
        *self.last_input.lock() = Some(features);

        match &self.fail_with {
            Some(message) => Err(Error::inference(message.clone())),
            None => Ok(self.output.clone()),
        }
    }
}

/// Shares a MockGraph with the test while the service owns the box
struct SharedGraph(Arc<MockGraph>);

impl InferenceGraph for SharedGraph {
    fn input_names(&self) -> &[String] {
        self.0.input_names()
    }

    fn output_names(&self) -> &[String] {
        self.0.output_names()
    }

    fn run(&self, input: &str, output: &str, features: Array2<f32>) -> Result<OutputTensor> {
        self.0.run(input, output, features)
    }
}

/// Keeps every record it receives
#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<PredictionRecord>>,
}

impl PredictionSink for CollectingSink {
    fn record(&self, record: &PredictionRecord) {
        self.records.lock().push(record.clone());
    }
}

fn fitted_scaler() -> ScalerArtifact {
    ScalerArtifact::standard(
        vec![5.0, 3.0, 1.5, 0.25, 0.1, 0.3],
        vec![1.0, 0.5, 0.5, 0.25, 1.0, 1.0],
    )
    .unwrap()
}

fn service_with(graph: Arc<MockGraph>, options: ScoringOptions) -> ScoringService {
    ScoringService::new(fitted_scaler(), Box::new(SharedGraph(graph)), options).unwrap()
}

const VALID: &str = r#"{"data":[5.1,3.5,1.4,0.2,0.1,0.3]}"#;

#[test]
fn test_valid_request_returns_prediction() {
    let graph = Arc::new(MockGraph::new());
    let svc = service_with(Arc::clone(&graph), ScoringOptions::default());

    let response = svc.score(VALID);
    assert_eq!(serde_json::to_value(&response).unwrap(), json!([0]));
    assert_eq!(graph.call_count(), 1);
}

#[test]
fn test_graph_receives_single_zeroed_row_under_refit() {
    let graph = Arc::new(MockGraph::new());
    let svc = service_with(Arc::clone(&graph), ScoringOptions::default());
    svc.run(VALID).unwrap();

    let input = graph.last_input().unwrap();
    assert_eq!(input.dim(), (1, 6));
    assert!(input.iter().all(|&v| v == 0.0));
}

#[test]
fn test_graph_receives_scaled_row_with_stored_statistics() {
    let graph = Arc::new(MockGraph::new());
    let options = ScoringOptions::default().with_refit_per_request(false);
    let svc = service_with(Arc::clone(&graph), options);
    svc.run(r#"{"data":[6.0,4.0,2.0,0.5,0.1,0.3]}"#).unwrap();

    let input = graph.last_input().unwrap();
    assert_eq!(
        input.iter().copied().collect::<Vec<f32>>(),
        vec![1.0, 2.0, 1.0, 1.0, 0.0, 0.0]
    );
}

#[test]
fn test_failure_cases_return_sentinel() {
    let graph = Arc::new(MockGraph::new());
    let svc = service_with(Arc::clone(&graph), ScoringOptions::default());

    let cases = [
        ("not json", "invalid_payload"),
        (r#"{"features":[1,2,3,4,5,6]}"#, "invalid_payload"),
        (r#"{"data":[1,2,"three",4,5,6]}"#, "invalid_payload"),
        (r#"{"data":[1,2,3]}"#, "shape"),
        (r#"{"data":[1,2,3,4,5,6,7]}"#, "shape"),
        (r#"{"data":[]}"#, "shape"),
    ];

    for (body, kind) in cases {
        let response = svc.score(body);
        assert_eq!(response.error_kind(), Some(kind), "body {}", body);
        assert_eq!(serde_json::to_string(&response).unwrap(), "\"error\"");
    }
    assert_eq!(graph.call_count(), 0);
}

#[test]
fn test_nested_six_values_accepted() {
    let svc = service_with(Arc::new(MockGraph::new()), ScoringOptions::default());
    assert!(svc.run(r#"{"data":[[5.1,3.5,1.4],[0.2,0.1,0.3]]}"#).is_ok());
}

#[test]
fn test_inference_failure_collapses() {
    let graph = Arc::new(MockGraph::new().failing("kernel exploded"));
    let svc = service_with(graph, ScoringOptions::default());
    assert_eq!(svc.score(VALID), ScoreResponse::Error { kind: "inference" });
}

#[test]
fn test_identical_requests_are_deterministic() {
    let output = OutputTensor::new(vec![1, 2], TensorData::F32(vec![0.25, 0.75])).unwrap();
    let svc = service_with(
        Arc::new(MockGraph::new().with_output(output)),
        ScoringOptions::default(),
    );

    let first = svc.run(VALID).unwrap();
    let second = svc.run(VALID).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.into_value(), json!([[0.25, 0.75]]));
}

#[test]
fn test_sink_sees_successes_only() {
    let sink = Arc::new(CollectingSink::default());
    let svc = service_with(Arc::new(MockGraph::new()), ScoringOptions::default())
        .with_sink(Arc::clone(&sink) as Arc<dyn PredictionSink>);

    svc.score(VALID);
    svc.score("not json");

    let records = sink.records.lock();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].features, vec![5.1, 3.5, 1.4, 0.2, 0.1, 0.3]);
    assert_eq!(records[0].scaled, vec![0.0; 6]);
    assert_eq!(records[0].prediction.as_value(), &json!([0]));
}

#[test]
fn test_concurrent_requests_share_service() {
    let graph = Arc::new(MockGraph::new());
    let svc = Arc::new(service_with(Arc::clone(&graph), ScoringOptions::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || svc.score(VALID))
        })
        .collect();

    for handle in handles {
        assert!(!handle.join().unwrap().is_error());
    }
    assert_eq!(graph.call_count(), 8);
}

#[test]
fn test_custom_feature_count() {
    let scaler = ScalerArtifact::unfitted(ScalerKind::Standard {
        with_mean: true,
        with_std: true,
    });
    let options = ScoringOptions::default().with_feature_count(4);
    let svc = ScoringService::new(scaler, Box::new(MockGraph::new()), options).unwrap();

    assert!(svc.run(r#"{"data":[1,2,3,4]}"#).is_ok());
    assert!(svc.run(r#"{"data":[1,2,3,4,5,6]}"#).is_err());
}

#[test]
fn test_scaler_artifact_reloads_independently() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scaler.pkl");
    fitted_scaler().write_to(&path).unwrap();

    let first = ScoringService::new(
        ScalerArtifact::from_file(&path).unwrap(),
        Box::new(MockGraph::new()),
        ScoringOptions::default(),
    )
    .unwrap();
    let second = ScoringService::new(
        ScalerArtifact::from_file(&path).unwrap(),
        Box::new(MockGraph::new()),
        ScoringOptions::default(),
    )
    .unwrap();

    assert_eq!(first.scaler(), second.scaler());
    assert_eq!(first.run(VALID).unwrap(), second.run(VALID).unwrap());
}

#[test]
fn test_load_reports_missing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ModelPaths::from_dir(dir.path());

    let err = ScoringService::load(&paths, ScoringOptions::default()).unwrap_err();
    assert_eq!(err.kind(), "artifact");
    assert!(err.to_string().contains("scaler.pkl"));
}

#[test]
fn test_load_reports_missing_graph() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ModelPaths::from_dir(dir.path());
    std::fs::create_dir_all(paths.scaler.parent().unwrap()).unwrap();
    fitted_scaler().write_to(&paths.scaler).unwrap();

    let err = ScoringService::load(&paths, ScoringOptions::default()).unwrap_err();
    assert!(err.to_string().contains("svc.onnx"), "got {}", err);
}

proptest! {
    #[test]
    fn prop_any_six_finite_values_score(
        row in proptest::collection::vec(-1e6f64..1e6, 6),
        refit in any::<bool>(),
    ) {
        let options = ScoringOptions::default().with_refit_per_request(refit);
        let svc = service_with(Arc::new(MockGraph::default()), options);
        let body = json!({ "data": row }).to_string();

        prop_assert!(!svc.score(&body).is_error());
        prop_assert_eq!(svc.predict(&row).unwrap(), svc.run(&body).unwrap());
    }
}

/// Full initialization against a real deployment package.
///
/// Runs only when `SCORELINE_TEST_MODEL_DIR` points at a directory laid out
/// like `AZUREML_MODEL_DIR`.
#[cfg(feature = "onnx")]
#[test]
fn test_real_model_dir() {
    let Some(dir) = std::env::var_os("SCORELINE_TEST_MODEL_DIR") else {
        return;
    };
    let paths = ModelPaths::from_dir(dir);
    let first = ScoringService::load(&paths, ScoringOptions::default()).unwrap();
    let second = ScoringService::load(&paths, ScoringOptions::default()).unwrap();

    let a = first.score(VALID);
    let b = second.score(VALID);
    assert!(!a.is_error());
    assert_eq!(a, b);
}
