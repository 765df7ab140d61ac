//! Scoreline Model
//!
//! Loads the two artifacts of a deployed classifier and runs the request
//! scoring path:
//!
//! - [`ScalerArtifact`]: fitted feature scaler read from a pickle file
//! - [`InferenceGraph`] / [`OnnxGraph`]: classifier graph executed by ONNX Runtime
//! - [`ScoringService`]: load-once, run-many service tying both together
//! - [`PredictionSink`]: hook receiving every prediction produced

pub mod graph;
pub mod model_config;
pub mod scaler;
pub mod service;
pub mod sink;
pub mod tensor;

pub use graph::{InferenceGraph, OnnxGraph};
pub use model_config::{
    ModelPaths, ScoringOptions, DEFAULT_FEATURE_COUNT, DEFAULT_GRAPH_PATH, DEFAULT_SCALER_PATH,
    MODEL_DIR_ENV,
};
pub use scaler::{FeatureMatrix, FittedStats, ScalerArtifact, ScalerKind, ScalerParams};
pub use service::ScoringService;
pub use sink::{NoopSink, PredictionRecord, PredictionSink, TracingSink};
pub use tensor::{OutputTensor, TensorData};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::graph::{InferenceGraph, OnnxGraph};
    pub use crate::model_config::{ModelPaths, ScoringOptions};
    pub use crate::scaler::ScalerArtifact;
    pub use crate::service::ScoringService;
    pub use crate::sink::{PredictionRecord, PredictionSink};
}
