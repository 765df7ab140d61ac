//! Artifact locations and scoring options

use scoreline_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the base model directory
pub const MODEL_DIR_ENV: &str = "AZUREML_MODEL_DIR";

/// Scaler artifact location relative to the model directory
pub const DEFAULT_SCALER_PATH: &str = "model/scaler/scaler.pkl";

/// Classifier graph location relative to the model directory
pub const DEFAULT_GRAPH_PATH: &str = "model/support-vector-classifier/svc.onnx";

/// Number of features in one request row
pub const DEFAULT_FEATURE_COUNT: usize = 6;

/// Resolved paths of the two artifacts loaded at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Fitted feature scaler (pickle)
    pub scaler: PathBuf,

    /// Classifier graph (ONNX)
    pub graph: PathBuf,
}

impl ModelPaths {
    /// Resolve the default layout beneath `AZUREML_MODEL_DIR`
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var_os(MODEL_DIR_ENV).ok_or_else(|| {
            Error::config(format!("environment variable {} is not set", MODEL_DIR_ENV))
        })?;
        Ok(Self::from_dir(dir))
    }

    /// Resolve the default layout beneath `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::with_layout(dir, DEFAULT_SCALER_PATH, DEFAULT_GRAPH_PATH)
    }

    /// Resolve custom relative artifact paths beneath `dir`
    pub fn with_layout(
        dir: impl AsRef<Path>,
        scaler: impl AsRef<Path>,
        graph: impl AsRef<Path>,
    ) -> Self {
        let dir = dir.as_ref();
        Self {
            scaler: dir.join(scaler),
            graph: dir.join(graph),
        }
    }
}

/// Per-service scoring behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringOptions {
    /// Width of the single feature row every request is reshaped to
    pub feature_count: usize,

    /// Re-fit the scaler on each incoming row instead of using the
    /// statistics stored in the artifact.
    ///
    /// On by default to match deployed behaviour. A single-row fit collapses
    /// most scalers to a constant output, so this is very likely a latent
    /// bug in the deployed model; it is kept until the intent is confirmed.
    pub refit_per_request: bool,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            feature_count: DEFAULT_FEATURE_COUNT,
            refit_per_request: true,
        }
    }
}

impl ScoringOptions {
    /// Set the expected feature count
    pub fn with_feature_count(mut self, feature_count: usize) -> Self {
        self.feature_count = feature_count;
        self
    }

    /// Choose between per-request re-fit and stored statistics
    pub fn with_refit_per_request(mut self, refit: bool) -> Self {
        self.refit_per_request = refit;
        self
    }
}
