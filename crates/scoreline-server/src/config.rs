//! Server configuration

use scoreline_model::{
    ModelPaths, ScoringOptions, DEFAULT_FEATURE_COUNT, DEFAULT_GRAPH_PATH, DEFAULT_SCALER_PATH,
    MODEL_DIR_ENV,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base directory of the model artifacts
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Scaler artifact path relative to `model_dir`
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,

    /// Classifier graph path relative to `model_dir`
    #[serde(default = "default_graph_path")]
    pub graph_path: PathBuf,

    /// Width of the feature row each request is reshaped to
    #[serde(default = "default_feature_count")]
    pub feature_count: usize,

    /// Re-fit the scaler on every request row
    #[serde(default = "default_true")]
    pub refit_per_request: bool,

    /// Log every prediction on the `scoreline::predictions` target
    #[serde(default)]
    pub prediction_log: bool,

    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // A missing file means defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            Self::from_yaml(&content)?
        } else {
            Self::default()
        };

        if let Some(dir) = &cli.model_dir {
            config.model_dir = Some(dir.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reject values the scoring service cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feature_count == 0 {
            anyhow::bail!("feature_count must be at least 1");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be at least 1");
        }
        for path in [&self.scaler_path, &self.graph_path] {
            if path.is_absolute() {
                anyhow::bail!(
                    "artifact path {} must be relative to the model directory",
                    path.display()
                );
            }
        }
        Ok(())
    }

    /// Resolve the artifact locations
    pub fn model_paths(&self) -> anyhow::Result<ModelPaths> {
        let dir = self.model_dir.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "model directory not configured: set {} or pass --model-dir",
                MODEL_DIR_ENV
            )
        })?;
        Ok(ModelPaths::with_layout(
            dir,
            &self.scaler_path,
            &self.graph_path,
        ))
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions::default()
            .with_feature_count(self.feature_count)
            .with_refit_per_request(self.refit_per_request)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            scaler_path: default_scaler_path(),
            graph_path: default_graph_path(),
            feature_count: default_feature_count(),
            refit_per_request: true,
            prediction_log: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from(DEFAULT_SCALER_PATH)
}

fn default_graph_path() -> PathBuf {
    PathBuf::from(DEFAULT_GRAPH_PATH)
}

fn default_feature_count() -> usize {
    DEFAULT_FEATURE_COUNT
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}
