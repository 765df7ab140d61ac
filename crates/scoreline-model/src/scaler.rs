//! Fitted feature scaler loaded from the deployment package
//!
//! The scaler artifact is a pickled dictionary of scaler parameters
//! (`kind`, configuration flags and learned per-feature statistics). The
//! arithmetic mirrors scikit-learn's `StandardScaler`, `MinMaxScaler`,
//! `MaxAbsScaler` and `RobustScaler`, including their handling of
//! zero-variance features, so outputs match the deployed model.

use ndarray::{Array2, ArrayView1};
use scoreline_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, SerOptions};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Row-major batch of feature rows
pub type FeatureMatrix = Array2<f64>;

/// Scaling method and its configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalerKind {
    /// `(x - mean) / std`
    Standard { with_mean: bool, with_std: bool },
    /// `x * scale + min`, mapping the fitted range onto `feature_range`.
    /// With `clip` the output is bounded to `feature_range`.
    MinMax {
        feature_range: (f64, f64),
        clip: bool,
    },
    /// `x / max(|x|)`
    MaxAbs,
    /// `(x - median) / IQR`
    Robust {
        with_centering: bool,
        with_scaling: bool,
        quantile_range: (f64, f64),
    },
}

impl ScalerKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Standard { .. } => "standard",
            Self::MinMax { .. } => "min_max",
            Self::MaxAbs => "max_abs",
            Self::Robust { .. } => "robust",
        }
    }
}

/// Per-feature statistics learned by a fit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FittedStats {
    /// Subtracted before scaling (mean, median). For min-max this is the
    /// `min_` term added after scaling.
    pub offset: Option<Vec<f64>>,

    /// Divisor applied to each feature. For min-max this is a multiplier.
    pub scale: Option<Vec<f64>>,
}

impl FittedStats {
    fn width(&self) -> Option<usize> {
        self.offset
            .as_ref()
            .or(self.scale.as_ref())
            .map(|v| v.len())
    }
}

/// On-disk form of the scaler artifact.
///
/// Statistic keys may also use scikit-learn's fitted attribute names
/// (`mean_`, `scale_`, `n_features_in_`, ...), so a `vars(scaler)` dump
/// with `kind` added loads directly. Keys not listed here are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// `standard`, `min_max`, `max_abs` or `robust` (scikit-learn class
    /// names such as `StandardScaler` are accepted too)
    pub kind: String,

    #[serde(default, alias = "n_features_in_")]
    pub n_features_in: Option<usize>,

    #[serde(default = "default_true")]
    pub with_mean: bool,

    #[serde(default = "default_true")]
    pub with_std: bool,

    #[serde(default = "default_true")]
    pub with_centering: bool,

    #[serde(default = "default_true")]
    pub with_scaling: bool,

    #[serde(default = "default_feature_range")]
    pub feature_range: Vec<f64>,

    #[serde(default = "default_quantile_range")]
    pub quantile_range: Vec<f64>,

    #[serde(default)]
    pub clip: bool,

    #[serde(default)]
    pub unit_variance: bool,

    #[serde(default, alias = "mean_")]
    pub mean: Option<Vec<f64>>,

    #[serde(default, alias = "scale_")]
    pub scale: Option<Vec<f64>>,

    #[serde(default, alias = "center_")]
    pub center: Option<Vec<f64>>,

    #[serde(default, alias = "min_")]
    pub min: Option<Vec<f64>>,

    #[serde(default, alias = "data_min_")]
    pub data_min: Option<Vec<f64>>,

    #[serde(default, alias = "data_max_")]
    pub data_max: Option<Vec<f64>>,

    #[serde(default, alias = "max_abs_")]
    pub max_abs: Option<Vec<f64>>,
}

fn default_true() -> bool {
    true
}

fn default_feature_range() -> Vec<f64> {
    vec![0.0, 1.0]
}

fn default_quantile_range() -> Vec<f64> {
    vec![25.0, 75.0]
}

impl ScalerParams {
    /// Parameters for an unfitted scaler of the given kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            n_features_in: None,
            with_mean: true,
            with_std: true,
            with_centering: true,
            with_scaling: true,
            feature_range: default_feature_range(),
            quantile_range: default_quantile_range(),
            clip: false,
            unit_variance: false,
            mean: None,
            scale: None,
            center: None,
            min: None,
            data_min: None,
            data_max: None,
            max_abs: None,
        }
    }
}

/// A fitted scaler, immutable once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerArtifact {
    kind: ScalerKind,
    stats: FittedStats,
    n_features: Option<usize>,
}

impl ScalerArtifact {
    /// Create a scaler from a kind and learned statistics
    pub fn new(kind: ScalerKind, stats: FittedStats) -> Result<Self> {
        let n_features = stats.width();
        if let (Some(offset), Some(scale)) = (&stats.offset, &stats.scale) {
            if offset.len() != scale.len() {
                return Err(Error::artifact(format!(
                    "scaler statistics disagree on width: {} vs {}",
                    offset.len(),
                    scale.len()
                )));
            }
        }
        Ok(Self {
            kind,
            stats,
            n_features,
        })
    }

    /// A scaler with no learned statistics; only `fit_transform` works
    pub fn unfitted(kind: ScalerKind) -> Self {
        Self {
            kind,
            stats: FittedStats::default(),
            n_features: None,
        }
    }

    /// Standard scaler with learned mean and standard deviation
    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        Self::new(
            ScalerKind::Standard {
                with_mean: true,
                with_std: true,
            },
            FittedStats {
                offset: Some(mean),
                scale: Some(scale),
            },
        )
    }

    /// Load a pickled scaler artifact from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::artifact(format!(
                "Scaler file not found: {}",
                path.display()
            )));
        }

        let reader = BufReader::new(File::open(path)?);
        let params: ScalerParams = serde_pickle::from_reader(reader, DeOptions::new())
            .map_err(|e| {
                Error::artifact(format!(
                    "Failed to decode scaler '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        let scaler = Self::from_params(params)?;
        tracing::info!(
            path = %path.display(),
            kind = scaler.kind.name(),
            n_features = ?scaler.n_features,
            "Loaded scaler artifact"
        );
        Ok(scaler)
    }

    /// Decode a pickled scaler artifact held in memory
    pub fn from_pickle_bytes(bytes: &[u8]) -> Result<Self> {
        let params: ScalerParams = serde_pickle::from_slice(bytes, DeOptions::new())
            .map_err(|e| Error::artifact(format!("Failed to decode scaler: {}", e)))?;
        Self::from_params(params)
    }

    /// Write this scaler as a pickled artifact
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_pickle::to_writer(&mut writer, &self.to_params(), SerOptions::new())
            .map_err(|e| Error::artifact(format!("Failed to encode scaler: {}", e)))
    }

    /// Build a scaler from decoded artifact parameters
    pub fn from_params(params: ScalerParams) -> Result<Self> {
        let normalized = params.kind.to_ascii_lowercase().replace(['_', '-'], "");
        let normalized = normalized.trim_end_matches("scaler");

        let (kind, stats) = match normalized {
            "standard" => (
                ScalerKind::Standard {
                    with_mean: params.with_mean,
                    with_std: params.with_std,
                },
                FittedStats {
                    offset: params.mean.filter(|_| params.with_mean),
                    scale: params.scale.filter(|_| params.with_std),
                },
            ),
            "minmax" => {
                let feature_range = pair(&params.feature_range, "feature_range")?;
                if feature_range.0 >= feature_range.1 {
                    return Err(Error::artifact(format!(
                        "minimum of feature_range must be smaller than maximum, got {:?}",
                        feature_range
                    )));
                }
                let stats = match (params.min, params.scale, params.data_min, params.data_max) {
                    (Some(min), Some(scale), _, _) => FittedStats {
                        offset: Some(min),
                        scale: Some(scale),
                    },
                    (_, _, Some(data_min), Some(data_max)) => {
                        min_max_from_range(feature_range, &data_min, &data_max)?
                    }
                    _ => FittedStats::default(),
                };
                (
                    ScalerKind::MinMax {
                        feature_range,
                        clip: params.clip,
                    },
                    stats,
                )
            }
            "maxabs" => {
                let scale = params
                    .scale
                    .or_else(|| params.max_abs.map(|m| m.into_iter().map(handle_zero).collect()));
                (ScalerKind::MaxAbs, FittedStats { offset: None, scale })
            }
            "robust" => {
                let quantile_range = pair(&params.quantile_range, "quantile_range")?;
                if !(0.0 <= quantile_range.0
                    && quantile_range.0 <= quantile_range.1
                    && quantile_range.1 <= 100.0)
                {
                    return Err(Error::artifact(format!(
                        "invalid quantile_range: {:?}",
                        quantile_range
                    )));
                }
                if params.unit_variance {
                    return Err(Error::artifact(
                        "robust scaler with unit_variance is not supported",
                    ));
                }
                (
                    ScalerKind::Robust {
                        with_centering: params.with_centering,
                        with_scaling: params.with_scaling,
                        quantile_range,
                    },
                    FittedStats {
                        offset: params.center.filter(|_| params.with_centering),
                        scale: params.scale.filter(|_| params.with_scaling),
                    },
                )
            }
            _ => {
                return Err(Error::artifact(format!(
                    "unsupported scaler kind '{}'",
                    params.kind
                )))
            }
        };

        let mut scaler = Self::new(kind, stats)?;
        if let Some(declared) = params.n_features_in {
            if let Some(width) = scaler.n_features {
                if width != declared {
                    return Err(Error::artifact(format!(
                        "n_features_in is {} but statistics cover {} features",
                        declared, width
                    )));
                }
            }
            scaler.n_features = Some(declared);
        }
        Ok(scaler)
    }

    /// Convert back to artifact parameters
    pub fn to_params(&self) -> ScalerParams {
        let mut params = ScalerParams::new(self.kind.name());
        params.n_features_in = self.n_features;
        match self.kind {
            ScalerKind::Standard {
                with_mean,
                with_std,
            } => {
                params.with_mean = with_mean;
                params.with_std = with_std;
                params.mean = self.stats.offset.clone();
                params.scale = self.stats.scale.clone();
            }
            ScalerKind::MinMax {
                feature_range,
                clip,
            } => {
                params.feature_range = vec![feature_range.0, feature_range.1];
                params.clip = clip;
                params.min = self.stats.offset.clone();
                params.scale = self.stats.scale.clone();
            }
            ScalerKind::MaxAbs => {
                params.scale = self.stats.scale.clone();
            }
            ScalerKind::Robust {
                with_centering,
                with_scaling,
                quantile_range,
            } => {
                params.with_centering = with_centering;
                params.with_scaling = with_scaling;
                params.quantile_range = vec![quantile_range.0, quantile_range.1];
                params.center = self.stats.offset.clone();
                params.scale = self.stats.scale.clone();
            }
        }
        params
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn stats(&self) -> &FittedStats {
        &self.stats
    }

    /// Number of features the learned statistics cover, if fitted
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Scale `rows` with the statistics stored in the artifact
    pub fn transform(&self, rows: &FeatureMatrix) -> Result<FeatureMatrix> {
        if let Some(expected) = self.n_features {
            if rows.ncols() != expected {
                return Err(Error::scaler(format!(
                    "scaler expects {} features, got {}",
                    expected,
                    rows.ncols()
                )));
            }
        }
        apply(self.kind, &self.stats, rows)
    }

    /// Learn fresh statistics from `rows` without touching the artifact
    pub fn fit(&self, rows: &FeatureMatrix) -> Result<FittedStats> {
        let n = rows.nrows();
        if n == 0 {
            return Err(Error::scaler("cannot fit a scaler on zero rows"));
        }

        let columns = || rows.columns().into_iter();
        let stats = match self.kind {
            ScalerKind::Standard {
                with_mean,
                with_std,
            } => {
                let moments: Vec<(f64, f64)> = columns().map(mean_and_var).collect();
                FittedStats {
                    offset: with_mean.then(|| moments.iter().map(|(m, _)| *m).collect()),
                    scale: with_std.then(|| {
                        moments
                            .iter()
                            .map(|&(mean, var)| {
                                if is_constant_feature(var, mean, n) {
                                    1.0
                                } else {
                                    var.sqrt()
                                }
                            })
                            .collect()
                    }),
                }
            }
            ScalerKind::MinMax { feature_range, .. } => {
                let data_min: Vec<f64> = columns()
                    .map(|c| c.iter().copied().fold(f64::INFINITY, f64::min))
                    .collect();
                let data_max: Vec<f64> = columns()
                    .map(|c| c.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                    .collect();
                min_max_from_range(feature_range, &data_min, &data_max)?
            }
            ScalerKind::MaxAbs => FittedStats {
                offset: None,
                scale: Some(
                    columns()
                        .map(|c| handle_zero(c.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))))
                        .collect(),
                ),
            },
            ScalerKind::Robust {
                with_centering,
                with_scaling,
                quantile_range,
            } => {
                let sorted: Vec<Vec<f64>> = columns()
                    .map(|c| {
                        let mut v = c.to_vec();
                        v.sort_by(|a, b| a.total_cmp(b));
                        v
                    })
                    .collect();
                FittedStats {
                    offset: with_centering.then(|| sorted.iter().map(|v| median(v)).collect()),
                    scale: with_scaling.then(|| {
                        sorted
                            .iter()
                            .map(|v| {
                                handle_zero(
                                    percentile(v, quantile_range.1)
                                        - percentile(v, quantile_range.0),
                                )
                            })
                            .collect()
                    }),
                }
            }
        };
        Ok(stats)
    }

    /// Fit on `rows`, then scale them with what was just learned.
    ///
    /// This is the per-request behaviour of the deployed model. With a
    /// single row the standard and robust scalers return all zeros and
    /// min-max returns the lower end of `feature_range`, whatever the input.
    pub fn fit_transform(&self, rows: &FeatureMatrix) -> Result<FeatureMatrix> {
        let stats = self.fit(rows)?;
        apply(self.kind, &stats, rows)
    }
}

fn apply(kind: ScalerKind, stats: &FittedStats, rows: &FeatureMatrix) -> Result<FeatureMatrix> {
    let mut out = rows.clone();
    match kind {
        ScalerKind::MinMax {
            feature_range: (lo, hi),
            clip,
        } => {
            let scale = require(&stats.scale, "scale", rows.ncols())?;
            let min = require(&stats.offset, "min", rows.ncols())?;
            for (mut col, (s, m)) in out.columns_mut().into_iter().zip(scale.iter().zip(min)) {
                col.mapv_inplace(|x| x * s + m);
            }
            if clip {
                out.mapv_inplace(|x| x.clamp(lo, hi));
            }
        }
        ScalerKind::Standard {
            with_mean: center,
            with_std: scaled,
        }
        | ScalerKind::Robust {
            with_centering: center,
            with_scaling: scaled,
            ..
        } => {
            if center {
                let offset = require(&stats.offset, "center", rows.ncols())?;
                for (mut col, c) in out.columns_mut().into_iter().zip(offset) {
                    col.mapv_inplace(|x| x - c);
                }
            }
            if scaled {
                let scale = require(&stats.scale, "scale", rows.ncols())?;
                for (mut col, s) in out.columns_mut().into_iter().zip(scale) {
                    col.mapv_inplace(|x| x / s);
                }
            }
        }
        ScalerKind::MaxAbs => {
            let scale = require(&stats.scale, "scale", rows.ncols())?;
            for (mut col, s) in out.columns_mut().into_iter().zip(scale) {
                col.mapv_inplace(|x| x / s);
            }
        }
    }
    Ok(out)
}

fn require<'a>(stat: &'a Option<Vec<f64>>, name: &str, width: usize) -> Result<&'a [f64]> {
    let values = stat
        .as_deref()
        .ok_or_else(|| Error::scaler(format!("scaler is not fitted: missing {}", name)))?;
    if values.len() != width {
        return Err(Error::scaler(format!(
            "scaler {} covers {} features, got {}",
            name,
            values.len(),
            width
        )));
    }
    Ok(values)
}

fn pair(values: &[f64], name: &str) -> Result<(f64, f64)> {
    match values {
        [lo, hi] => Ok((*lo, *hi)),
        _ => Err(Error::artifact(format!(
            "{} must have exactly two values, got {}",
            name,
            values.len()
        ))),
    }
}

fn min_max_from_range(
    feature_range: (f64, f64),
    data_min: &[f64],
    data_max: &[f64],
) -> Result<FittedStats> {
    if data_min.len() != data_max.len() {
        return Err(Error::artifact("data_min and data_max differ in length"));
    }
    let (lo, hi) = feature_range;
    let scale: Vec<f64> = data_min
        .iter()
        .zip(data_max)
        .map(|(min, max)| (hi - lo) / handle_zero(max - min))
        .collect();
    let offset = data_min
        .iter()
        .zip(&scale)
        .map(|(min, s)| lo - min * s)
        .collect();
    Ok(FittedStats {
        offset: Some(offset),
        scale: Some(scale),
    })
}

/// Mean and population variance, with the same rounding correction
/// scikit-learn applies on a first fit.
fn mean_and_var(col: ArrayView1<f64>) -> (f64, f64) {
    let n = col.len() as f64;
    let mean = col.iter().sum::<f64>() / n;
    let (correction, squares) = col.iter().fold((0.0, 0.0), |(c, s), &x| {
        let d = x - mean;
        (c + d, s + d * d)
    });
    let var = (squares - correction * correction / n) / n;
    (mean, var)
}

fn is_constant_feature(var: f64, mean: f64, n_samples: usize) -> bool {
    let n = n_samples as f64;
    let eps = f64::EPSILON;
    let upper_bound = n * eps * var + (n * mean * eps).powi(2);
    var <= upper_bound
}

/// Replace near-zero scales with 1 so constant features pass through
fn handle_zero(scale: f64) -> f64 {
    if scale < 10.0 * f64::EPSILON {
        1.0
    } else {
        scale
    }
}

/// Median of a sorted, non-empty slice
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Linear-interpolated percentile of a sorted, non-empty slice
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let last = sorted.len() - 1;
    let index = q / 100.0 * last as f64;
    let lo = index.floor() as usize;
    let hi = (lo + 1).min(last);
    let t = index - lo as f64;
    let (a, b) = (sorted[lo], sorted[hi]);
    let diff = b - a;
    if t >= 0.5 {
        b - diff * (1.0 - t)
    } else {
        a + diff * t
    }
}
