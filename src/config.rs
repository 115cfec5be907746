//! Analysis thresholds and pipeline settings, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Significance threshold for correlation and chi-square tests
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;
/// Monthly-mean coefficient of variation (percent) above which seasonality counts as strong
pub const STRONG_SEASONALITY_CV: f64 = 20.0;
/// IQR multiplier for outlier detection
pub const OUTLIER_IQR_MULTIPLIER: f64 = 3.0;
/// Z-score threshold for outlier detection
pub const OUTLIER_ZSCORE_THRESHOLD: f64 = 3.0;
/// Number of groups kept by ranking outputs
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub significance_level: f64,
    pub strong_seasonality_cv: f64,
    pub outlier_iqr_multiplier: f64,
    pub outlier_zscore_threshold: f64,
    pub top_n: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: SIGNIFICANCE_THRESHOLD,
            strong_seasonality_cv: STRONG_SEASONALITY_CV,
            outlier_iqr_multiplier: OUTLIER_IQR_MULTIPLIER,
            outlier_zscore_threshold: OUTLIER_ZSCORE_THRESHOLD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Settings of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub chart_width: u32,
    pub chart_height: u32,
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Dataset"),
            output_dir: PathBuf::from("outputs"),
            chart_width: 1200,
            chart_height: 600,
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Read a [`PipelineConfig`] from a JSON file. Absent fields keep their defaults.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PipelineConfig = serde_json::from_str(&content)?;
    Ok(config)
}
