//! Run configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, Result};
use crate::rating::Metric;
use crate::training::{ModelKind, NetworkConfig};
use crate::utils::TableFormat;

/// Everything one prediction run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Client table to predict (CSV or XLSX)
    pub clients: PathBuf,

    /// Annotated output table; format follows the extension
    pub output: PathBuf,

    /// Labelled training table
    pub train_data: PathBuf,

    /// Directory of persisted models
    pub models_dir: PathBuf,

    /// Fit the chosen model instead of loading it
    pub train: bool,

    /// Rate the whole roster and use the best model
    pub rate: bool,

    /// Where rating charts go; `None` disables them
    pub charts_dir: Option<PathBuf>,

    pub best_report: PathBuf,

    pub top_report: PathBuf,

    /// Size of the top-N kept after rating
    pub num_top: usize,

    /// Metric for the top-N and for the model chosen after rating
    pub top_by: Metric,

    /// Skip pruning the model directory to the top-N
    pub keep_all: bool,

    /// Outcome text for predictions at or above the threshold
    pub positive_label: String,

    pub negative_label: String,

    pub threshold: f64,

    /// Seed for the rating split and the seeded model families
    pub random_state: u64,

    pub network: NetworkConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            clients: PathBuf::new(),
            output: PathBuf::from("predictions/pred.csv"),
            train_data: PathBuf::from("data/train.csv"),
            models_dir: PathBuf::from("models"),
            train: false,
            rate: false,
            charts_dir: Some(PathBuf::from("rating/charts")),
            best_report: PathBuf::from("rating/best.csv"),
            top_report: PathBuf::from("rating/top.csv"),
            num_top: 3,
            top_by: Metric::Mse,
            keep_all: false,
            positive_label: "Will churn".to_string(),
            negative_label: "Will stay".to_string(),
            threshold: 0.5,
            random_state: 42,
            network: NetworkConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(clients: impl AsRef<Path>) -> Self {
        Self {
            clients: clients.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, path: impl AsRef<Path>) -> Self {
        self.output = path.as_ref().to_path_buf();
        self
    }

    pub fn with_train_data(mut self, path: impl AsRef<Path>) -> Self {
        self.train_data = path.as_ref().to_path_buf();
        self
    }

    pub fn with_models_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.models_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_train(mut self, train: bool) -> Self {
        self.train = train;
        self
    }

    pub fn with_rate(mut self, rate: bool) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_charts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.charts_dir = dir;
        self
    }

    pub fn with_best_report(mut self, path: impl AsRef<Path>) -> Self {
        self.best_report = path.as_ref().to_path_buf();
        self
    }

    pub fn with_top_report(mut self, path: impl AsRef<Path>) -> Self {
        self.top_report = path.as_ref().to_path_buf();
        self
    }

    pub fn with_num_top(mut self, n: usize) -> Self {
        self.num_top = n;
        self
    }

    pub fn with_top_by(mut self, metric: Metric) -> Self {
        self.top_by = metric;
        self
    }

    pub fn with_keep_all(mut self, keep_all: bool) -> Self {
        self.keep_all = keep_all;
        self
    }

    pub fn with_labels(mut self, positive: impl Into<String>, negative: impl Into<String>) -> Self {
        self.positive_label = positive.into();
        self.negative_label = negative.into();
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Check paths and rating settings before any file is read
    pub fn validate(&self) -> Result<()> {
        if self.clients.as_os_str().is_empty() {
            return Err(KeeperError::ConfigError("no client table given".to_string()));
        }

        TableFormat::from_path(&self.clients)?;
        TableFormat::from_path(&self.train_data)?;
        TableFormat::for_output(&self.output)?;

        if self.rate {
            TableFormat::for_output(&self.best_report)?;
            TableFormat::for_output(&self.top_report)?;

            if self.num_top == 0 || self.num_top > ModelKind::ROSTER.len() {
                return Err(KeeperError::OutOfRangeError {
                    requested: self.num_top,
                    available: ModelKind::ROSTER.len(),
                });
            }
        }

        if !self.threshold.is_finite() {
            return Err(KeeperError::ConfigError(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if self.positive_label == self.negative_label {
            return Err(KeeperError::ConfigError(format!(
                "outcome labels must differ, both are '{}'",
                self.positive_label
            )));
        }

        Ok(())
    }
}
