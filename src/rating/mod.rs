//! Model rating: fit the roster on one seeded split, score every model and
//! rank them by a chosen metric

mod report;

pub use report::{write_best_report, write_top_report};

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{KeeperError, Result};
use crate::export::ModelStore;
use crate::training::{
    train_test_split, ModelKind, ModelMetrics, NetworkConfig, PersistedModel,
};

/// Metric a rating can be ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Mse,
    Mae,
    R2Score,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Mse, Metric::Mae, Metric::R2Score];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Mse => "mse",
            Metric::Mae => "mae",
            Metric::R2Score => "r2_score",
        }
    }

    /// Whether larger values rank higher
    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::R2Score)
    }

    pub fn value(&self, record: &RatingRecord) -> f64 {
        match self {
            Metric::Mse => record.mse,
            Metric::Mae => record.mae,
            Metric::R2Score => record.r2_score,
        }
    }

    /// Strictly better; NaN never beats anything and loses to any number
    fn is_better(&self, a: f64, b: f64) -> bool {
        match (a.is_nan(), b.is_nan()) {
            (true, _) => false,
            (false, true) => true,
            _ if self.higher_is_better() => a > b,
            _ => a < b,
        }
    }

    /// Index of the best record, first occurrence on ties
    fn best_index(&self, records: &[RatingRecord]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, record) in records.iter().enumerate() {
            match best {
                Some(b) if !self.is_better(self.value(record), self.value(&records[b])) => {}
                _ => best = Some(i),
            }
        }
        best
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mse" => Ok(Metric::Mse),
            "mae" => Ok(Metric::Mae),
            "r2_score" => Ok(Metric::R2Score),
            other => Err(KeeperError::InvalidMetricError(other.to_string())),
        }
    }
}

/// Scores of one model on the held-out partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub kind: ModelKind,
    pub mse: f64,
    pub mae: f64,
    pub r2_score: f64,
}

impl RatingRecord {
    pub fn new(kind: ModelKind, mse: f64, mae: f64, r2_score: f64) -> Self {
        Self { kind, mse, mae, r2_score }
    }

    pub fn from_metrics(kind: ModelKind, metrics: ModelMetrics) -> Self {
        Self::new(kind, metrics.mse, metrics.mae, metrics.r2)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Best record for each metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestModels {
    pub mse: RatingRecord,
    pub mae: RatingRecord,
    pub r2_score: RatingRecord,
}

impl BestModels {
    pub fn get(&self, metric: Metric) -> &RatingRecord {
        match metric {
            Metric::Mse => &self.mse,
            Metric::Mae => &self.mae,
            Metric::R2Score => &self.r2_score,
        }
    }
}

/// Records of one rating run, in rating order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelRating {
    records: Vec<RatingRecord>,
}

impl ModelRating {
    pub fn new(records: Vec<RatingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn best_by(&self, metric: Metric) -> Option<&RatingRecord> {
        metric.best_index(&self.records).map(|i| &self.records[i])
    }

    /// Minimum MSE and MAE, maximum R²; first occurrence wins ties
    pub fn best_models(&self) -> Result<BestModels> {
        let pick = |metric: Metric| {
            self.best_by(metric)
                .copied()
                .ok_or_else(|| KeeperError::DataError("no models were rated".to_string()))
        };
        Ok(BestModels {
            mse: pick(Metric::Mse)?,
            mae: pick(Metric::Mae)?,
            r2_score: pick(Metric::R2Score)?,
        })
    }

    /// The `n` best records by `metric`, best first
    pub fn top(&self, metric: Metric, n: usize) -> Result<Vec<RatingRecord>> {
        if n == 0 || n > self.records.len() {
            return Err(KeeperError::OutOfRangeError {
                requested: n,
                available: self.records.len(),
            });
        }

        let mut remaining = self.records.clone();
        let mut top = Vec::with_capacity(n);
        while top.len() < n {
            match metric.best_index(&remaining) {
                Some(i) => top.push(remaining.remove(i)),
                None => break,
            }
        }
        Ok(top)
    }
}

/// Split and model settings for a rating run
#[derive(Debug, Clone)]
pub struct RatingOptions {
    /// Held-out fraction
    pub test_size: f64,
    pub random_state: u64,
    pub network: NetworkConfig,
}

impl Default for RatingOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            network: NetworkConfig::default(),
        }
    }
}

impl RatingOptions {
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
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
}

/// Fit every roster model on the training partition, persist it, and score
/// it on the held-out partition
pub fn rate_models(
    x: &Array2<f64>,
    y: &Array1<f64>,
    feature_names: &[String],
    store: &ModelStore,
    options: &RatingOptions,
) -> Result<ModelRating> {
    if feature_names.len() != x.ncols() {
        return Err(KeeperError::ShapeError {
            expected: format!("{} feature names", x.ncols()),
            actual: format!("{} feature names", feature_names.len()),
        });
    }

    let split = train_test_split(x, y, options.test_size, options.random_state)?;
    info!(
        train = split.y_train.len(),
        test = split.y_test.len(),
        models = ModelKind::ROSTER.len(),
        "Rating models"
    );

    let mut records = Vec::with_capacity(ModelKind::ROSTER.len());
    for kind in ModelKind::ROSTER {
        let start = Instant::now();
        let mut model = kind.build(x.ncols(), Some(options.random_state), &options.network);
        model.fit(&split.x_train, &split.y_train)?;

        let predictions = model.predict(&split.x_test)?;
        let metrics = ModelMetrics::compute(&split.y_test, &predictions)?;

        store.save(&PersistedModel::new(feature_names.to_vec(), model))?;

        info!(
            model = %kind,
            mse = metrics.mse,
            mae = metrics.mae,
            r2_score = metrics.r2,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rated model"
        );
        records.push(RatingRecord::from_metrics(kind, metrics));
    }

    debug!(records = records.len(), "Rating finished");
    Ok(ModelRating::new(records))
}
