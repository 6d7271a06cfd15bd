//! Model roster, trained model dispatch and evaluation metrics

use super::adaboost::AdaBoostClassifier;
use super::bagging::BaggingClassifier;
use super::decision_tree::DecisionTree;
use super::extra_trees::ExtraTreesClassifier;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::hist_gradient_boosting::HistGradientBoostingClassifier;
use super::neural_network::{NetworkConfig, NeuralNetRegressor};
use super::random_forest::RandomForest;
use crate::error::{KeeperError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trait for ML models
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

macro_rules! impl_model {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Model for $ty {
                fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
                    <$ty>::fit(self, x, y).map(|_| ())
                }

                fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
                    <$ty>::predict(self, x)
                }
            }
        )*
    };
}

impl_model!(
    HistGradientBoostingClassifier,
    ExtraTreesClassifier,
    BaggingClassifier,
    AdaBoostClassifier,
    RandomForest,
    GradientBoostingClassifier,
    DecisionTree,
    NeuralNetRegressor,
);

/// The model families that can be trained, rated and persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    HistGradientBoostingClassifier,
    ExtraTreesClassifier,
    BaggingClassifier,
    AdaBoostClassifier,
    RandomForestClassifier,
    GradientBoostingClassifier,
    DecisionTreeClassifier,
    NeuralNetRegression,
}

impl ModelKind {
    /// Rating order
    pub const ROSTER: [ModelKind; 8] = [
        ModelKind::HistGradientBoostingClassifier,
        ModelKind::ExtraTreesClassifier,
        ModelKind::BaggingClassifier,
        ModelKind::AdaBoostClassifier,
        ModelKind::RandomForestClassifier,
        ModelKind::GradientBoostingClassifier,
        ModelKind::DecisionTreeClassifier,
        ModelKind::NeuralNetRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::HistGradientBoostingClassifier => "HistGradientBoostingClassifier",
            ModelKind::ExtraTreesClassifier => "ExtraTreesClassifier",
            ModelKind::BaggingClassifier => "BaggingClassifier",
            ModelKind::AdaBoostClassifier => "AdaBoostClassifier",
            ModelKind::RandomForestClassifier => "RandomForestClassifier",
            ModelKind::GradientBoostingClassifier => "GradientBoostingClassifier",
            ModelKind::DecisionTreeClassifier => "DecisionTreeClassifier",
            ModelKind::NeuralNetRegression => "NeuralNetRegression",
        }
    }

    /// Untrained model of this family with library defaults
    pub fn build(
        &self,
        n_features: usize,
        random_state: Option<u64>,
        network: &NetworkConfig,
    ) -> TrainedModel {
        match self {
            ModelKind::HistGradientBoostingClassifier => {
                TrainedModel::HistGradientBoostingClassifier(HistGradientBoostingClassifier::default())
            }
            ModelKind::ExtraTreesClassifier => {
                let model = ExtraTreesClassifier::default();
                TrainedModel::ExtraTreesClassifier(match random_state {
                    Some(seed) => model.with_random_state(seed),
                    None => model,
                })
            }
            ModelKind::BaggingClassifier => {
                let model = BaggingClassifier::default();
                TrainedModel::BaggingClassifier(match random_state {
                    Some(seed) => model.with_random_state(seed),
                    None => model,
                })
            }
            ModelKind::AdaBoostClassifier => {
                TrainedModel::AdaBoostClassifier(AdaBoostClassifier::default())
            }
            ModelKind::RandomForestClassifier => {
                let model = RandomForest::new_classifier(100);
                TrainedModel::RandomForestClassifier(match random_state {
                    Some(seed) => model.with_random_state(seed),
                    None => model,
                })
            }
            ModelKind::GradientBoostingClassifier => {
                TrainedModel::GradientBoostingClassifier(GradientBoostingClassifier::new(
                    GradientBoostingConfig {
                        random_state,
                        ..Default::default()
                    },
                ))
            }
            ModelKind::DecisionTreeClassifier => {
                let model = DecisionTree::new_classifier();
                TrainedModel::DecisionTreeClassifier(match random_state {
                    Some(seed) => model.with_random_state(seed),
                    None => model,
                })
            }
            ModelKind::NeuralNetRegression => {
                let mut config = network.clone();
                if config.random_state.is_none() {
                    config.random_state = random_state;
                }
                TrainedModel::NeuralNetRegression(NeuralNetRegressor::new(config, n_features))
            }
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ROSTER
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| KeeperError::ConfigError(format!("unknown model '{}'", s)))
    }
}

/// Fitted (or fittable) model of any roster family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    HistGradientBoostingClassifier(HistGradientBoostingClassifier),
    ExtraTreesClassifier(ExtraTreesClassifier),
    BaggingClassifier(BaggingClassifier),
    AdaBoostClassifier(AdaBoostClassifier),
    RandomForestClassifier(RandomForest),
    GradientBoostingClassifier(GradientBoostingClassifier),
    DecisionTreeClassifier(DecisionTree),
    NeuralNetRegression(NeuralNetRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::HistGradientBoostingClassifier(_) => ModelKind::HistGradientBoostingClassifier,
            TrainedModel::ExtraTreesClassifier(_) => ModelKind::ExtraTreesClassifier,
            TrainedModel::BaggingClassifier(_) => ModelKind::BaggingClassifier,
            TrainedModel::AdaBoostClassifier(_) => ModelKind::AdaBoostClassifier,
            TrainedModel::RandomForestClassifier(_) => ModelKind::RandomForestClassifier,
            TrainedModel::GradientBoostingClassifier(_) => ModelKind::GradientBoostingClassifier,
            TrainedModel::DecisionTreeClassifier(_) => ModelKind::DecisionTreeClassifier,
            TrainedModel::NeuralNetRegression(_) => ModelKind::NeuralNetRegression,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::HistGradientBoostingClassifier(m) => m,
            TrainedModel::ExtraTreesClassifier(m) => m,
            TrainedModel::BaggingClassifier(m) => m,
            TrainedModel::AdaBoostClassifier(m) => m,
            TrainedModel::RandomForestClassifier(m) => m,
            TrainedModel::GradientBoostingClassifier(m) => m,
            TrainedModel::DecisionTreeClassifier(m) => m,
            TrainedModel::NeuralNetRegression(m) => m,
        }
    }

    fn as_model_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::HistGradientBoostingClassifier(m) => m,
            TrainedModel::ExtraTreesClassifier(m) => m,
            TrainedModel::BaggingClassifier(m) => m,
            TrainedModel::AdaBoostClassifier(m) => m,
            TrainedModel::RandomForestClassifier(m) => m,
            TrainedModel::GradientBoostingClassifier(m) => m,
            TrainedModel::DecisionTreeClassifier(m) => m,
            TrainedModel::NeuralNetRegression(m) => m,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.as_model_mut().fit(x, y)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }
}

/// A fitted model together with the feature names it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModel {
    pub kind: ModelKind,
    pub feature_names: Vec<String>,
    pub model: TrainedModel,
}

impl PersistedModel {
    pub fn new(feature_names: Vec<String>, model: TrainedModel) -> Self {
        Self {
            kind: model.kind(),
            feature_names,
            model,
        }
    }

    /// Fail when the inference features differ from the training features
    pub fn check_features(&self, feature_names: &[String]) -> Result<()> {
        check_feature_names(
            &self.feature_names,
            feature_names,
            format_args!("those {} was trained on", self.kind),
        )
    }
}

/// Fail with a `SchemaError` naming the missing and unexpected columns when
/// `actual` is not exactly `expected`, in order
pub fn check_feature_names(
    expected: &[String],
    actual: &[String],
    source: impl fmt::Display,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }

    let missing: Vec<&str> = expected
        .iter()
        .filter(|n| !actual.contains(n))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = actual
        .iter()
        .filter(|n| !expected.contains(n))
        .map(String::as_str)
        .collect();

    Err(KeeperError::SchemaError(format!(
        "features differ from {} (missing: [{}], unexpected: [{}])",
        source,
        missing.join(", "),
        unexpected.join(", ")
    )))
}

/// Regression-style metrics of predictions against the true labels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mse: f64,
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
}

impl ModelMetrics {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(KeeperError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(KeeperError::DataError("no samples to evaluate".to_string()));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self { mse, mae, r2 })
    }
}
