//! Bagging classifier: full-feature decision trees on bootstrap samples

use super::decision_tree::Splitter;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Bootstrap-aggregated decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaggingClassifier {
    ensemble: RandomForest,
}

impl Default for BaggingClassifier {
    fn default() -> Self {
        Self::new(10)
    }
}

impl BaggingClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            ensemble: RandomForest::new_classifier(n_estimators)
                .with_max_features(MaxFeatures::All)
                .with_splitter(Splitter::Best)
                .with_bootstrap(true),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.ensemble = self.ensemble.with_random_state(seed);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.ensemble.fit(x, y)?;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensemble.predict(x)
    }

    pub fn n_estimators(&self) -> usize {
        self.ensemble.n_estimators
    }
}
