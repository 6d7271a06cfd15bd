//! Extra Trees (Extremely Randomized Trees) implementation
//!
//! Trees are grown on the full training set; at each node a random subset
//! of features is drawn and each gets a single uniformly drawn threshold.

use super::decision_tree::Splitter;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Extremely randomized trees classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraTreesClassifier {
    ensemble: RandomForest,
}

impl Default for ExtraTreesClassifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExtraTreesClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            ensemble: RandomForest::new_classifier(n_estimators)
                .with_max_features(MaxFeatures::Sqrt)
                .with_splitter(Splitter::Random)
                .with_bootstrap(false),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.ensemble = self.ensemble.with_max_depth(depth);
        self
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

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.ensemble.predict_proba(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extra_trees_classifier() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 5.1],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = ExtraTreesClassifier::new(20).with_random_state(42);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_extra_trees_predict_proba() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut model = ExtraTreesClassifier::new(10).with_random_state(1);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), &[4, 2]);
        assert!(proba.rows().into_iter().all(|r| (r.sum() - 1.0).abs() < 1e-9));
    }
}
