//! Gradient Boosting implementation
//!
//! Binary classifier boosting shallow regression trees on the gradient of
//! the log loss. Tree structure is fit to the residuals; leaf values are
//! then replaced by a single Newton step, `Σ residual / Σ p(1 - p)`.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use crate::error::{KeeperError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: None,
        }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Map labels onto 0/1 by sorted class order
pub(crate) fn binary_targets(y: &Array1<f64>) -> Result<(Vec<f64>, Array1<f64>)> {
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    if classes.is_empty() || classes.len() > 2 {
        return Err(KeeperError::TrainingError(format!(
            "binary classifier needs one or two classes, got {}",
            classes.len()
        )));
    }
    let targets = y
        .iter()
        .map(|&v| if classes.len() == 2 && v == classes[1] { 1.0 } else { 0.0 })
        .collect();
    Ok((classes, targets))
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    classes: Vec<f64>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            classes: Vec::new(),
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    /// Fit binary classification
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(KeeperError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let (classes, targets) = binary_targets(y)?;
        self.classes = classes;

        let p = targets.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();

        for _ in 0..self.config.n_estimators {
            let probs = log_odds.mapv(sigmoid);
            // Negative gradient of the log loss
            let residuals = &targets - &probs;

            let sample_indices = self.subsample_indices(n_samples, &mut rng);
            let x_sub = x.select(Axis(0), &sample_indices);
            let y_sub: Array1<f64> = sample_indices.iter().map(|&i| residuals[i]).collect();
            let hessian: Vec<f64> = sample_indices
                .iter()
                .map(|&i| probs[i] * (1.0 - probs[i]))
                .collect();

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.gen());
            tree.fit(&x_sub, &y_sub)?;
            tree.refit_leaves(&x_sub, |rows| {
                let numerator: f64 = rows.iter().map(|&i| y_sub[i]).sum();
                let denominator: f64 = rows.iter().map(|&i| hessian[i]).sum();
                if denominator.abs() < 1e-150 {
                    0.0
                } else {
                    numerator / denominator
                }
            })?;

            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
            self.trees.push(tree);
        }

        Ok(self)
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        let negative = self.classes[0];
        let positive = *self.classes.last().unwrap_or(&negative);
        Ok(probs
            .iter()
            .map(|&p| if p >= 0.5 { positive } else { negative })
            .collect())
    }

    /// Probability of the higher class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.classes.is_empty() {
            return Err(KeeperError::ModelNotFitted);
        }

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }

        Ok(log_odds.mapv(sigmoid))
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.config.subsample < 1.0 {
            let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
            indices.shuffle(rng);
            indices.truncate(sample_size);
            indices.sort_unstable();
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 2), (0..200).map(|i| i as f64 * 0.1).collect())
            .unwrap();

        let y: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| if row[0] + row[1] > 10.0 { 1.0 } else { 0.0 })
            .collect();

        (x, y)
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = create_classification_data();
        let config = GradientBoostingConfig {
            n_estimators: 10,
            random_state: Some(42),
            ..Default::default()
        };

        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.len(), 100);

        let correct = y
            .iter()
            .zip(predictions.iter())
            .filter(|(&yi, &pi)| (yi - pi).abs() < 0.5)
            .count();
        let accuracy = correct as f64 / y.len() as f64;
        assert!(accuracy > 0.9, "Accuracy ({}) should be above 90%", accuracy);
    }

    #[test]
    fn test_imbalanced_split_separates_in_few_rounds() {
        // 75% positive, cleanly split at x = 25
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..100).map(|i| if i >= 25 { 1.0 } else { 0.0 }).collect();

        let config = GradientBoostingConfig {
            n_estimators: 5,
            random_state: Some(0),
            ..Default::default()
        };
        let mut model = GradientBoostingClassifier::new(config);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.trees.len(), 5);
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[0] < 0.5, "p(negative row) = {}", proba[0]);
        assert!(proba[99] > 0.75, "p(positive row) = {}", proba[99]);
    }

    #[test]
    fn test_rejects_multiclass_labels() {
        let (x, _) = create_classification_data();
        let y = Array1::from_iter((0..100).map(|i| (i % 3) as f64));

        let mut model = GradientBoostingClassifier::default();
        assert!(matches!(model.fit(&x, &y), Err(KeeperError::TrainingError(_))));
    }
}
