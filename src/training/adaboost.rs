//! AdaBoost (Adaptive Boosting) implementation
//!
//! AdaBoost builds an ensemble of weak learners (decision stumps), weighting
//! misclassified samples more heavily in subsequent rounds.

use super::gradient_boosting::binary_targets;
use crate::error::{KeeperError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Predicted 0/1 target when feature <= threshold
    left_label: f64,
    /// Predicted 0/1 target when feature > threshold
    right_label: f64,
}

impl Stump {
    fn predict_sample(&self, sample: &ArrayView1<f64>) -> f64 {
        if sample[self.feature_index] <= self.threshold {
            self.left_label
        } else {
            self.right_label
        }
    }
}

/// AdaBoost Classifier (binary SAMME)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    classes: Vec<f64>,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Find the stump with the lowest weighted error
    fn fit_stump(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> Stump {
        let total_pos: f64 = y.iter().zip(weights).filter(|&(&t, _)| t == 1.0).map(|(_, w)| w).sum();
        let total_neg: f64 = weights.sum() - total_pos;

        let majority = if total_pos > total_neg { 1.0 } else { 0.0 };
        let constant = (
            total_pos.min(total_neg),
            Stump {
                feature_index: 0,
                threshold: f64::MAX,
                left_label: majority,
                right_label: majority,
            },
        );

        let per_feature: Vec<(f64, Stump)> = (0..x.ncols())
            .into_par_iter()
            .filter_map(|f| {
                let col = x.column(f);
                let mut order: Vec<usize> = (0..x.nrows()).collect();
                order.sort_by(|&a, &b| col[a].total_cmp(&col[b]));

                let mut left_pos = 0.0;
                let mut left_neg = 0.0;
                let mut best: Option<(f64, Stump)> = None;

                for pos in 0..order.len().saturating_sub(1) {
                    let i = order[pos];
                    if y[i] == 1.0 {
                        left_pos += weights[i];
                    } else {
                        left_neg += weights[i];
                    }

                    let value = col[i];
                    let next = col[order[pos + 1]];
                    if value >= next {
                        continue;
                    }

                    // left -> 1, right -> 0 and the mirrored assignment
                    let err_left_pos = left_neg + (total_pos - left_pos);
                    let err_left_neg = left_pos + (total_neg - left_neg);
                    let (error, left_label) = if err_left_pos < err_left_neg {
                        (err_left_pos, 1.0)
                    } else {
                        (err_left_neg, 0.0)
                    };

                    if best.as_ref().map_or(true, |(e, _)| error < *e) {
                        best = Some((
                            error,
                            Stump {
                                feature_index: f,
                                threshold: (value + next) / 2.0,
                                left_label,
                                right_label: 1.0 - left_label,
                            },
                        ));
                    }
                }
                best
            })
            .collect();

        // First feature wins ties; a split must beat the constant stump
        per_feature
            .into_iter()
            .fold(constant, |best, candidate| {
                if candidate.0 < best.0 {
                    candidate
                } else {
                    best
                }
            })
            .1
    }

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

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        self.stumps.clear();
        self.alphas.clear();

        for _round in 0..self.n_estimators {
            let stump = Self::fit_stump(x, &targets, &weights);

            let missed: Vec<bool> = x
                .rows()
                .into_iter()
                .zip(targets.iter())
                .map(|(row, &t)| stump.predict_sample(&row) != t)
                .collect();

            let error: f64 = weights
                .iter()
                .zip(&missed)
                .filter(|&(_, &m)| m)
                .map(|(w, _)| w)
                .sum();

            // Perfect fit
            if error <= 0.0 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance
            if error >= 0.5 {
                if self.stumps.is_empty() {
                    self.stumps.push(stump);
                    self.alphas.push(1.0);
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();

            for (w, &m) in weights.iter_mut().zip(&missed) {
                if m {
                    *w *= alpha.exp();
                }
            }
            let w_sum = weights.sum();
            if w_sum > 0.0 {
                weights /= w_sum;
            }

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(KeeperError::ModelNotFitted);
        }

        let negative = self.classes[0];
        let positive = *self.classes.last().unwrap_or(&negative);

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let score: f64 = self
                    .stumps
                    .iter()
                    .zip(&self.alphas)
                    .map(|(s, a)| if s.predict_sample(&row) == 1.0 { *a } else { -*a })
                    .sum();
                if score > 0.0 {
                    positive
                } else {
                    negative
                }
            })
            .collect())
    }

    /// Number of fitted stumps, fewer than `n_estimators` on early stop
    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_adaboost_separable() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 3.0], [6.0, 5.0], [7.0, 8.0], [8.0, 6.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = AdaBoostClassifier::default();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        // A single stump separates the classes
        assert_eq!(model.n_stumps(), 1);
    }

    #[test]
    fn test_adaboost_combines_stumps() {
        // Positive only in the middle band; no single stump is exact
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0];

        let mut model = AdaBoostClassifier::new(20, 1.0);
        model.fit(&x, &y).unwrap();

        assert!(model.n_stumps() > 1);
        let accuracy = model
            .predict(&x)
            .unwrap()
            .iter()
            .zip(y.iter())
            .filter(|(p, t)| p == t)
            .count();
        assert!(accuracy >= 6, "only {} of 8 correct", accuracy);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = AdaBoostClassifier::default();
        assert!(model.predict(&array![[1.0]]).is_err());
    }
}
