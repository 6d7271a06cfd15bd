//! Decision tree implementation

use crate::error::{KeeperError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// How thresholds are chosen at each node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Splitter {
    /// Best threshold over all distinct values
    Best,
    /// One uniformly drawn threshold per candidate feature
    Random,
}

/// Running statistics of the samples on one side of a split
#[derive(Debug, Clone)]
struct NodeStats {
    n: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl NodeStats {
    fn new(n_classes: usize) -> Self {
        Self {
            n: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn push(&mut self, y: f64, class: Option<usize>) {
        self.n += 1;
        self.sum += y;
        self.sq_sum += y * y;
        if let Some(c) = class {
            self.class_counts[c] += 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let n = self.n as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            // Var = E[X²] - E[X]²
            Criterion::MSE => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}

/// Training targets shared by every node of one fit
struct Targets<'a> {
    y: &'a Array1<f64>,
    /// Class index per sample, classification only
    class_idx: Option<Vec<usize>>,
    n_classes: usize,
}

impl Targets<'_> {
    fn class_of(&self, i: usize) -> Option<usize> {
        self.class_idx.as_ref().map(|c| c[i])
    }

    fn stats(&self, indices: &[usize]) -> NodeStats {
        let mut stats = NodeStats::new(self.n_classes);
        for &i in indices {
            stats.push(self.y[i], self.class_of(i));
        }
        stats
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features drawn at each node, all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Threshold strategy
    pub splitter: Splitter,
    /// Seed for feature sampling and random thresholds
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Is classification task
    is_classification: bool,
    /// Sorted classes (for classification)
    classes: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            splitter: Splitter::Best,
            random_state: None,
            n_features: 0,
            is_classification: true,
            classes: Vec::new(),
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set the number of features drawn at each node
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Set threshold strategy
    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(KeeperError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 || n_features == 0 {
            return Err(KeeperError::TrainingError(
                "cannot fit a tree on an empty matrix".to_string(),
            ));
        }

        self.n_features = n_features;

        let targets = if self.is_classification {
            let mut classes: Vec<f64> = y.to_vec();
            classes.sort_by(f64::total_cmp);
            classes.dedup();
            let class_idx = y
                .iter()
                .map(|v| classes.partition_point(|c| c < v))
                .collect();
            let n_classes = classes.len();
            self.classes = classes;
            Targets {
                y,
                class_idx: Some(class_idx),
                n_classes,
            }
        } else {
            Targets {
                y,
                class_idx: None,
                n_classes: 0,
            }
        };

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, &targets, indices, 0, &mut rng);
        self.root = Some(root);

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = targets.stats(&indices);
        let impurity = stats.impurity(self.criterion);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.leaf(&stats);
        }

        let Some((feature_idx, threshold, _)) =
            self.find_best_split(x, targets, &indices, impurity, rng)
        else {
            return self.leaf(&stats);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        let left = Box::new(self.build_tree(x, targets, left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(x, targets, right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn leaf(&self, stats: &NodeStats) -> TreeNode {
        let value = if self.is_classification {
            // Majority class, lowest class on ties
            let mut best = 0;
            for (c, &count) in stats.class_counts.iter().enumerate() {
                if count > stats.class_counts[best] {
                    best = c;
                }
            }
            self.classes.get(best).copied().unwrap_or(0.0)
        } else if stats.n > 0 {
            stats.sum / stats.n as f64
        } else {
            0.0
        };
        TreeNode::Leaf {
            value,
            n_samples: stats.n,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut features = index::sample(rng, self.n_features, k.max(1)).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..self.n_features).collect(),
        }
    }

    /// Returns `(feature, threshold, impurity decrease)` of the best split
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64, f64)> {
        let features = self.candidate_features(rng);
        // Drawn up front so the parallel scan stays deterministic
        let draws: Vec<f64> = match self.splitter {
            Splitter::Random => features.iter().map(|_| rng.gen::<f64>()).collect(),
            Splitter::Best => Vec::new(),
        };

        let feature_results: Vec<Option<(usize, f64, f64)>> = features
            .par_iter()
            .enumerate()
            .map(|(k, &feature_idx)| match self.splitter {
                Splitter::Best => {
                    self.best_threshold(x, targets, indices, feature_idx, parent_impurity)
                }
                Splitter::Random => self.random_threshold(
                    x,
                    targets,
                    indices,
                    feature_idx,
                    parent_impurity,
                    draws[k],
                ),
            })
            .collect();

        // First feature wins ties
        let mut best: Option<(usize, f64, f64)> = None;
        for candidate in feature_results.into_iter().flatten() {
            if best.map_or(true, |b| candidate.2 > b.2) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_threshold(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let mut order: Vec<usize> = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

        let n = order.len();
        let total = targets.stats(&order);
        let mut left = NodeStats::new(targets.n_classes);

        let mut best_gain = 0.0f64;
        let mut best_threshold = None;

        for pos in 0..n - 1 {
            let i = order[pos];
            left.push(targets.y[i], targets.class_of(i));

            let value = x[[i, feature_idx]];
            let next = x[[order[pos + 1], feature_idx]];
            if value >= next {
                continue;
            }

            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                continue;
            }

            let right = NodeStats {
                n: right_n,
                sum: total.sum - left.sum,
                sq_sum: total.sq_sum - left.sq_sum,
                class_counts: total
                    .class_counts
                    .iter()
                    .zip(&left.class_counts)
                    .map(|(t, l)| t - l)
                    .collect(),
            };

            let weighted = (left_n as f64 * left.impurity(self.criterion)
                + right_n as f64 * right.impurity(self.criterion))
                / n as f64;
            let gain = parent_impurity - weighted;
            if gain > best_gain {
                best_gain = gain;
                best_threshold = Some((value + next) / 2.0);
            }
        }

        best_threshold.map(|t| (feature_idx, t, best_gain))
    }

    fn random_threshold(
        &self,
        x: &Array2<f64>,
        targets: &Targets,
        indices: &[usize],
        feature_idx: usize,
        parent_impurity: f64,
        draw: f64,
    ) -> Option<(usize, f64, f64)> {
        let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let v = x[[i, feature_idx]];
            (lo.min(v), hi.max(v))
        });
        if !(max > min) {
            return None;
        }

        let threshold = min + draw * (max - min);
        let mut left = NodeStats::new(targets.n_classes);
        let mut right = NodeStats::new(targets.n_classes);
        for &i in indices {
            if x[[i, feature_idx]] <= threshold {
                left.push(targets.y[i], targets.class_of(i));
            } else {
                right.push(targets.y[i], targets.class_of(i));
            }
        }
        if left.n < self.min_samples_leaf.max(1) || right.n < self.min_samples_leaf.max(1) {
            return None;
        }

        let n = indices.len() as f64;
        let weighted = (left.n as f64 * left.impurity(self.criterion)
            + right.n as f64 * right.impurity(self.criterion))
            / n;
        let gain = parent_impurity - weighted;
        (gain > 0.0).then_some((feature_idx, threshold, gain))
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(KeeperError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(KeeperError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| Self::predict_sample(root, &row))
            .collect())
    }

    fn predict_sample(node: &TreeNode, sample: &ArrayView1<f64>) -> f64 {
        match node {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if sample[*feature_idx] <= *threshold {
                    Self::predict_sample(left, sample)
                } else {
                    Self::predict_sample(right, sample)
                }
            }
        }
    }

    /// Overwrite every leaf reached by a row of `x` with `value` computed
    /// over the row indices routed to it. Leaves no row reaches are kept.
    pub(crate) fn refit_leaves<F>(&mut self, x: &Array2<f64>, value: F) -> Result<()>
    where
        F: Fn(&[usize]) -> f64,
    {
        let root = self.root.as_mut().ok_or(KeeperError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(KeeperError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        fn refit<F: Fn(&[usize]) -> f64>(
            node: &mut TreeNode,
            x: &Array2<f64>,
            indices: Vec<usize>,
            value: &F,
        ) {
            match node {
                TreeNode::Leaf { value: leaf, .. } => {
                    if !indices.is_empty() {
                        *leaf = value(&indices);
                    }
                }
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let (l, r): (Vec<usize>, Vec<usize>) = indices
                        .into_iter()
                        .partition(|&i| x[[i, *feature_idx]] <= *threshold);
                    refit(left, x, l, value);
                    refit(right, x, r, value);
                }
            }
        }

        refit(root, x, (0..x.nrows()).collect(), &value);
        Ok(())
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}
