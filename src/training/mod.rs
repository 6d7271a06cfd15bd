//! Model training module
//!
//! Native implementations of the rated model families:
//! - Decision trees, Random Forests, Extra Trees and Bagging
//! - AdaBoost over decision stumps
//! - Gradient boosting and histogram gradient boosting
//! - A feed-forward regression network trained with Adam

pub mod adaboost;
pub mod bagging;
pub mod decision_tree;
pub mod extra_trees;
pub mod gradient_boosting;
pub mod hist_gradient_boosting;
mod models;
pub mod neural_network;
pub mod random_forest;
mod split;

pub use adaboost::AdaBoostClassifier;
pub use bagging::BaggingClassifier;
pub use decision_tree::{Criterion, DecisionTree, Splitter, TreeNode};
pub use extra_trees::ExtraTreesClassifier;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use hist_gradient_boosting::{HistGradientBoostingClassifier, HistGradientBoostingConfig};
pub use models::{check_feature_names, Model, ModelKind, ModelMetrics, PersistedModel, TrainedModel};
pub use neural_network::{create_model, Activation, AdamConfig, HiddenLayer, NetworkConfig, NeuralNetRegressor};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::{train_test_split, TrainTestSplit};
