//! Data preprocessing module
//!
//! Turns raw client tables into standardized feature matrices:
//! - Schema validation of the declared columns
//! - Removal of non-predictive columns and incomplete rows
//! - One-hot encoding of categorical columns
//! - Standard scaling fit on the processed table

mod config;
mod encoder;
mod pipeline;
mod scaler;

pub use config::{CategoricalColumn, ChurnSchema};
pub use encoder::OneHotEncoder;
pub use pipeline::{ChurnPreprocessor, EncodedTable, FeatureSet, Mode};
pub use scaler::StandardScaler;
