//! Keeper - customer churn prediction
//!
//! This crate provides:
//! - Preprocessing of client tables into standardized feature matrices
//! - Native implementations of the rated model families
//! - Model rating with best-of and top-N selection
//! - Batch prediction written back to CSV or XLSX
//!
//! # Modules
//!
//! - [`preprocessing`] - Schema checks, one-hot encoding, standardization
//! - [`training`] - Trees, ensembles, boosting and the regression network
//! - [`rating`] - Roster rating, best-of, top-N and reports
//! - [`export`] - Persisted model store
//! - [`visualization`] - Rating charts
//! - [`orchestrator`] - A full prediction run
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod rating;

// Run wiring
pub mod config;
pub mod orchestrator;

// Utilities
pub mod export;
pub mod utils;
pub mod visualization;

// Services
pub mod cli;

pub use error::{KeeperError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KeeperError, Result};

    // Preprocessing
    pub use crate::preprocessing::{ChurnPreprocessor, ChurnSchema, FeatureSet, Mode};

    // Training
    pub use crate::training::{create_model, ModelKind, NetworkConfig, PersistedModel, TrainedModel};

    // Rating
    pub use crate::rating::{rate_models, Metric, ModelRating, RatingOptions, RatingRecord};

    // Export
    pub use crate::export::ModelStore;

    // Run
    pub use crate::config::RunConfig;
    pub use crate::orchestrator::{run, RunSummary};
}
