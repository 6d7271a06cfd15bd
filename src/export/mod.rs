//! Model persistence
//!
//! Trained models are stored as pretty-printed JSON artifacts, one per
//! model family, together with the feature names they were fit on.

mod store;

pub use store::ModelStore;
