//! Visualization module: rating charts rendered with plotters

mod charts;

pub use charts::render_rating_charts;
