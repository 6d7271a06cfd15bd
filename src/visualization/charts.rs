//! Bar charts comparing the rated models

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::info;

use crate::error::{KeeperError, Result};
use crate::rating::{Metric, ModelRating};

const BAR_COLOR: RGBColor = RGBColor(70, 130, 180);

/// Metric, file name and axis title of each chart
const CHARTS: [(Metric, &str, &str); 3] = [
    (Metric::R2Score, "r2_scores.png", "R2 score"),
    (Metric::Mse, "MSE.png", "Mean squared error"),
    (Metric::Mae, "MAE.png", "Mean absolute error"),
];

fn chart_error(err: impl Display) -> KeeperError {
    KeeperError::ChartError(err.to_string())
}

/// Render one horizontal bar chart per metric into `dir`
pub fn render_rating_charts(rating: &ModelRating, dir: &Path) -> Result<Vec<PathBuf>> {
    if rating.is_empty() {
        return Err(KeeperError::ChartError("no rated models to plot".to_string()));
    }
    fs::create_dir_all(dir)?;

    let names: Vec<&str> = rating.records().iter().map(|r| r.name()).collect();
    let mut paths = Vec::with_capacity(CHARTS.len());

    for (metric, file_name, title) in CHARTS {
        let path = dir.join(file_name);
        let values: Vec<f64> = rating.records().iter().map(|r| metric.value(r)).collect();
        draw_bar_chart(&path, title, &names, &values)?;
        paths.push(path);
    }

    info!(dir = %dir.display(), charts = paths.len(), "Rendered rating charts");
    Ok(paths)
}

fn draw_bar_chart(path: &Path, title: &str, names: &[&str], values: &[f64]) -> Result<()> {
    let lo = values.iter().copied().filter(|v| v.is_finite()).fold(0.0_f64, f64::min);
    let hi = values.iter().copied().filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
    let pad = ((hi - lo) * 0.1).max(1e-3);
    let n = names.len() as i32;

    let height = 60 * names.len() as u32 + 120;
    let root = BitMapBackend::new(path, (960, height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 26))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(280)
        .build_cartesian_2d((lo - pad)..(hi + pad), (0..n).into_segmented())
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(names.len())
        .y_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => names
                .get(*i as usize)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .x_desc(title)
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(chart_error)?;

    // NaN scores get no bar
    chart
        .draw_series(
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .map(|(i, &v)| {
                    let i = i as i32;
                    let mut bar = Rectangle::new(
                        [(0.0, SegmentValue::Exact(i)), (v, SegmentValue::Exact(i + 1))],
                        BAR_COLOR.filled(),
                    );
                    bar.set_margin(8, 8, 0, 0);
                    bar
                }),
        )
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    Ok(())
}
