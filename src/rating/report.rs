//! Best-of and top-N report tables

use std::path::Path;

use polars::prelude::*;
use tracing::info;

use super::{BestModels, Metric, RatingRecord};
use crate::error::Result;
use crate::utils::DataSaver;

/// One row per metric: the winning model and its score
pub fn write_best_report(best: &BestModels, path: &Path) -> Result<()> {
    let metrics: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
    let models: Vec<&str> = Metric::ALL.iter().map(|&m| best.get(m).name()).collect();
    let values: Vec<f64> = Metric::ALL.iter().map(|&m| m.value(best.get(m))).collect();

    let mut df = df!(
        "metric" => metrics,
        "model" => models,
        "value" => values,
    )?;
    DataSaver::save_auto(&mut df, path)?;

    info!(path = %path.display(), "Wrote best models report");
    Ok(())
}

/// Ranked top-N models with all three scores
pub fn write_top_report(top: &[RatingRecord], metric: Metric, path: &Path) -> Result<()> {
    let ranks: Vec<u32> = (1..=top.len() as u32).collect();
    let models: Vec<&str> = top.iter().map(|r| r.name()).collect();

    let mut df = df!(
        "rank" => ranks,
        "model" => models,
        "mse" => top.iter().map(|r| r.mse).collect::<Vec<f64>>(),
        "mae" => top.iter().map(|r| r.mae).collect::<Vec<f64>>(),
        "r2_score" => top.iter().map(|r| r.r2_score).collect::<Vec<f64>>(),
    )?;
    DataSaver::save_auto(&mut df, path)?;

    info!(path = %path.display(), top_by = %metric, n = top.len(), "Wrote top models report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::ModelRating;
    use crate::training::ModelKind;
    use crate::utils::DataLoader;

    fn rating() -> ModelRating {
        ModelRating::new(vec![
            RatingRecord::new(ModelKind::ExtraTreesClassifier, 0.5, 0.3, 0.1),
            RatingRecord::new(ModelKind::BaggingClassifier, 0.2, 0.2, 0.7),
            RatingRecord::new(ModelKind::AdaBoostClassifier, 0.9, 0.6, -0.2),
        ])
    }

    #[test]
    fn test_best_report_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rating").join("best.csv");

        write_best_report(&rating().best_models().unwrap(), &path).unwrap();

        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.height(), 3);
        let models: Vec<Option<&str>> = df.column("model").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(models, vec![Some("BaggingClassifier"); 3]);
    }

    #[test]
    fn test_top_report_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.xlsx");
        let top = rating().top(Metric::Mse, 2).unwrap();

        write_top_report(&top, Metric::Mse, &path).unwrap();

        let df = DataLoader::new().load_auto(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 5);
    }
}
