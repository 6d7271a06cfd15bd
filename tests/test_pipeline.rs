//! Integration test: full runs from client table to annotated output

mod common;

use std::path::Path;

use common::{churn_frame, client_frame, tiny_network, write_csv};
use keeper::config::RunConfig;
use keeper::export::ModelStore;
use keeper::orchestrator::{run, DEFAULT_MODEL, OUTCOME_COLUMN};
use keeper::training::ModelKind;
use keeper::utils::DataLoader;
use keeper::KeeperError;
use polars::prelude::*;

fn config_in(dir: &Path, clients: &Path) -> RunConfig {
    RunConfig::new(clients)
        .with_output(dir.join("predictions").join("pred.csv"))
        .with_train_data(dir.join("train.csv"))
        .with_models_dir(dir.join("models"))
        .with_best_report(dir.join("rating").join("best.csv"))
        .with_top_report(dir.join("rating").join("top.xlsx"))
        .with_charts_dir(None)
        .with_network(tiny_network())
}

fn outcomes(path: &Path) -> Vec<Option<String>> {
    let df = DataLoader::new().load_auto(path).unwrap();
    df.column(OUTCOME_COLUMN)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

#[test]
fn test_missing_gender_fails_before_models() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(12).drop("Gender").unwrap(), &clients);
    write_csv(&churn_frame(40), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients).with_train(true).with_rate(true);

    assert!(matches!(run(&config), Err(KeeperError::SchemaError(_))));
    assert!(!dir.path().join("models").exists());
    assert!(!dir.path().join("predictions").exists());
}

#[test]
fn test_train_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(15), &clients);
    write_csv(&churn_frame(60), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients).with_train(true);
    let summary = run(&config).unwrap();

    assert_eq!(summary.model, DEFAULT_MODEL);
    assert!(summary.trained);
    assert_eq!(summary.predicted, 15);
    assert!(ModelStore::new(dir.path().join("models")).exists(DEFAULT_MODEL));

    let labels = outcomes(&summary.output);
    assert_eq!(labels.len(), 15);
    assert!(labels
        .iter()
        .all(|l| matches!(l.as_deref(), Some("Will churn") | Some("Will stay"))));

    // Second run loads the saved network and predicts the same
    let again = run(&config.clone().with_train(false)).unwrap();
    assert!(!again.trained);
    assert_eq!(outcomes(&again.output), labels);
}

#[test]
fn test_missing_artifact_falls_back_to_training() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(10), &clients);
    write_csv(&churn_frame(40), &dir.path().join("train.csv"));

    let summary = run(&config_in(dir.path(), &clients)).unwrap();

    assert!(summary.trained);
    assert!(ModelStore::new(dir.path().join("models")).exists(DEFAULT_MODEL));
}

#[test]
fn test_rows_with_missing_values_get_no_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.xlsx");

    let mut df = client_frame(12);
    let ages: Vec<Option<f64>> = (0..12).map(|i| if i == 4 { None } else { Some(30.0 + i as f64) }).collect();
    df.with_column(Series::new("Age".into(), ages)).unwrap();
    keeper::utils::DataSaver::save_auto(&mut df, &clients).unwrap();
    write_csv(&churn_frame(40), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients)
        .with_output(dir.path().join("pred.xlsx"))
        .with_train(true);
    let summary = run(&config).unwrap();

    assert_eq!(summary.predicted, 11);
    assert_eq!(summary.skipped, 1);

    let labels = outcomes(&summary.output);
    assert_eq!(labels.len(), 12);
    assert!(labels[4].is_none());
    assert!(labels.iter().enumerate().all(|(i, l)| i == 4 || l.is_some()));
}

#[test]
fn test_rate_selects_and_prunes() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(20), &clients);
    write_csv(&churn_frame(60), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients).with_rate(true).with_num_top(2);
    let summary = run(&config).unwrap();

    let rating = summary.rating.as_ref().unwrap();
    assert_eq!(rating.len(), ModelKind::ROSTER.len());
    assert_eq!(summary.top.len(), 2);
    assert_eq!(summary.model, summary.top[0].kind);
    assert!(!summary.trained);
    assert_eq!(summary.pruned.len(), ModelKind::ROSTER.len() - 2);

    let kept: Vec<ModelKind> = summary.top.iter().map(|r| r.kind).collect();
    let mut stored = ModelStore::new(dir.path().join("models")).list().unwrap();
    stored.sort_by_key(|k| kept.iter().position(|t| t == k));
    assert_eq!(stored, kept);

    assert!(dir.path().join("rating").join("best.csv").is_file());
    assert!(dir.path().join("rating").join("top.xlsx").is_file());
    assert_eq!(outcomes(&summary.output).len(), 20);
}

#[test]
fn test_rate_renders_charts() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(20), &clients);
    write_csv(&churn_frame(60), &dir.path().join("train.csv"));

    let charts = dir.path().join("rating").join("charts");
    let config = config_in(dir.path(), &clients)
        .with_rate(true)
        .with_charts_dir(Some(charts.clone()));
    let summary = run(&config).unwrap();

    assert_eq!(summary.charts.len(), 3);
    for name in ["MSE.png", "MAE.png", "r2_scores.png"] {
        let path = charts.join(name);
        assert!(path.is_file(), "{} missing", name);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}

#[test]
fn test_keep_all_skips_pruning() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(20), &clients);
    write_csv(&churn_frame(60), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients)
        .with_rate(true)
        .with_num_top(1)
        .with_keep_all(true);
    let summary = run(&config).unwrap();

    assert!(summary.pruned.is_empty());
    assert_eq!(
        ModelStore::new(dir.path().join("models")).list().unwrap().len(),
        ModelKind::ROSTER.len()
    );
}

#[test]
fn test_unseen_category_set_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");

    // Only one gender in the client table
    let df = client_frame(12);
    let mask = df.column("Gender").unwrap().str().unwrap().equal("Female");
    write_csv(&df.filter(&mask).unwrap(), &clients);
    write_csv(&churn_frame(40), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients).with_train(true).with_rate(true);
    match run(&config) {
        Err(KeeperError::SchemaError(msg)) => assert!(msg.contains("gender_Male")),
        other => panic!("expected schema error, got {:?}", other.map(|s| s.model)),
    }

    // Rejected before any model was fit or saved
    assert!(!dir.path().join("models").exists());
    assert!(!dir.path().join("rating").exists());
    assert!(!dir.path().join("predictions").exists());
}

#[test]
fn test_mismatched_clients_keep_saved_model() {
    let dir = tempfile::tempdir().unwrap();
    let clients = dir.path().join("clients.csv");
    write_csv(&client_frame(15), &clients);
    write_csv(&churn_frame(60), &dir.path().join("train.csv"));

    let config = config_in(dir.path(), &clients).with_train(true);
    run(&config).unwrap();
    let artifact = ModelStore::new(dir.path().join("models")).path_for(DEFAULT_MODEL);
    let saved = std::fs::read(&artifact).unwrap();

    // Retraining on this table would change the artifact
    write_csv(&churn_frame(80), &dir.path().join("train.csv"));
    let df = client_frame(15);
    let mask = df.column("Gender").unwrap().str().unwrap().equal("Female");
    write_csv(&df.filter(&mask).unwrap(), &clients);

    assert!(matches!(run(&config), Err(KeeperError::SchemaError(_))));
    assert_eq!(std::fs::read(&artifact).unwrap(), saved);
}
