//! One prediction run: preprocess, pick and obtain a model, predict, write

use std::path::PathBuf;
use std::time::Instant;

use ndarray::Array1;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::Result;
use crate::export::ModelStore;
use crate::preprocessing::{ChurnPreprocessor, FeatureSet, Mode};
use crate::rating::{
    rate_models, write_best_report, write_top_report, ModelRating, RatingOptions, RatingRecord,
};
use crate::training::{check_feature_names, ModelKind, PersistedModel};
use crate::utils::{DataLoader, DataSaver};
use crate::visualization::render_rating_charts;

/// Name of the column appended to the client table
pub const OUTCOME_COLUMN: &str = "Outcome";

/// Model used when no rating picks another one
pub const DEFAULT_MODEL: ModelKind = ModelKind::NeuralNetRegression;

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Model that produced the predictions
    pub model: ModelKind,
    /// Whether that model was fit during this run
    pub trained: bool,
    pub rating: Option<ModelRating>,
    pub top: Vec<RatingRecord>,
    /// Artifacts deleted by top-N pruning
    pub pruned: Vec<ModelKind>,
    pub charts: Vec<PathBuf>,
    pub predicted: usize,
    pub positives: usize,
    /// Client rows left without an outcome because of missing values
    pub skipped: usize,
    pub output: PathBuf,
}

/// Result of the rating stage
struct RatingOutcome {
    rating: ModelRating,
    top: Vec<RatingRecord>,
    pruned: Vec<ModelKind>,
    charts: Vec<PathBuf>,
    best: ModelKind,
}

/// Execute a full run
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let start = Instant::now();

    let loader = DataLoader::new();
    let preprocessor = ChurnPreprocessor::new();
    let store = ModelStore::new(&config.models_dir);

    // Schema problems in the client table surface before any model work
    let clients = loader.load_auto(&config.clients)?;
    let features = preprocessor.process(&clients, Mode::Inference)?;
    info!(
        path = %config.clients.display(),
        rows = clients.height(),
        usable = features.n_samples(),
        features = features.n_features(),
        "Loaded client table"
    );

    let train_df = loader.load_auto(&config.train_data)?;
    let train_set = preprocessor.process(&train_df, Mode::Train)?;
    info!(
        path = %config.train_data.display(),
        rows = train_set.n_samples(),
        "Loaded training table"
    );

    // Client columns must match the training columns before any model work
    check_feature_names(
        &train_set.feature_names,
        &features.feature_names,
        format_args!("the training table {}", config.train_data.display()),
    )?;

    let rated = if config.rate {
        Some(rate_and_select(config, &train_set, &store)?)
    } else {
        None
    };
    let kind = rated.as_ref().map_or(DEFAULT_MODEL, |r| r.best);

    let (persisted, trained) = if config.train {
        (train_model(config, kind, &train_set, &store)?, true)
    } else {
        match store.load(kind)? {
            Some(model) => (model, false),
            None => {
                warn!(
                    model = %kind,
                    path = %store.path_for(kind).display(),
                    "No saved model found, training a new one"
                );
                (train_model(config, kind, &train_set, &store)?, true)
            }
        }
    };

    persisted.check_features(&features.feature_names)?;

    let scores = persisted.model.predict(&features.features)?;
    let mut annotated = annotate(&clients, &features, &scores, config)?;
    DataSaver::save_auto(&mut annotated, &config.output)?;

    let positives = scores.iter().filter(|&&s| s >= config.threshold).count();
    info!(
        model = %kind,
        predicted = scores.len(),
        positives,
        output = %config.output.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Wrote predictions"
    );

    let (rating, top, pruned, charts) = match rated {
        Some(r) => (Some(r.rating), r.top, r.pruned, r.charts),
        None => (None, Vec::new(), Vec::new(), Vec::new()),
    };

    Ok(RunSummary {
        model: kind,
        trained,
        rating,
        top,
        pruned,
        charts,
        predicted: scores.len(),
        positives,
        skipped: clients.height() - features.n_samples(),
        output: config.output.clone(),
    })
}

fn rate_and_select(
    config: &RunConfig,
    train_set: &FeatureSet,
    store: &ModelStore,
) -> Result<RatingOutcome> {
    let options = RatingOptions::default()
        .with_random_state(config.random_state)
        .with_network(config.network.clone());

    let rating = rate_models(
        &train_set.features,
        train_set.target()?,
        &train_set.feature_names,
        store,
        &options,
    )?;

    let best_models = rating.best_models()?;
    write_best_report(&best_models, &config.best_report)?;

    let top = rating.top(config.top_by, config.num_top)?;
    write_top_report(&top, config.top_by, &config.top_report)?;

    let charts = match &config.charts_dir {
        Some(dir) => render_rating_charts(&rating, dir)?,
        None => Vec::new(),
    };

    let pruned = if config.keep_all {
        Vec::new()
    } else {
        let keep: Vec<ModelKind> = top.iter().map(|r| r.kind).collect();
        store.retain(&keep)?
    };

    let best = best_models.get(config.top_by).kind;
    info!(top_by = %config.top_by, best = %best, "Selected model");

    Ok(RatingOutcome {
        rating,
        top,
        pruned,
        charts,
        best,
    })
}

/// Fit `kind` on the whole training table and persist it
fn train_model(
    config: &RunConfig,
    kind: ModelKind,
    train_set: &FeatureSet,
    store: &ModelStore,
) -> Result<PersistedModel> {
    let start = Instant::now();
    let mut model = kind.build(train_set.n_features(), Some(config.random_state), &config.network);
    model.fit(&train_set.features, train_set.target()?)?;

    let persisted = PersistedModel::new(train_set.feature_names.clone(), model);
    let path = store.save(&persisted)?;

    info!(
        model = %kind,
        samples = train_set.n_samples(),
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Trained model"
    );
    Ok(persisted)
}

/// Copy of the client table with an outcome label per row; rows dropped
/// during preprocessing get a null outcome
fn annotate(
    clients: &DataFrame,
    features: &FeatureSet,
    scores: &Array1<f64>,
    config: &RunConfig,
) -> Result<DataFrame> {
    let mut outcomes: Vec<Option<&str>> = vec![None; clients.height()];
    for (&row, &score) in features.rows.iter().zip(scores.iter()) {
        outcomes[row] = Some(if score >= config.threshold {
            config.positive_label.as_str()
        } else {
            config.negative_label.as_str()
        });
    }
    debug!(
        labelled = features.rows.len(),
        rows = clients.height(),
        "Mapped predictions to labels"
    );

    let mut annotated = clients.clone();
    annotated.with_column(Series::new(OUTCOME_COLUMN.into(), outcomes))?;
    Ok(annotated)
}
