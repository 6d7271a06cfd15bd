//! Keeper CLI Module
//!
//! Command-line interface for churn prediction and model rating.

use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::RunConfig;
use crate::orchestrator::{self, RunSummary};
use crate::rating::{Metric, ModelRating};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<14} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer churn prediction with model rating")]
#[command(long_about = None)]
pub struct Cli {
    /// Client table to predict (.csv, .xlsx or .xls)
    #[arg(long)]
    pub clients: PathBuf,

    /// Output table with an Outcome column (.csv or .xlsx)
    #[arg(long, default_value = "predictions/pred.csv")]
    pub pred: PathBuf,

    /// Train the model instead of loading a saved one
    #[arg(long)]
    pub train: bool,

    /// Rate all model families and predict with the best one
    #[arg(long)]
    pub rate: bool,

    /// Directory for rating charts
    #[arg(long, default_value = "rating/charts")]
    pub charts: PathBuf,

    /// Do not render rating charts
    #[arg(long)]
    pub no_charts: bool,

    /// Best-model report (.csv or .xlsx)
    #[arg(long, default_value = "rating/best.csv")]
    pub best: PathBuf,

    /// Top-N report (.csv or .xlsx)
    #[arg(long, default_value = "rating/top.csv")]
    pub top: PathBuf,

    /// Number of models kept after rating
    #[arg(long, default_value_t = 3)]
    pub num_top: usize,

    /// Ranking metric (mse, mae, r2_score)
    #[arg(long, default_value = "mse")]
    pub top_by: Metric,

    /// Directory of saved models
    #[arg(long, default_value = "models")]
    pub models: PathBuf,

    /// Labelled training table (.csv, .xlsx or .xls)
    #[arg(long, default_value = "data/train.csv")]
    pub train_data: PathBuf,

    /// Keep every rated model instead of only the top-N
    #[arg(long)]
    pub keep_all: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> RunConfig {
        RunConfig::new(&self.clients)
            .with_output(&self.pred)
            .with_train(self.train)
            .with_rate(self.rate)
            .with_charts_dir((!self.no_charts).then(|| self.charts.clone()))
            .with_best_report(&self.best)
            .with_top_report(&self.top)
            .with_num_top(self.num_top)
            .with_top_by(self.top_by)
            .with_models_dir(&self.models)
            .with_train_data(&self.train_data)
            .with_keep_all(self.keep_all)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.to_config();

    section("Keeper");
    kv("Clients", &config.clients.display().to_string());
    kv("Models", &config.models_dir.display().to_string());
    if config.rate {
        kv("Top", &format!("{} by {}", config.num_top, config.top_by));
    }

    step_run(if config.rate { "Rating and predicting" } else { "Predicting" });
    let start = Instant::now();
    let summary = orchestrator::run(&config)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    if let Some(rating) = &summary.rating {
        print_rating(rating, &summary, config.top_by);
    }

    print_summary(&summary, &config);
    Ok(())
}

fn print_rating(rating: &ModelRating, summary: &RunSummary, top_by: Metric) {
    section("Rating");

    println!(
        "  {:<32} {:>8} {:>8} {:>8}",
        muted("Model"),
        muted("MSE"),
        muted("MAE"),
        muted("R²")
    );
    println!("  {}", dim(&"─".repeat(60)));
    for record in rating.records() {
        let in_top = summary.top.iter().any(|t| t.kind == record.kind);
        let name = if in_top {
            record.name().white().bold()
        } else {
            record.name().normal()
        };
        println!(
            "  {:<32} {:>8.4} {:>8.4} {:>8.4}",
            name, record.mse, record.mae, record.r2_score
        );
    }
    println!("  {}", dim(&"─".repeat(60)));

    if let Some(best) = summary.top.first() {
        println!();
        println!(
            "  {} {} {} {:.4}",
            ok("best"),
            best.name().white().bold(),
            muted(&format!("{}:", top_by)),
            top_by.value(best)
        );
    }
    if !summary.pruned.is_empty() {
        step_ok(&format!("Removed {} models outside the top", summary.pruned.len()));
    }
    if !summary.charts.is_empty() {
        step_ok(&format!("Saved {} charts", summary.charts.len()));
    }
}

fn print_summary(summary: &RunSummary, config: &RunConfig) {
    section("Predictions");

    kv("Model", &format!(
        "{} {}",
        summary.model,
        dim(if summary.trained { "(trained)" } else { "(loaded)" })
    ));
    kv("Clients", &summary.predicted.to_string());
    kv(&config.positive_label, &summary.positives.to_string());
    kv(&config.negative_label, &(summary.predicted - summary.positives).to_string());
    if summary.skipped > 0 {
        kv("Skipped", &format!("{} (missing values)", summary.skipped));
    }
    println!();
    step_ok(&format!("Saved → {}", summary.output.display()));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["keeper", "--clients", "clients.xlsx"]).unwrap();
        let config = cli.to_config();

        assert_eq!(config.clients, PathBuf::from("clients.xlsx"));
        assert_eq!(config.output, PathBuf::from("predictions/pred.csv"));
        assert_eq!(config.charts_dir, Some(PathBuf::from("rating/charts")));
        assert_eq!(config.num_top, 3);
        assert!(!config.rate && !config.train && !config.keep_all);
    }

    #[test]
    fn test_rating_flags() {
        let cli = Cli::try_parse_from([
            "keeper", "--clients", "c.csv", "--rate", "--num-top", "2", "--top-by", "r2_score",
            "--no-charts", "--keep-all", "--pred", "out.xlsx",
        ])
        .unwrap();
        let config = cli.to_config();

        assert!(config.rate);
        assert_eq!(config.num_top, 2);
        assert_eq!(config.top_by, Metric::R2Score);
        assert_eq!(config.charts_dir, None);
        assert!(config.keep_all);
        assert_eq!(config.output, PathBuf::from("out.xlsx"));
    }

    #[test]
    fn test_unknown_metric_is_rejected() {
        assert!(Cli::try_parse_from(["keeper", "--clients", "c.csv", "--top-by", "accuracy"]).is_err());
    }

    #[test]
    fn test_clients_required() {
        assert!(Cli::try_parse_from(["keeper"]).is_err());
    }
}
