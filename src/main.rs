//! Keeper - Main Entry Point
//!
//! Churn prediction CLI: rate model families, train or load one, predict.

use clap::Parser;
use keeper::cli::{cmd_run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "keeper=debug" } else { "keeper=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    cmd_run(&cli)
}
