//! Shared fixtures for integration tests

#![allow(dead_code)]

use keeper::training::{HiddenLayer, NetworkConfig};
use polars::prelude::*;

const SUBSCRIPTIONS: [&str; 3] = ["Basic", "Standard", "Premium"];
const CONTRACTS: [&str; 3] = ["Monthly", "Quarterly", "Annual"];

/// Deterministic client table in the default schema; churners call support
/// often or pay late
pub fn churn_frame(n: usize) -> DataFrame {
    let idx: Vec<usize> = (0..n).collect();
    let support: Vec<f64> = idx.iter().map(|i| ((i * 3) % 10) as f64).collect();
    let delay: Vec<f64> = idx.iter().map(|i| ((i * 11) % 30) as f64).collect();
    let churn: Vec<i64> = support
        .iter()
        .zip(&delay)
        .map(|(&s, &d)| i64::from(s > 5.0 || d > 20.0))
        .collect();

    df!(
        "CustomerID" => idx.iter().map(|&i| i as i64 + 1).collect::<Vec<_>>(),
        "Age" => idx.iter().map(|i| (18 + (i * 7) % 50) as f64).collect::<Vec<_>>(),
        "Gender" => idx.iter().map(|i| if i % 2 == 0 { "Female" } else { "Male" }).collect::<Vec<_>>(),
        "Tenure" => idx.iter().map(|i| ((i * 3) % 60) as i64).collect::<Vec<_>>(),
        "Usage Frequency" => idx.iter().map(|i| ((i * 5) % 30 + 1) as f64).collect::<Vec<_>>(),
        "Support Calls" => support,
        "Payment Delay" => delay,
        "Subscription Type" => idx.iter().map(|i| SUBSCRIPTIONS[i % 3]).collect::<Vec<_>>(),
        "Contract Length" => idx.iter().map(|i| CONTRACTS[(i / 2) % 3]).collect::<Vec<_>>(),
        "Total Spend" => idx.iter().map(|i| (100 + (i * 37) % 900) as f64).collect::<Vec<_>>(),
        "Last Interaction" => idx.iter().map(|i| ((i * 13) % 30) as i64).collect::<Vec<_>>(),
        "Churn" => churn,
    )
    .unwrap()
}

/// Client table without the label
pub fn client_frame(n: usize) -> DataFrame {
    churn_frame(n).drop("Churn").unwrap()
}

/// Small, seeded network so tests stay fast
pub fn tiny_network() -> NetworkConfig {
    NetworkConfig::default()
        .with_hidden_layers(vec![HiddenLayer::new(8, 0.0)])
        .with_epochs(3)
        .with_batch_size(16)
        .with_random_state(7)
}

pub fn write_csv(df: &DataFrame, path: &std::path::Path) {
    let mut df = df.clone();
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df).unwrap();
}
