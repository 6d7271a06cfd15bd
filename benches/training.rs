use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keeper::preprocessing::{ChurnPreprocessor, Mode};
use keeper::training::{ModelKind, NetworkConfig};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_churn_data(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genders = ["Female", "Male"];
    let subscriptions = ["Basic", "Standard", "Premium"];
    let contracts = ["Monthly", "Quarterly", "Annual"];

    let support: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0..10) as f64).collect();
    let delay: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(0..30) as f64).collect();
    let churn: Vec<f64> = support
        .iter()
        .zip(&delay)
        .map(|(&s, &d)| if s > 5.0 || d > 20.0 { 1.0 } else { 0.0 })
        .collect();

    df!(
        "CustomerID" => (0..n_rows as i64).collect::<Vec<_>>(),
        "Age" => (0..n_rows).map(|_| rng.gen_range(18.0..70.0)).collect::<Vec<f64>>(),
        "Gender" => (0..n_rows).map(|_| *genders.choose(&mut rng).unwrap()).collect::<Vec<_>>(),
        "Tenure" => (0..n_rows).map(|_| rng.gen_range(1..60) as i64).collect::<Vec<_>>(),
        "Usage Frequency" => (0..n_rows).map(|_| rng.gen_range(1.0..30.0)).collect::<Vec<f64>>(),
        "Support Calls" => support,
        "Payment Delay" => delay,
        "Subscription Type" => (0..n_rows).map(|_| *subscriptions.choose(&mut rng).unwrap()).collect::<Vec<_>>(),
        "Contract Length" => (0..n_rows).map(|_| *contracts.choose(&mut rng).unwrap()).collect::<Vec<_>>(),
        "Total Spend" => (0..n_rows).map(|_| rng.gen_range(100.0..1000.0)).collect::<Vec<f64>>(),
        "Last Interaction" => (0..n_rows).map(|_| rng.gen_range(1..30) as i64).collect::<Vec<_>>(),
        "Churn" => churn,
    )
    .unwrap()
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");
    let preprocessor = ChurnPreprocessor::new();

    for n_rows in [1000, 10000].iter() {
        let df = create_churn_data(*n_rows);

        group.bench_with_input(BenchmarkId::new("process", n_rows), &df, |b, df| {
            b.iter(|| preprocessor.process(black_box(df), Mode::Train).unwrap())
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let set = ChurnPreprocessor::new()
        .process(&create_churn_data(2000), Mode::Train)
        .unwrap();
    let target = set.target().unwrap().clone();
    let network = NetworkConfig::default().with_epochs(5).with_random_state(42);

    for kind in [
        ModelKind::DecisionTreeClassifier,
        ModelKind::RandomForestClassifier,
        ModelKind::HistGradientBoostingClassifier,
        ModelKind::NeuralNetRegression,
    ] {
        group.bench_function(BenchmarkId::new("fit", kind.name()), |b| {
            b.iter(|| {
                let mut model = kind.build(set.n_features(), Some(42), &network);
                model.fit(black_box(&set.features), &target).unwrap();
                model
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_preprocessing, bench_training);
criterion_main!(benches);
