//! Seeded train/test partitioning

use crate::error::{KeeperError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single shuffled train/test split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle rows with a fixed seed and hold out `ceil(test_size * n)` of them
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    random_state: u64,
) -> Result<TrainTestSplit> {
    let n_samples = x.nrows();
    if n_samples != y.len() {
        return Err(KeeperError::ShapeError {
            expected: format!("y length = {}", n_samples),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(KeeperError::ConfigError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(KeeperError::DataError(format!(
            "cannot split {} samples with test_size {}",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(random_state));

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: train_indices.iter().map(|&i| y[i]).collect(),
        y_test: test_indices.iter().map(|&i| y[i]).collect(),
        train_indices,
        test_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let y = Array1::from_iter((0..n).map(|i| i as f64));
        (x, y)
    }

    #[test]
    fn test_test_partition_is_rounded_up() {
        let (x, y) = data(11);
        let split = train_test_split(&x, &y, 0.2, 42).unwrap();

        assert_eq!(split.x_test.nrows(), 3);
        assert_eq!(split.x_train.nrows(), 8);

        let mut all: Vec<usize> = split.train_indices.iter().chain(&split.test_indices).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_rows_stay_aligned() {
        let (x, y) = data(20);
        let split = train_test_split(&x, &y, 0.2, 42).unwrap();

        for (row, &target) in split.x_test.rows().into_iter().zip(split.y_test.iter()) {
            assert_eq!(row[0], target * 2.0);
        }
    }

    #[test]
    fn test_same_seed_same_split() {
        let (x, y) = data(50);
        let a = train_test_split(&x, &y, 0.2, 42).unwrap();
        let b = train_test_split(&x, &y, 0.2, 42).unwrap();
        assert_eq!(a.test_indices, b.test_indices);
    }

    #[test]
    fn test_too_few_samples() {
        let (x, y) = data(1);
        assert!(train_test_split(&x, &y, 0.2, 42).is_err());
    }
}
