//! One-hot encoding of categorical columns

use super::config::CategoricalColumn;
use crate::error::{KeeperError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Observed categories of one source column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoryGroup {
    prefix: String,
    /// Sorted, distinct
    categories: Vec<String>,
}

/// One-hot encoder producing one binary column per observed category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    groups: Vec<CategoryGroup>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the categories of a column. Groups are emitted in fit order.
    pub fn fit(&mut self, column: &CategoricalColumn, values: &[String]) -> &mut Self {
        let categories: BTreeSet<&String> = values.iter().collect();
        self.groups.push(CategoryGroup {
            prefix: column.prefix.clone(),
            categories: categories.into_iter().cloned().collect(),
        });
        self
    }

    /// Encode one value slice per fitted group, in fit order.
    ///
    /// A value never seen during fit encodes as all zeros for its group.
    pub fn transform(&self, columns: &[&[String]]) -> Result<Array2<f64>> {
        if self.groups.is_empty() {
            return Err(KeeperError::ModelNotFitted);
        }
        if columns.len() != self.groups.len() {
            return Err(KeeperError::ShapeError {
                expected: format!("{} categorical columns", self.groups.len()),
                actual: format!("{} categorical columns", columns.len()),
            });
        }

        let n_rows = columns[0].len();
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(KeeperError::ShapeError {
                expected: format!("{} rows", n_rows),
                actual: format!("{} rows", bad.len()),
            });
        }

        let mut encoded = Array2::zeros((n_rows, self.n_features()));
        let mut offset = 0;
        for (group, values) in self.groups.iter().zip(columns) {
            for (row, value) in values.iter().enumerate() {
                if let Ok(pos) = group.categories.binary_search(value) {
                    encoded[[row, offset + pos]] = 1.0;
                }
            }
            offset += group.categories.len();
        }

        Ok(encoded)
    }

    /// Output column names, `<prefix>_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.categories.iter().map(move |c| format!("{}_{}", g.prefix, c)))
            .collect()
    }

    /// Total number of output columns
    pub fn n_features(&self) -> usize {
        self.groups.iter().map(|g| g.categories.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_column_per_category() {
        let gender = strings(&["Male", "Female", "Male"]);
        let contract = strings(&["Monthly", "Annual", "Quarterly"]);

        let mut encoder = OneHotEncoder::new();
        encoder.fit(&CategoricalColumn::new("Gender", "gender"), &gender);
        encoder.fit(&CategoricalColumn::new("Contract Length", "contract_len"), &contract);

        assert_eq!(
            encoder.feature_names(),
            vec![
                "gender_Female",
                "gender_Male",
                "contract_len_Annual",
                "contract_len_Monthly",
                "contract_len_Quarterly",
            ]
        );

        let encoded = encoder.transform(&[&gender, &contract]).unwrap();
        assert_eq!(encoded.shape(), &[3, 5]);
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoded.row(1).to_vec(), vec![1.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&CategoricalColumn::new("Gender", "gender"), &strings(&["Male", "Female"]));

        let encoded = encoder.transform(&[&strings(&["Other"])]).unwrap();
        assert_eq!(encoded.row(0).sum(), 0.0);
    }

    #[test]
    fn test_unfitted_encoder_errors() {
        let encoder = OneHotEncoder::new();
        let values = strings(&["Male"]);
        assert!(matches!(encoder.transform(&[&values]), Err(KeeperError::ModelNotFitted)));
    }
}
