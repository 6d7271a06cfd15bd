//! Churn feature preprocessing pipeline

use super::config::ChurnSchema;
use super::encoder::OneHotEncoder;
use super::scaler::StandardScaler;
use crate::error::{KeeperError, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Whether the table carries the churn label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Label required; split off as the target vector
    Train,
    /// Label optional and ignored
    Inference,
}

/// Numeric and one-hot encoded table before scaling
#[derive(Debug, Clone)]
pub struct EncodedTable {
    /// Numeric columns followed by one-hot columns
    pub values: Array2<f64>,
    pub feature_names: Vec<String>,
    /// Number of leading numeric columns in `values`
    pub n_numeric: usize,
    pub target: Option<Array1<f64>>,
    /// Source row index of each output row
    pub rows: Vec<usize>,
}

/// Standardized feature matrix ready for model consumption
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub features: Array2<f64>,
    pub feature_names: Vec<String>,
    pub target: Option<Array1<f64>>,
    /// Source row index of each feature row
    pub rows: Vec<usize>,
}

impl FeatureSet {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Target vector, present only for tables processed in train mode
    pub fn target(&self) -> Result<&Array1<f64>> {
        self.target.as_ref().ok_or_else(|| {
            KeeperError::TrainingError("feature set was processed without a label".to_string())
        })
    }
}

/// Turns raw client tables into feature matrices
#[derive(Debug, Clone, Default)]
pub struct ChurnPreprocessor {
    schema: ChurnSchema,
}

impl ChurnPreprocessor {
    /// Create a preprocessor for the default client schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Full preprocessing: encode, then standardize with statistics fit on
    /// this same table
    pub fn process(&self, df: &DataFrame, mode: Mode) -> Result<FeatureSet> {
        let start = Instant::now();
        let encoded = self.encode(df, mode)?;

        let features = StandardScaler::new().fit_transform(&encoded.values)?;

        debug!(
            ?mode,
            rows_in = df.height(),
            rows_out = features.nrows(),
            features = features.ncols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessed table"
        );

        Ok(FeatureSet {
            features,
            feature_names: encoded.feature_names,
            target: encoded.target,
            rows: encoded.rows,
        })
    }

    /// Validate the schema, drop non-predictive columns and incomplete rows,
    /// and one-hot encode the categorical columns
    pub fn encode(&self, df: &DataFrame, mode: Mode) -> Result<EncodedTable> {
        self.check_columns(df, mode)?;

        let numeric_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| !self.schema.is_declared(name))
            .collect();

        let numeric: Vec<Vec<Option<f64>>> = numeric_names
            .iter()
            .map(|name| numeric_values(df, name))
            .collect::<Result<_>>()?;

        let categorical: Vec<Vec<Option<String>>> = self
            .schema
            .categorical_columns
            .iter()
            .map(|c| string_values(df, &c.name))
            .collect::<Result<_>>()?;

        let label = match mode {
            Mode::Train => Some(numeric_values(df, &self.schema.label_column)?),
            Mode::Inference => None,
        };

        let rows: Vec<usize> = (0..df.height())
            .filter(|&i| {
                numeric.iter().all(|col| col[i].is_some())
                    && categorical.iter().all(|col| col[i].is_some())
                    && label.as_ref().map_or(true, |col| col[i].is_some())
            })
            .collect();

        if rows.is_empty() {
            return Err(KeeperError::DataError(
                "no complete rows left after dropping missing values".to_string(),
            ));
        }

        let numeric_matrix = Array2::from_shape_fn((rows.len(), numeric.len()), |(r, c)| {
            numeric[c][rows[r]].unwrap_or_default()
        });

        let categories: Vec<Vec<String>> = categorical
            .iter()
            .map(|col| rows.iter().map(|&i| col[i].clone().unwrap_or_default()).collect())
            .collect();

        let mut encoder = OneHotEncoder::new();
        for (column, values) in self.schema.categorical_columns.iter().zip(&categories) {
            encoder.fit(column, values);
        }
        let category_refs: Vec<&[String]> = categories.iter().map(|v| v.as_slice()).collect();
        let one_hot = encoder.transform(&category_refs)?;

        let values = concatenate(Axis(1), &[numeric_matrix.view(), one_hot.view()])?;

        let target = label
            .map(|col| {
                let target: Array1<f64> = rows.iter().map(|&i| col[i].unwrap_or_default()).collect();
                if let Some(bad) = target.iter().find(|&&v| v != 0.0 && v != 1.0) {
                    return Err(KeeperError::SchemaError(format!(
                        "label column '{}' must be binary, found {}",
                        self.schema.label_column, bad
                    )));
                }
                Ok(target)
            })
            .transpose()?;

        let mut feature_names = numeric_names;
        let n_numeric = feature_names.len();
        feature_names.extend(encoder.feature_names());

        Ok(EncodedTable {
            values,
            feature_names,
            n_numeric,
            target,
            rows,
        })
    }

    fn check_columns(&self, df: &DataFrame, mode: Mode) -> Result<()> {
        let present: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

        let mut required: Vec<&str> = self
            .schema
            .dropped_columns
            .iter()
            .map(String::as_str)
            .chain(self.schema.categorical_columns.iter().map(|c| c.name.as_str()))
            .collect();
        if mode == Mode::Train {
            required.push(&self.schema.label_column);
        }

        let missing: Vec<&str> = required
            .into_iter()
            .filter(|name| !present.iter().any(|p| p == name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(KeeperError::SchemaError(format!(
                "missing columns: {}",
                missing.join(", ")
            )))
        }
    }
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| KeeperError::SchemaError(format!("missing column '{}'", name)))?;
    let casted = column
        .cast(&DataType::Float64)
        .map_err(|e| KeeperError::SchemaError(format!("column '{}' is not numeric: {}", name, e)))?;

    if casted.null_count() > column.null_count() {
        return Err(KeeperError::SchemaError(format!(
            "column '{}' holds non-numeric values",
            name
        )));
    }

    Ok(casted.f64()?.into_iter().collect())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| KeeperError::SchemaError(format!("missing column '{}'", name)))?;
    let casted = column.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clients_df() -> DataFrame {
        df!(
            "CustomerID" => &[1i64, 2, 3, 4, 5],
            "Age" => &[Some(22.0), Some(35.0), None, Some(58.0), Some(41.0)],
            "Gender" => &[Some("Female"), Some("Male"), Some("Male"), Some("Female"), Some("Male")],
            "Tenure" => &[10i64, 20, 30, 40, 50],
            "Support Calls" => &[Some(1.0), Some(5.0), Some(2.0), Some(0.0), Some(9.0)],
            "Subscription Type" => &[Some("Basic"), Some("Premium"), Some("Standard"), Some("Basic"), Some("Standard")],
            "Contract Length" => &[Some("Monthly"), Some("Annual"), Some("Annual"), Some("Quarterly"), Some("Monthly")],
            "Last Interaction" => &[3i64, 4, 5, 6, 7],
            "Churn" => &[Some(1.0), Some(0.0), Some(1.0), Some(0.0), None]
        )
        .unwrap()
    }

    #[test]
    fn test_train_drops_incomplete_rows() {
        let features = ChurnPreprocessor::new().process(&clients_df(), Mode::Train).unwrap();

        // row 2 misses Age, row 4 misses Churn
        assert_eq!(features.rows, vec![0, 1, 3]);
        assert_eq!(features.n_samples(), 3);
        assert_eq!(features.target().unwrap().to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_inference_ignores_label() {
        let features = ChurnPreprocessor::new().process(&clients_df(), Mode::Inference).unwrap();

        assert_eq!(features.rows, vec![0, 1, 3, 4]);
        assert!(features.target.is_none());
        assert!(!features.feature_names.iter().any(|n| n == "Churn"));
    }

    #[test]
    fn test_feature_order() {
        let encoded = ChurnPreprocessor::new().encode(&clients_df(), Mode::Inference).unwrap();

        assert_eq!(encoded.n_numeric, 2);
        assert_eq!(&encoded.feature_names[..2], &["Age", "Support Calls"]);
        assert_eq!(encoded.feature_names[2], "gender_Female");
        assert_eq!(encoded.feature_names.last().unwrap(), "contract_len_Quarterly");
    }

    #[test]
    fn test_missing_categorical_column() {
        let df = clients_df().drop("Gender").unwrap();
        let result = ChurnPreprocessor::new().process(&df, Mode::Inference);

        match result {
            Err(KeeperError::SchemaError(msg)) => assert!(msg.contains("Gender")),
            other => panic!("expected schema error, got {:?}", other.map(|f| f.feature_names)),
        }
    }

    #[test]
    fn test_train_requires_label() {
        let df = clients_df().drop("Churn").unwrap();
        assert!(matches!(
            ChurnPreprocessor::new().process(&df, Mode::Train),
            Err(KeeperError::SchemaError(_))
        ));
    }

    #[test]
    fn test_non_numeric_feature() {
        let mut df = clients_df();
        df.with_column(Column::new(
            "Support Calls".into(),
            &["1", "many", "2", "0", "9"],
        ))
        .unwrap();

        assert!(matches!(
            ChurnPreprocessor::new().process(&df, Mode::Inference),
            Err(KeeperError::SchemaError(_))
        ));
    }

    #[test]
    fn test_non_binary_label() {
        let mut df = clients_df();
        df.with_column(Column::new("Churn".into(), &[1.0, 2.0, 0.0, 1.0, 0.0]))
            .unwrap();

        assert!(matches!(
            ChurnPreprocessor::new().process(&df, Mode::Train),
            Err(KeeperError::SchemaError(_))
        ));
    }
}
