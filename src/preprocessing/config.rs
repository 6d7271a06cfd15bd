//! Column schema of the churn client tables

use serde::{Deserialize, Serialize};

/// A categorical source column and the prefix of its one-hot columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub prefix: String,
}

impl CategoricalColumn {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}

/// Declared columns of a client table.
///
/// Every column named here must be present in the input. Columns that are
/// not named anywhere are treated as numeric features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnSchema {
    /// Identifier and non-predictive columns removed before encoding
    pub dropped_columns: Vec<String>,
    /// Columns one-hot encoded, in output order
    pub categorical_columns: Vec<CategoricalColumn>,
    /// Binary churn label, required in train mode only
    pub label_column: String,
}

impl Default for ChurnSchema {
    fn default() -> Self {
        Self {
            dropped_columns: vec![
                "CustomerID".to_string(),
                "Tenure".to_string(),
                "Last Interaction".to_string(),
            ],
            categorical_columns: vec![
                CategoricalColumn::new("Gender", "gender"),
                CategoricalColumn::new("Subscription Type", "sub_type"),
                CategoricalColumn::new("Contract Length", "contract_len"),
            ],
            label_column: "Churn".to_string(),
        }
    }
}

impl ChurnSchema {
    /// Whether a column is declared by the schema (dropped, categorical or label)
    pub fn is_declared(&self, name: &str) -> bool {
        name == self.label_column
            || self.dropped_columns.iter().any(|c| c == name)
            || self.categorical_columns.iter().any(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = ChurnSchema::default();
        assert_eq!(schema.label_column, "Churn");
        assert_eq!(schema.categorical_columns.len(), 3);
        assert!(schema.is_declared("CustomerID"));
        assert!(schema.is_declared("Contract Length"));
        assert!(!schema.is_declared("Age"));
    }
}
