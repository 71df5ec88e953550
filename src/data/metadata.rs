// ============================================================
// Layer 4 — Dataset Metadata
// ============================================================
// Statistics computed ONCE from the training split and reused
// by every later stage:
//
//   vocabularies  — the distinct values of each categorical
//                   column, sorted so the lookup index of a
//                   value never depends on row order
//   numeric_stats — mean and standard deviation of each
//                   numeric column (for optional normalisation)
//
// Why only the training split?
//   Anything learnt from the evaluation split would leak
//   information the model is not supposed to have. Values that
//   only appear at evaluation/serving time fall into the
//   out-of-vocabulary bucket instead.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::census::{CensusRow, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};

/// Mean and population standard deviation of one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f32,
    pub std:  f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Number of training rows the statistics were computed from
    pub row_count: usize,
    pub vocabularies: BTreeMap<String, Vec<String>>,
    pub numeric_stats: BTreeMap<String, NumericStats>,
}

impl DatasetMetadata {
    /// Compute vocabularies and numeric statistics from training rows.
    pub fn compute(rows: &[CensusRow]) -> Self {
        let mut vocabularies = BTreeMap::new();
        for column in CATEGORICAL_COLUMNS {
            let distinct: BTreeSet<&str> = rows
                .iter()
                .filter_map(|r| r.categorical(column))
                .collect();
            vocabularies.insert(
                column.to_string(),
                distinct.into_iter().map(str::to_string).collect(),
            );
        }

        let mut numeric_stats = BTreeMap::new();
        for column in NUMERIC_COLUMNS {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|r| r.numeric(column))
                .map(f64::from)
                .collect();
            numeric_stats.insert(column.to_string(), stats_of(&values));
        }

        tracing::debug!(
            "Computed metadata from {} rows: {} vocabularies, {} numeric columns",
            rows.len(),
            vocabularies.len(),
            numeric_stats.len()
        );

        Self { row_count: rows.len(), vocabularies, numeric_stats }
    }

    pub fn vocabulary(&self, column: &str) -> Option<&[String]> {
        self.vocabularies.get(column).map(Vec::as_slice)
    }

    pub fn stats(&self, column: &str) -> Option<NumericStats> {
        self.numeric_stats.get(column).copied()
    }
}

fn stats_of(values: &[f64]) -> NumericStats {
    if values.is_empty() {
        return NumericStats { mean: 0.0, std: 0.0 };
    }
    let n    = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var  = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    NumericStats { mean: mean as f32, std: var.sqrt() as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::census::sample_row;

    #[test]
    fn test_vocabulary_is_sorted_and_distinct() {
        let rows = vec![
            sample_row(30.0, "Private", ">50K"),
            sample_row(40.0, "State-gov", "<=50K"),
            sample_row(50.0, "Private", "<=50K"),
        ];
        let meta = DatasetMetadata::compute(&rows);
        assert_eq!(meta.vocabulary("workclass").unwrap(), &["Private", "State-gov"]);
        assert_eq!(meta.vocabulary("gender").unwrap(), &["Male"]);
        assert_eq!(meta.row_count, 3);
    }

    #[test]
    fn test_numeric_stats() {
        let rows = vec![
            sample_row(30.0, "Private", ">50K"),
            sample_row(50.0, "Private", ">50K"),
        ];
        let meta  = DatasetMetadata::compute(&rows);
        let stats = meta.stats("age").unwrap();
        assert!((stats.mean - 40.0).abs() < 1e-6);
        assert!((stats.std - 10.0).abs() < 1e-6);
        // Constant column → zero spread
        assert_eq!(meta.stats("hours_per_week").unwrap().std, 0.0);
    }

    #[test]
    fn test_empty_rows() {
        let meta = DatasetMetadata::compute(&[]);
        assert!(meta.vocabulary("race").unwrap().is_empty());
        assert_eq!(meta.stats("age").unwrap().mean, 0.0);
    }
}
