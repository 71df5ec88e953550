// ============================================================
// Layer 4 — Feature Columns
// ============================================================
// Declarative descriptions of how each raw column becomes
// model input. Two kinds exist:
//
//   Numeric   — the value is passed straight through, optionally
//               z-score normalised with training statistics
//   Embedding — the string is looked up in a fixed vocabulary
//               and the resulting index selects a row of a
//               trainable embedding table
//
// Embedding width uses the square-root heuristic:
//   dimension = max(1, floor(sqrt(vocabulary size)))
//   e.g. native_country (42 values) → 6
//
// Values that are not in the vocabulary (or are missing
// entirely) go to one extra out-of-vocabulary bucket whose
// index is vocabulary.len().
//
// The FeatureSpec is serialised into every model directory and
// every export, so serving decodes inputs exactly like training.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::metadata::DatasetMetadata;
use crate::domain::census::{CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::domain::traits::FeatureSource;
use crate::ml::input_layer::{DenseFeaturesConfig, EmbeddingShape};

/// Square-root heuristic for embedding width
pub fn embedding_dimension(vocab_len: usize) -> usize {
    ((vocab_len as f64).sqrt().floor() as usize).max(1)
}

/// z-score parameters taken from the training split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: f32,
    pub std:  f32,
}

impl Normalizer {
    pub fn apply(&self, value: f32) -> f32 {
        // A constant column has no spread; only centre it
        let scale = if self.std > 0.0 { self.std } else { 1.0 };
        (value - self.mean) / scale
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureColumn {
    Numeric {
        key:        String,
        normalizer: Option<Normalizer>,
    },
    Embedding {
        key:        String,
        vocabulary: Vec<String>,
        dimension:  usize,
    },
}

impl FeatureColumn {
    #[cfg(test)]
    pub fn numeric(key: impl Into<String>) -> Self {
        FeatureColumn::Numeric { key: key.into(), normalizer: None }
    }

    /// Vocabulary lookup + embedding sized by the sqrt heuristic
    pub fn embedding(key: impl Into<String>, vocabulary: Vec<String>) -> Self {
        let dimension = embedding_dimension(vocabulary.len());
        FeatureColumn::Embedding { key: key.into(), vocabulary, dimension }
    }

    pub fn key(&self) -> &str {
        match self {
            FeatureColumn::Numeric { key, .. }   => key,
            FeatureColumn::Embedding { key, .. } => key,
        }
    }
}

/// The full, ordered list of feature columns for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub columns: Vec<FeatureColumn>,
}

impl FeatureSpec {
    /// Build the standard census feature columns from training metadata.
    pub fn from_metadata(metadata: &DatasetMetadata, normalize_numeric: bool) -> Result<Self> {
        let mut columns = Vec::new();

        for key in NUMERIC_COLUMNS {
            let normalizer = if normalize_numeric {
                let stats = metadata
                    .stats(key)
                    .ok_or_else(|| anyhow!("metadata has no statistics for '{key}'"))?;
                Some(Normalizer { mean: stats.mean, std: stats.std })
            } else {
                None
            };
            columns.push(FeatureColumn::Numeric { key: key.to_string(), normalizer });
        }

        for key in CATEGORICAL_COLUMNS {
            let vocabulary = metadata
                .vocabulary(key)
                .ok_or_else(|| anyhow!("metadata has no vocabulary for '{key}'"))?
                .to_vec();
            columns.push(FeatureColumn::embedding(key, vocabulary));
        }

        let spec = Self { columns };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            bail!("feature spec has no columns");
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.key()) {
                bail!("feature column '{}' declared twice", column.key());
            }
            if let FeatureColumn::Embedding { key, dimension, .. } = column {
                if *dimension == 0 {
                    bail!("embedding column '{key}' has zero dimension");
                }
            }
        }
        Ok(())
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &FeatureColumn> {
        self.columns.iter().filter(|c| matches!(c, FeatureColumn::Numeric { .. }))
    }

    /// True when the numeric columns are z-score normalised.
    pub fn normalizes_numeric(&self) -> bool {
        self.numeric_columns()
            .any(|c| matches!(c, FeatureColumn::Numeric { normalizer: Some(_), .. }))
    }

    pub fn embedding_columns(&self) -> impl Iterator<Item = &FeatureColumn> {
        self.columns.iter().filter(|c| matches!(c, FeatureColumn::Embedding { .. }))
    }

    /// Shape of the model input layer these columns feed.
    pub fn input_layer_config(&self) -> DenseFeaturesConfig {
        let embeddings = self
            .embedding_columns()
            .filter_map(|c| match c {
                FeatureColumn::Embedding { key, vocabulary, dimension } => Some(EmbeddingShape {
                    key:         key.clone(),
                    num_buckets: vocabulary.len() + 1,
                    dimension:   *dimension,
                }),
                FeatureColumn::Numeric { .. } => None,
            })
            .collect();
        DenseFeaturesConfig::new(self.numeric_columns().count(), embeddings)
    }
}

/// Encoded model inputs for one example
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    pub numeric:     Vec<f32>,
    pub categorical: Vec<i32>,
}

/// Applies a FeatureSpec to raw inputs, with the vocabulary
/// lookups pre-built into hash maps.
pub struct FeatureTransformer {
    spec:    FeatureSpec,
    lookups: Vec<HashMap<String, i32>>,
}

impl FeatureTransformer {
    pub fn new(spec: &FeatureSpec) -> Self {
        let lookups = spec
            .embedding_columns()
            .map(|c| match c {
                FeatureColumn::Embedding { vocabulary, .. } => vocabulary
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v.clone(), i as i32))
                    .collect(),
                FeatureColumn::Numeric { .. } => HashMap::new(),
            })
            .collect();
        Self { spec: spec.clone(), lookups }
    }

    pub fn encode(&self, source: &dyn FeatureSource) -> Result<EncodedFeatures> {
        let mut numeric = Vec::new();
        for column in self.spec.numeric_columns() {
            if let FeatureColumn::Numeric { key, normalizer } = column {
                let raw = source
                    .numeric_value(key)
                    .ok_or_else(|| anyhow!("missing numeric feature '{key}'"))?;
                numeric.push(normalizer.map_or(raw, |n| n.apply(raw)));
            }
        }

        let mut categorical = Vec::new();
        for (column, lookup) in self.spec.embedding_columns().zip(&self.lookups) {
            if let FeatureColumn::Embedding { key, vocabulary, .. } = column {
                let oov = vocabulary.len() as i32;
                let idx = source
                    .categorical_value(key)
                    .and_then(|v| lookup.get(&v).copied())
                    .unwrap_or(oov);
                categorical.push(idx);
            }
        }

        Ok(EncodedFeatures { numeric, categorical })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::census::sample_row;
    use crate::domain::traits::ServingInstance;

    fn spec_from(rows: &[crate::domain::census::CensusRow], normalize: bool) -> FeatureSpec {
        FeatureSpec::from_metadata(&DatasetMetadata::compute(rows), normalize).unwrap()
    }

    #[test]
    fn test_sqrt_heuristic() {
        assert_eq!(embedding_dimension(0), 1);
        assert_eq!(embedding_dimension(1), 1);
        assert_eq!(embedding_dimension(9), 3);
        assert_eq!(embedding_dimension(16), 4);
        assert_eq!(embedding_dimension(42), 6);
    }

    #[test]
    fn test_standard_columns() {
        let spec = spec_from(&[sample_row(30.0, "Private", ">50K")], false);
        assert_eq!(spec.numeric_columns().count(), 5);
        assert_eq!(spec.embedding_columns().count(), 8);

        let layer = spec.input_layer_config();
        assert_eq!(layer.numeric_dim, 5);
        // one vocabulary entry + OOV bucket per column
        assert!(layer.embeddings.iter().all(|e| e.num_buckets == 2 && e.dimension == 1));
        assert_eq!(layer.output_dim(), 5 + 8);
    }

    #[test]
    fn test_passthrough_and_normalisation() {
        let rows = vec![
            sample_row(30.0, "Private", ">50K"),
            sample_row(50.0, "State-gov", "<=50K"),
        ];
        let raw = FeatureTransformer::new(&spec_from(&rows, false));
        assert_eq!(raw.encode(&rows[0]).unwrap().numeric[0], 30.0);

        let normed = FeatureTransformer::new(&spec_from(&rows, true));
        let enc    = normed.encode(&rows[0]).unwrap();
        assert!((enc.numeric[0] + 1.0).abs() < 1e-6); // (30 - 40) / 10
        // hours_per_week is constant → centred, not divided by zero
        assert_eq!(enc.numeric[4], 0.0);
    }

    #[test]
    fn test_unseen_category_maps_to_oov_bucket() {
        let rows = vec![
            sample_row(30.0, "Private", ">50K"),
            sample_row(50.0, "State-gov", "<=50K"),
        ];
        let t = FeatureTransformer::new(&spec_from(&rows, false));

        assert_eq!(t.encode(&rows[0]).unwrap().categorical[0], 0);
        assert_eq!(t.encode(&rows[1]).unwrap().categorical[0], 1);

        let unseen = sample_row(30.0, "Never-worked", ">50K");
        assert_eq!(t.encode(&unseen).unwrap().categorical[0], 2);
    }

    #[test]
    fn test_serving_instance_missing_values() {
        let rows = vec![sample_row(30.0, "Private", ">50K")];
        let t    = FeatureTransformer::new(&spec_from(&rows, false));

        let mut inst: ServingInstance = serde_json::from_value(serde_json::json!({
            "age": 30, "education_num": 13, "capital_gain": 0,
            "capital_loss": 0, "hours_per_week": 40, "workclass": "Private"
        })).unwrap();
        let enc = t.encode(&inst).unwrap();
        assert_eq!(enc.categorical[0], 0);
        // every other categorical column is absent → OOV (index 1)
        assert!(enc.categorical[1..].iter().all(|&i| i == 1));

        inst.remove("age");
        assert!(t.encode(&inst).is_err());
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let spec = FeatureSpec {
            columns: vec![FeatureColumn::numeric("age"), FeatureColumn::numeric("age")],
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_spec_serde_roundtrip_keeps_vocabulary() {
        let spec = spec_from(&[sample_row(30.0, "Private", ">50K")], true);
        let json = serde_json::to_string(&spec).unwrap();
        let back: FeatureSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
