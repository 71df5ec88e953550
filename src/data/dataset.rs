use anyhow::Result;
use burn::data::dataset::Dataset;
use std::sync::Arc;

use crate::data::features::FeatureTransformer;
use crate::domain::census::CensusRow;

/// One encoded example: model inputs plus label and instance weight.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusExample {
    pub numeric:     Vec<f32>,
    pub categorical: Vec<i32>,
    pub label:       f32,
    pub weight:      f32,
}

/// Shared, immutable example storage. Cloning is cheap so the same
/// split can feed several data loaders (train, periodic eval).
#[derive(Debug, Clone)]
pub struct CensusDataset {
    examples: Arc<Vec<CensusExample>>,
}

impl CensusDataset {
    pub fn new(examples: Vec<CensusExample>) -> Self {
        Self { examples: Arc::new(examples) }
    }

    /// Encode raw rows with the given feature transformer.
    pub fn from_rows(rows: &[CensusRow], transformer: &FeatureTransformer) -> Result<Self> {
        let examples = rows
            .iter()
            .map(|row| {
                let encoded = transformer.encode(row)?;
                Ok(CensusExample {
                    numeric:     encoded.numeric,
                    categorical: encoded.categorical,
                    label:       row.label()?,
                    weight:      row.weight(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(examples))
    }

    pub fn sample_count(&self) -> usize { self.examples.len() }

    #[cfg(test)]
    pub fn examples(&self) -> &[CensusExample] { &self.examples }
}

impl Dataset<CensusExample> for CensusDataset {
    fn get(&self, index: usize) -> Option<CensusExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

/// Linearly separable toy data: label = x0 + 0.5·x1 > 0, plus one
/// noise category with 4 buckets.
#[cfg(test)]
pub(crate) fn synthetic_dataset(n: usize, seed: u64) -> CensusDataset {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let examples = (0..n)
        .map(|_| {
            let x0: f32 = rng.gen_range(-1.0..1.0);
            let x1: f32 = rng.gen_range(-1.0..1.0);
            CensusExample {
                numeric:     vec![x0, x1],
                categorical: vec![rng.gen_range(0..4)],
                label:       if x0 + 0.5 * x1 > 0.0 { 1.0 } else { 0.0 },
                weight:      1.0,
            }
        })
        .collect();
    CensusDataset::new(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{features::FeatureSpec, metadata::DatasetMetadata};
    use crate::domain::census::sample_row;

    #[test]
    fn test_from_rows_keeps_label_and_weight() {
        let mut rows = vec![
            sample_row(30.0, "Private", ">50K"),
            sample_row(40.0, "State-gov", "<=50K."),
        ];
        rows[1].fnlwgt = 2.5;

        let spec = FeatureSpec::from_metadata(&DatasetMetadata::compute(&rows), false).unwrap();
        let ds   = CensusDataset::from_rows(&rows, &FeatureTransformer::new(&spec)).unwrap();

        assert_eq!(ds.len(), 2);
        let second = ds.get(1).unwrap();
        assert_eq!(second.label, 0.0);
        assert_eq!(second.weight, 2.5);
        assert_eq!(second.numeric.len(), 5);
        assert_eq!(second.categorical.len(), 8);
        assert!(ds.get(2).is_none());
    }
}
