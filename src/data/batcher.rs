// ============================================================
// Layer 4 — Census Batcher
// ============================================================
// Implements Burn's Batcher trait to stack CensusExamples into
// tensors for one forward pass.
//
// How batching works here:
//   Input:  Vec of N CensusExamples
//   Output: CensusBatch with
//             numeric     [N, n_numeric]      float
//             categorical [N, n_categorical]  int (vocab index)
//             labels      [N, 1]              float 0/1
//             targets     [N]                 int 0/1
//             weights     [N, 1]              float (fnlwgt)
//
//   Every example has the same number of features (one per
//   feature column), so flatten-then-reshape is all we need.
//
// labels and targets carry the same information: the loss
// wants a float column, the fit-loop accuracy metric wants
// class indices.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::CensusExample;

#[derive(Debug, Clone)]
pub struct CensusBatch<B: Backend> {
    /// Numeric features — shape: [batch_size, n_numeric]
    pub numeric: Tensor<B, 2>,

    /// Vocabulary indices — shape: [batch_size, n_categorical]
    pub categorical: Tensor<B, 2, Int>,

    /// Labels as floats — shape: [batch_size, 1]
    pub labels: Tensor<B, 2>,

    /// Labels as class ids — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,

    /// Instance weights — shape: [batch_size, 1]
    pub weights: Tensor<B, 2>,
}

/// Holds the target device so tensors are created in the right place.
#[derive(Clone, Debug)]
pub struct CensusBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> CensusBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<CensusExample, CensusBatch<B>> for CensusBatcher<B> {
    fn batch(&self, items: Vec<CensusExample>) -> CensusBatch<B> {
        let batch_size  = items.len();
        let numeric_dim = items.first().map_or(0, |e| e.numeric.len());
        let cat_dim     = items.first().map_or(0, |e| e.categorical.len());

        let numeric_flat: Vec<f32> = items
            .iter()
            .flat_map(|e| e.numeric.iter().copied())
            .collect();

        let cat_flat: Vec<i32> = items
            .iter()
            .flat_map(|e| e.categorical.iter().copied())
            .collect();

        let labels:  Vec<f32> = items.iter().map(|e| e.label).collect();
        let targets: Vec<i32> = items.iter().map(|e| e.label as i32).collect();
        let weights: Vec<f32> = items.iter().map(|e| e.weight).collect();

        let numeric = Tensor::<B, 1>::from_floats(numeric_flat.as_slice(), &self.device)
            .reshape([batch_size, numeric_dim]);

        let categorical = Tensor::<B, 1, Int>::from_ints(cat_flat.as_slice(), &self.device)
            .reshape([batch_size, cat_dim]);

        let labels = Tensor::<B, 1>::from_floats(labels.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        let weights = Tensor::<B, 1>::from_floats(weights.as_slice(), &self.device)
            .reshape([batch_size, 1]);

        CensusBatch { numeric, categorical, labels, targets, weights }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let device  = Default::default();
        let batcher = CensusBatcher::<NdArray>::new(device);
        let items   = vec![
            CensusExample { numeric: vec![1.0, 2.0], categorical: vec![0, 1, 2], label: 1.0, weight: 0.5 },
            CensusExample { numeric: vec![3.0, 4.0], categorical: vec![2, 1, 0], label: 0.0, weight: 2.0 },
        ];
        let batch = batcher.batch(items);

        assert_eq!(batch.numeric.dims(), [2, 2]);
        assert_eq!(batch.categorical.dims(), [2, 3]);
        assert_eq!(batch.labels.dims(), [2, 1]);
        assert_eq!(batch.targets.dims(), [2]);
        assert_eq!(batch.weights.dims(), [2, 1]);

        let numeric: Vec<f32> = batch.numeric.into_data().to_vec().unwrap();
        assert_eq!(numeric, vec![1.0, 2.0, 3.0, 4.0]);
        let weights: Vec<f32> = batch.weights.into_data().to_vec().unwrap();
        assert_eq!(weights, vec![0.5, 2.0]);
    }
}
