use burn::{
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Shape of one categorical embedding table.
/// `num_buckets` includes the out-of-vocabulary bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingShape {
    pub key:         String,
    pub num_buckets: usize,
    pub dimension:   usize,
}

#[derive(Config, Debug)]
pub struct DenseFeaturesConfig {
    pub numeric_dim: usize,
    pub embeddings:  Vec<EmbeddingShape>,
}

impl DenseFeaturesConfig {
    /// Width of the concatenated feature vector
    pub fn output_dim(&self) -> usize {
        self.numeric_dim + self.embeddings.iter().map(|e| e.dimension).sum::<usize>()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DenseFeatures<B> {
        let embeddings = self
            .embeddings
            .iter()
            .map(|e| EmbeddingConfig::new(e.num_buckets, e.dimension).init(device))
            .collect();
        DenseFeatures { embeddings, numeric_dim: self.numeric_dim }
    }
}

/// Input layer: numeric columns pass through, each categorical
/// column goes through its own embedding table, and everything is
/// concatenated along the feature axis.
#[derive(Module, Debug)]
pub struct DenseFeatures<B: Backend> {
    pub embeddings:  Vec<Embedding<B>>,
    pub numeric_dim: usize,
}

impl<B: Backend> DenseFeatures<B> {
    /// numeric: [batch, n_numeric], categorical: [batch, n_categorical]
    /// → [batch, output_dim]
    pub fn forward(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, _] = categorical.dims();

        let mut parts = Vec::with_capacity(self.embeddings.len() + 1);
        if self.numeric_dim > 0 {
            parts.push(numeric);
        }
        for (i, embedding) in self.embeddings.iter().enumerate() {
            let ids = categorical.clone().slice([0..batch_size, i..i + 1]); // [batch, 1]
            parts.push(embedding.forward(ids).flatten::<2>(1, 2));          // [batch, dim]
        }

        Tensor::cat(parts, 1)
    }
}
