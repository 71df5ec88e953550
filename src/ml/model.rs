use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::input_layer::{DenseFeatures, DenseFeaturesConfig};

/// Any model that maps encoded census features to one logit per row.
///
/// Both the hand-written network and the declarative layer graph
/// implement this, so the estimator, evaluation and serving code
/// never care which one they hold.
pub trait LogitModel<B: Backend> {
    /// numeric: [batch, n_numeric], categorical: [batch, n_categorical] → [batch, 1]
    fn logits(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2>;
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CensusDnnConfig {
    pub features:     DenseFeaturesConfig,
    pub hidden_units: Vec<usize>,
    #[config(default = 0.1)]
    pub dropout:      f64,
}

impl CensusDnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CensusDnn<B> {
        let input = self.features.init(device);

        let mut width  = self.features.output_dim();
        let mut hidden = Vec::with_capacity(self.hidden_units.len());
        for &units in &self.hidden_units {
            hidden.push(LinearConfig::new(width, units).init(device));
            width = units;
        }

        let output  = LinearConfig::new(width, 1).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        CensusDnn { input, hidden, dropout, output }
    }
}

/// The hand-written model function: input layer, a stack of
/// ReLU + dropout hidden layers, and a single linear output unit.
#[derive(Module, Debug)]
pub struct CensusDnn<B: Backend> {
    pub input:   DenseFeatures<B>,
    pub hidden:  Vec<Linear<B>>,
    pub dropout: Dropout,
    pub output:  Linear<B>,
}

impl<B: Backend> CensusDnn<B> {
    pub fn forward(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let mut x = self.input.forward(numeric, categorical);
        for layer in &self.hidden {
            x = self.dropout.forward(relu(layer.forward(x)));
        }
        self.output.forward(x)
    }
}

impl<B: Backend> LogitModel<B> for CensusDnn<B> {
    fn logits(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.forward(numeric, categorical)
    }
}

/// Sigmoid cross entropy weighted per example.
///
/// Uses the stable form  max(x, 0) - x·y + ln(1 + e^-|x|)
/// and divides by the total weight, so the value is a weighted mean.
pub fn weighted_logistic_loss<B: Backend>(
    logits:  Tensor<B, 2>,
    labels:  Tensor<B, 2>,
    weights: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let per_example = logits.clone().clamp_min(0.0)
        - logits.clone() * labels
        + logits.abs().neg().exp().log1p();

    let total_weight = weights.clone().sum();
    (per_example * weights).sum() / total_weight
}
