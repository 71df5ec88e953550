// ============================================================
// Layer 5 — Declarative Layer Graph
// ============================================================
// The second way to describe a census model: instead of writing
// the forward pass by hand, the architecture is plain data:
// a list of LayerSpec entries that can be stored as JSON and
// compiled into a Burn module.
//
//   [Dense(64, relu), Dropout(0.1), Dense(32, relu), Dense(1, linear)]
//
// compiles to
//
//   DenseFeatures → DenseBlock(64, relu, dropout 0.1)
//                 → DenseBlock(32, relu)
//                 → DenseBlock(1)
//
// A Dropout entry attaches to the Dense entry before it.
// The graph must end with a single linear unit: the sigmoid head
// lives in evaluation/serving, not in the graph.
//
// save_model/load_model keep the architecture and the weights
// side by side in one directory:
//   <dir>/config.json        — FunctionalModelConfig
//   <dir>/weights.mpk.gz     — full precision record
//
// Reference: Burn Book §3 (Building Blocks), §5 (Records)

use anyhow::{bail, Context, Result};
use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::ml::input_layer::{DenseFeatures, DenseFeaturesConfig};
use crate::ml::model::LogitModel;

const CONFIG_FILE:  &str = "config.json";
const WEIGHTS_FILE: &str = "weights";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense { units: usize, activation: Activation },
    Dropout { rate: f64 },
}

#[derive(Config, Debug)]
pub struct FunctionalModelConfig {
    pub features: DenseFeaturesConfig,
    pub layers:   Vec<LayerSpec>,
}

impl FunctionalModelConfig {
    /// Dense(h, relu) [+ Dropout] for every hidden width, then Dense(1, linear).
    pub fn census_default(features: DenseFeaturesConfig, hidden_units: &[usize], dropout: f64) -> Self {
        let mut layers = Vec::new();
        for &units in hidden_units {
            layers.push(LayerSpec::Dense { units, activation: Activation::Relu });
            if dropout > 0.0 {
                layers.push(LayerSpec::Dropout { rate: dropout });
            }
        }
        layers.push(LayerSpec::Dense { units: 1, activation: Activation::Linear });
        Self::new(features, layers)
    }

    pub fn validate(&self) -> Result<()> {
        match self.layers.first() {
            None => bail!("layer graph is empty"),
            Some(LayerSpec::Dropout { .. }) => bail!("layer graph cannot start with dropout"),
            Some(LayerSpec::Dense { .. }) => {}
        }

        for (i, layer) in self.layers.iter().enumerate() {
            match layer {
                LayerSpec::Dense { units: 0, .. } => bail!("layer {i}: dense layer with zero units"),
                LayerSpec::Dropout { rate } if !(0.0..1.0).contains(rate) => {
                    bail!("layer {i}: dropout rate {rate} outside [0, 1)")
                }
                _ => {}
            }
        }

        match self.layers.last() {
            Some(LayerSpec::Dense { units: 1, activation: Activation::Linear }) => Ok(()),
            _ => bail!("layer graph must end with Dense {{ units: 1, activation: linear }}"),
        }
    }

    /// Compile the graph. Call `validate` first; an invalid graph
    /// compiles to whatever prefix makes sense.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FunctionalModel<B> {
        let input = self.features.init(device);

        let mut width  = self.features.output_dim();
        let mut blocks: Vec<DenseBlock<B>> = Vec::new();
        for layer in &self.layers {
            match layer {
                LayerSpec::Dense { units, activation } => {
                    blocks.push(DenseBlock {
                        linear:     LinearConfig::new(width, *units).init(device),
                        activation: (*activation == Activation::Relu).then(Relu::new),
                        dropout:    None,
                    });
                    width = *units;
                }
                LayerSpec::Dropout { rate } => {
                    if let Some(last) = blocks.last_mut() {
                        last.dropout = Some(DropoutConfig::new(*rate).init());
                    }
                }
            }
        }

        FunctionalModel { input, blocks }
    }
}

/// Linear → optional ReLU → optional Dropout
#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub linear:     Linear<B>,
    pub activation: Option<Relu>,
    pub dropout:    Option<Dropout>,
}

impl<B: Backend> DenseBlock<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = self.linear.forward(x);
        if let Some(relu) = &self.activation {
            x = relu.forward(x);
        }
        if let Some(dropout) = &self.dropout {
            x = dropout.forward(x);
        }
        x
    }
}

#[derive(Module, Debug)]
pub struct FunctionalModel<B: Backend> {
    pub input:  DenseFeatures<B>,
    pub blocks: Vec<DenseBlock<B>>,
}

impl<B: Backend> FunctionalModel<B> {
    pub fn forward(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.blocks
            .iter()
            .fold(self.input.forward(numeric, categorical), |x, block| block.forward(x))
    }
}

impl<B: Backend> LogitModel<B> for FunctionalModel<B> {
    fn logits(&self, numeric: Tensor<B, 2>, categorical: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        self.forward(numeric, categorical)
    }
}

/// Save architecture + weights into `dir`.
pub fn save_model<B: Backend>(
    model:  &FunctionalModel<B>,
    config: &FunctionalModelConfig,
    dir:    &Path,
) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    fs::write(&config_path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

    let weights_path = dir.join(WEIGHTS_FILE);
    NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
        .record(model.clone().into_record(), weights_path.clone())
        .with_context(|| format!("Cannot save weights to '{}'", weights_path.display()))?;

    tracing::info!("Saved model to '{}'", dir.display());
    Ok(())
}

/// Rebuild the model saved by `save_model`.
pub fn load_model<B: Backend>(
    dir:    &Path,
    device: &B::Device,
) -> Result<(FunctionalModel<B>, FunctionalModelConfig)> {
    let config_path = dir.join(CONFIG_FILE);
    let json = fs::read_to_string(&config_path)
        .with_context(|| format!("Cannot read '{}'. Was the model saved?", config_path.display()))?;
    let config: FunctionalModelConfig = serde_json::from_str(&json)
        .with_context(|| format!("Invalid model config in '{}'", config_path.display()))?;
    config.validate()?;

    let weights_path = dir.join(WEIGHTS_FILE);
    let record = NamedMpkGzFileRecorder::<FullPrecisionSettings>::new()
        .load(weights_path.clone(), device)
        .with_context(|| format!("Cannot load weights from '{}'", weights_path.display()))?;

    let model = config.init::<B>(device).load_record(record);
    Ok((model, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::input_layer::EmbeddingShape;
    use burn::backend::NdArray;

    type B = NdArray;

    fn features() -> DenseFeaturesConfig {
        DenseFeaturesConfig::new(
            2,
            vec![EmbeddingShape { key: "race".into(), num_buckets: 6, dimension: 2 }],
        )
    }

    #[test]
    fn test_census_default_graph() {
        let cfg = FunctionalModelConfig::census_default(features(), &[16, 8], 0.2);
        assert_eq!(cfg.layers.len(), 5);
        assert!(cfg.validate().is_ok());

        let model = cfg.init::<B>(&Default::default());
        assert_eq!(model.blocks.len(), 3);
        assert!(model.blocks[0].dropout.is_some());
        assert!(model.blocks[0].activation.is_some());
        assert!(model.blocks[2].activation.is_none());
        assert!(model.blocks[2].dropout.is_none());
    }

    #[test]
    fn test_no_dropout_when_rate_is_zero() {
        let cfg = FunctionalModelConfig::census_default(features(), &[4], 0.0);
        assert_eq!(cfg.layers.len(), 2);
    }

    #[test]
    fn test_validation_rules() {
        let dense = |units, activation| LayerSpec::Dense { units, activation };
        let bad = [
            vec![],
            vec![LayerSpec::Dropout { rate: 0.1 }, dense(1, Activation::Linear)],
            vec![dense(0, Activation::Relu), dense(1, Activation::Linear)],
            vec![dense(4, Activation::Relu), LayerSpec::Dropout { rate: 1.0 }, dense(1, Activation::Linear)],
            vec![dense(4, Activation::Relu)],
            vec![dense(1, Activation::Relu)],
        ];
        for layers in bad {
            let cfg = FunctionalModelConfig::new(features(), layers.clone());
            assert!(cfg.validate().is_err(), "{layers:?} should be rejected");
        }
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model  = FunctionalModelConfig::census_default(features(), &[8], 0.1).init::<B>(&device);
        let out    = model.logits(
            Tensor::<B, 2>::ones([5, 2], &device),
            Tensor::<B, 2, Int>::ones([5, 1], &device),
        );
        assert_eq!(out.dims(), [5, 1]);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let cfg    = FunctionalModelConfig::census_default(features(), &[8], 0.1);
        let model  = cfg.init::<B>(&device);

        save_model(&model, &cfg, dir.path()).unwrap();
        let (loaded, loaded_cfg) = load_model::<B>(dir.path(), &device).unwrap();
        assert_eq!(loaded_cfg.layers, cfg.layers);

        let numeric = Tensor::<B, 2>::from_floats([[0.5, -1.0], [2.0, 0.0]], &device);
        let cats    = Tensor::<B, 2, Int>::from_ints([[1], [5]], &device);
        let a: Vec<f32> = model.logits(numeric.clone(), cats.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.logits(numeric, cats).into_data().to_vec().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_model::<B>(&dir.path().join("nope"), &Default::default()).is_err());
    }
}
