// ============================================================
// Layer 5 — High-level Fit Loop (burn-train Learner)
// ============================================================
// Trains the declarative FunctionalModel the "compile + fit" way:
// epochs instead of steps, with callbacks handled by the Learner.
//
//   metrics     : accuracy + loss, train and valid split
//   checkpoints : one per epoch under <artifact_dir>/checkpoint,
//                 only the last `keep_checkpoints` kept
//   early stop  : validation loss, `patience` epochs without
//                 improvement
//
// The Learner's classification metrics expect one score per class,
// so the single logit is viewed as two classes: [0, logit].
// argmax over that pair is exactly `logit > 0`.
//
// The loss is fnlwgt-weighted like everywhere else, but the
// Learner's AccuracyMetric counts every row once. Its accuracy is
// not comparable with the weighted accuracy the estimator and
// evaluate_model report; use evaluate_model on the returned model
// for that.
//
// Reference: Burn Book §5 (Learner), burn mnist example

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    optim::AdamConfig,
    prelude::*,
    record::CompactRecorder,
    tensor::backend::AutodiffBackend,
    train::{
        checkpoint::KeepLastNCheckpoints,
        metric::{
            store::{Aggregate, Direction, Split},
            AccuracyMetric, LossMetric,
        },
        ClassificationOutput, LearnerBuilder, MetricEarlyStoppingStrategy, StoppingCondition,
        TrainOutput, TrainStep, ValidStep,
    },
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{batcher::{CensusBatch, CensusBatcher}, dataset::CensusDataset};
use crate::ml::functional::FunctionalModel;
use crate::ml::model::weighted_logistic_loss;
use crate::ml::{InferBackend, TrainBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitConfig {
    pub epochs:           usize,
    pub batch_size:       usize,
    pub learning_rate:    f64,
    pub patience:         usize,
    pub keep_checkpoints: usize,
    pub seed:             u64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            epochs:           10,
            batch_size:       64,
            learning_rate:    1e-3,
            patience:         2,
            keep_checkpoints: 2,
            seed:             42,
        }
    }
}

impl<B: Backend> FunctionalModel<B> {
    /// Forward + loss in the shape the Learner metrics consume.
    pub fn forward_classification(&self, batch: CensusBatch<B>) -> ClassificationOutput<B> {
        let logits = self.forward(batch.numeric, batch.categorical);
        let loss   = weighted_logistic_loss(logits.clone(), batch.labels, batch.weights);
        let output = Tensor::cat(vec![logits.zeros_like(), logits], 1);

        ClassificationOutput { loss, output, targets: batch.targets }
    }
}

impl<B: AutodiffBackend> TrainStep<CensusBatch<B>, ClassificationOutput<B>> for FunctionalModel<B> {
    fn step(&self, batch: CensusBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<CensusBatch<B>, ClassificationOutput<B>> for FunctionalModel<B> {
    fn step(&self, batch: CensusBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch)
    }
}

/// Fit `model` on `train`, validating on `valid` after every epoch.
///
/// Returns the model as it stands when training stops (last epoch or
/// early stop), not the best checkpoint.
pub fn fit(
    model:        FunctionalModel<TrainBackend>,
    train:        CensusDataset,
    valid:        CensusDataset,
    cfg:          &FitConfig,
    artifact_dir: &Path,
) -> Result<FunctionalModel<TrainBackend>> {
    anyhow::ensure!(train.sample_count() > 0, "training dataset is empty");
    anyhow::ensure!(valid.sample_count() > 0, "validation dataset is empty");
    anyhow::ensure!(cfg.epochs > 0, "epochs must be at least 1");
    anyhow::ensure!(cfg.batch_size > 0, "batch_size must be at least 1");
    anyhow::ensure!(cfg.patience > 0, "patience must be at least 1 epoch");
    anyhow::ensure!(cfg.keep_checkpoints > 0, "keep_checkpoints must be at least 1");

    std::fs::create_dir_all(artifact_dir)
        .with_context(|| format!("Cannot create '{}'", artifact_dir.display()))?;
    let dir = artifact_dir
        .to_str()
        .with_context(|| format!("Non UTF-8 path '{}'", artifact_dir.display()))?;

    let device = <TrainBackend as Backend>::Device::default();
    TrainBackend::seed(cfg.seed);

    let train_loader = DataLoaderBuilder::new(CensusBatcher::<TrainBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train);

    let valid_loader = DataLoaderBuilder::new(CensusBatcher::<InferBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(valid);

    let learner = LearnerBuilder::new(dir)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .with_checkpointing_strategy(KeepLastNCheckpoints::new(cfg.keep_checkpoints))
        .early_stopping(MetricEarlyStoppingStrategy::new::<LossMetric<TrainBackend>>(
            Aggregate::Mean,
            Direction::Lowest,
            Split::Valid,
            StoppingCondition::NoImprovementSince { n_epochs: cfg.patience },
        ))
        .with_application_logger(None)
        .devices(vec![device])
        .num_epochs(cfg.epochs)
        .build(model, AdamConfig::new().with_epsilon(1e-8).init(), cfg.learning_rate);

    tracing::info!(
        "Fitting for up to {} epochs (patience {}), artifacts in '{}'",
        cfg.epochs, cfg.patience, artifact_dir.display()
    );
    let trained = learner.fit(train_loader, valid_loader);
    tracing::info!("Fit finished");
    Ok(trained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::synthetic_dataset;
    use crate::ml::evaluation::evaluate_model;
    use crate::ml::functional::FunctionalModelConfig;
    use crate::ml::input_layer::{DenseFeaturesConfig, EmbeddingShape};
    use burn::{data::dataloader::batcher::Batcher, module::AutodiffModule};

    fn model() -> FunctionalModel<TrainBackend> {
        let features = DenseFeaturesConfig::new(
            2,
            vec![EmbeddingShape { key: "noise".into(), num_buckets: 4, dimension: 2 }],
        );
        FunctionalModelConfig::census_default(features, &[8], 0.0).init(&Default::default())
    }

    #[test]
    fn test_two_class_view_matches_logit_sign() {
        let device = Default::default();
        let batch  = CensusBatcher::<InferBackend>::new(device)
            .batch(synthetic_dataset(6, 9).examples().to_vec());
        let out = model().valid().forward_classification(batch);

        assert_eq!(out.output.dims(), [6, 2]);
        let zeros: Vec<f32> = out.output.slice([0..6, 0..1]).into_data().to_vec().unwrap();
        assert!(zeros.iter().all(|&z| z == 0.0));
        assert_eq!(out.loss.dims(), [1]);
    }

    #[test]
    fn test_fit_reduces_validation_loss() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let valid  = synthetic_dataset(128, 2);
        let start  = model();

        let before = evaluate_model::<InferBackend, _>(&start.valid(), valid.clone(), 64, 0, &device).unwrap();

        let cfg = FitConfig { epochs: 4, batch_size: 32, learning_rate: 0.05, patience: 2, keep_checkpoints: 1, seed: 3 };
        let trained = fit(start, synthetic_dataset(512, 1), valid.clone(), &cfg, dir.path()).unwrap();

        let after = evaluate_model::<InferBackend, _>(&trained.valid(), valid, 64, 0, &device).unwrap();
        assert!(after.average_loss < before.average_loss);
        assert!(dir.path().join("checkpoint").is_dir());
    }

    #[test]
    fn test_fit_rejects_empty_split() {
        let dir = tempfile::tempdir().unwrap();
        let res = fit(model(), synthetic_dataset(8, 1), CensusDataset::new(vec![]), &FitConfig::default(), dir.path());
        assert!(res.is_err());
    }

    #[test]
    fn test_fit_rejects_zero_patience_and_retention() {
        let dir = tempfile::tempdir().unwrap();

        let no_patience = FitConfig { patience: 0, ..FitConfig::default() };
        let res = fit(model(), synthetic_dataset(8, 1), synthetic_dataset(8, 2), &no_patience, dir.path());
        assert!(res.unwrap_err().to_string().contains("patience"));

        let no_checkpoints = FitConfig { keep_checkpoints: 0, ..FitConfig::default() };
        let res = fit(model(), synthetic_dataset(8, 1), synthetic_dataset(8, 2), &no_checkpoints, dir.path());
        assert!(res.unwrap_err().to_string().contains("keep_checkpoints"));
    }
}
