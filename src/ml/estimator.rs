// ============================================================
// Layer 5 — Estimator (train / evaluate / predict driver)
// ============================================================
// Wraps any LogitModel in a model directory and drives it by
// global step instead of by epoch:
//
//   train(dataset, max_steps)
//     forward → weighted logistic loss → backward → Adam step
//     checkpoint every `save_checkpoints_steps` and at the end
//
//   evaluate(dataset)  → EvalMetrics  (dropout off, inner backend)
//   predict(dataset)   → Vec<Prediction>
//
//   train_and_evaluate(train, eval, TrainSpec, EvalSpec)
//     train, pausing every `every_steps` to evaluate and append
//     a row to metrics.csv
//
// Step accounting:
//   `max_steps` is an absolute target, not a number of extra
//   steps. An estimator restored at step 300 and asked to train
//   to 300 does nothing; asked to train to 500 it runs 200 more.
//
//   Weights and global step are committed together, after each
//   successful checkpoint and at the end. A run that fails part
//   way leaves the estimator at its last checkpoint.
//
// model_to_estimator turns an already-built model (e.g. the
// declarative FunctionalModel after `fit`) into an estimator by
// writing its weights as the step-0 checkpoint.
//
// Reference: Burn Book §5 (Custom Training Loop), Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{batcher::CensusBatcher, dataset::CensusDataset, features::FeatureSpec};
use crate::infra::{
    checkpoint::CheckpointManager,
    export::{self, ModelArchitecture},
    metrics::{EvalRecord, MetricsLogger},
};
use crate::ml::evaluation::{evaluate_model, predict_model, EvalMetrics, Prediction};
use crate::ml::model::{weighted_logistic_loss, LogitModel};
use crate::ml::{InferBackend, TrainBackend};

/// Where and how often the estimator writes to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub model_dir:              PathBuf,
    pub save_checkpoints_steps: usize,
    pub keep_checkpoint_max:    usize,
    pub log_step_count_steps:   usize,
    pub seed:                   u64,
}

impl RunConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir:              model_dir.into(),
            save_checkpoints_steps: 100,
            keep_checkpoint_max:    5,
            log_step_count_steps:   100,
            seed:                   42,
        }
    }
}

/// Optimisation hyperparameters handed to the model function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorParams {
    pub learning_rate: f64,
    pub batch_size:    usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainSpec {
    pub max_steps: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct EvalSpec {
    /// Evaluate after every this many global steps (and at the end)
    pub every_steps: usize,
}

/// Periodic evaluation during training
struct EvalHook<'a> {
    dataset:     &'a CensusDataset,
    every_steps: usize,
    logger:      &'a MetricsLogger,
}

pub struct Estimator<M> {
    model:       M,
    run_config:  RunConfig,
    params:      EstimatorParams,
    checkpoints: CheckpointManager,
    global_step: usize,
    device:      <TrainBackend as Backend>::Device,
}

impl<M> Estimator<M>
where
    M: AutodiffModule<TrainBackend> + LogitModel<TrainBackend>,
    M::InnerModule: LogitModel<InferBackend>,
{
    /// Create an estimator. If `model_dir` already holds a checkpoint,
    /// training resumes from it.
    pub fn new(model: M, run_config: RunConfig, params: EstimatorParams) -> Result<Self> {
        let device      = Default::default();
        let checkpoints = CheckpointManager::new(&run_config.model_dir, run_config.keep_checkpoint_max)?;

        let (model, global_step) = match checkpoints.restore::<TrainBackend, _>(model.clone(), &device)? {
            Some(restored) => restored,
            None => {
                tracing::info!("No checkpoint in '{}', starting from scratch", run_config.model_dir.display());
                (model, 0)
            }
        };

        Ok(Self { model, run_config, params, checkpoints, global_step, device })
    }

    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Train until the global step reaches `max_steps`.
    pub fn train(&mut self, dataset: CensusDataset, max_steps: usize) -> Result<usize> {
        self.run_training(dataset, max_steps, None)
    }

    pub fn evaluate(&self, dataset: CensusDataset) -> Result<EvalMetrics> {
        let metrics = evaluate_model::<InferBackend, _>(
            &self.model.valid(),
            dataset,
            self.params.batch_size,
            self.global_step,
            &self.device,
        )?;
        tracing::info!(
            "Eval @ step {}: accuracy={:.4} auc={:.4} average_loss={:.4}",
            metrics.global_step, metrics.accuracy, metrics.auc, metrics.average_loss,
        );
        Ok(metrics)
    }

    pub fn predict(&self, dataset: CensusDataset) -> Result<Vec<Prediction>> {
        predict_model::<InferBackend, _>(&self.model.valid(), dataset, self.params.batch_size, &self.device)
    }

    /// Train with periodic evaluation, then run a final evaluation.
    pub fn train_and_evaluate(
        &mut self,
        train:      CensusDataset,
        eval:       CensusDataset,
        train_spec: TrainSpec,
        eval_spec:  EvalSpec,
    ) -> Result<EvalMetrics> {
        if eval.sample_count() == 0 {
            bail!("evaluation dataset is empty");
        }
        let logger = MetricsLogger::new(&self.run_config.model_dir)?;
        let hook   = EvalHook { dataset: &eval, every_steps: eval_spec.every_steps.max(1), logger: &logger };

        self.run_training(train, train_spec.max_steps, Some(hook))?;
        tracing::info!("Evaluation history in '{}'", logger.csv_path().display());
        self.evaluate(eval)
    }

    /// Write a serving export of the current weights.
    pub fn export_saved_model(
        &self,
        export_base:  &Path,
        architecture: &ModelArchitecture,
        features:     &FeatureSpec,
    ) -> Result<PathBuf> {
        export::export_saved_model::<InferBackend, _>(
            export_base,
            &self.model.valid(),
            architecture,
            features,
            self.global_step,
        )
    }

    fn run_training(
        &mut self,
        dataset:   CensusDataset,
        max_steps: usize,
        eval:      Option<EvalHook<'_>>,
    ) -> Result<usize> {
        if self.global_step >= max_steps {
            tracing::info!("Already at step {} (max_steps={}), nothing to train", self.global_step, max_steps);
            return Ok(self.global_step);
        }
        if dataset.sample_count() == 0 {
            bail!("training dataset is empty");
        }

        // Offset by the step so a resumed run does not replay the same order
        let seed = self.run_config.seed.wrapping_add(self.global_step as u64);
        TrainBackend::seed(seed);

        let loader = DataLoaderBuilder::new(CensusBatcher::<TrainBackend>::new(self.device.clone()))
            .batch_size(self.params.batch_size.max(1))
            .shuffle(seed)
            .num_workers(1)
            .build(dataset);

        let save_every = self.run_config.save_checkpoints_steps.max(1);
        let log_every  = self.run_config.log_step_count_steps.max(1);

        let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
        let mut model = self.model.clone();
        let mut step  = self.global_step;

        let mut window_loss  = 0.0f64;
        let mut window_steps = 0usize;
        let mut best_eval_loss = f64::INFINITY;

        tracing::info!("Training from step {} to {}", self.global_step, max_steps);

        'epochs: loop {
            for batch in loader.iter() {
                let logits = model.logits(batch.numeric, batch.categorical);
                let loss   = weighted_logistic_loss(logits, batch.labels, batch.weights);

                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                window_loss  += loss_val;
                window_steps += 1;

                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &model);
                model = optim.step(self.params.learning_rate, model, grads);
                step += 1;

                let done = step >= max_steps;

                if step % log_every == 0 {
                    tracing::info!("step {} loss={:.4}", step, loss_val);
                }

                if step % save_every == 0 || done {
                    self.checkpoints.save::<TrainBackend, _>(&model, step)?;
                    self.model       = model.clone();
                    self.global_step = step;
                }

                if let Some(hook) = &eval {
                    if step % hook.every_steps == 0 || done {
                        let metrics = evaluate_model::<InferBackend, _>(
                            &model.valid(),
                            hook.dataset.clone(),
                            self.params.batch_size,
                            step,
                            &self.device,
                        )?;
                        let train_loss = window_loss / window_steps.max(1) as f64;
                        let record     = EvalRecord::new(train_loss, &metrics);
                        hook.logger.log(&record)?;
                        tracing::info!(
                            "step {} | train_loss={:.4} | eval_loss={:.4} | accuracy={:.4} | auc={:.4}",
                            step, train_loss, metrics.average_loss, metrics.accuracy, metrics.auc,
                        );
                        if record.is_improvement(best_eval_loss) {
                            best_eval_loss = record.eval_loss;
                            tracing::info!("  ↑ best eval loss so far");
                        }
                        window_loss  = 0.0;
                        window_steps = 0;
                    }
                }

                if done {
                    break 'epochs;
                }
            }
        }

        self.model       = model;
        self.global_step = step;
        tracing::info!("Training stopped at step {}", self.global_step);
        Ok(self.global_step)
    }
}

/// Convert an already-built model into an estimator.
///
/// The model's current weights become checkpoint 0 of `run_config.model_dir`.
/// A directory that already holds checkpoints is resumed instead, and the
/// given weights are ignored.
pub fn model_to_estimator<M>(model: M, run_config: RunConfig, params: EstimatorParams) -> Result<Estimator<M>>
where
    M: AutodiffModule<TrainBackend> + LogitModel<TrainBackend>,
    M::InnerModule: LogitModel<InferBackend>,
{
    let checkpoints = CheckpointManager::new(&run_config.model_dir, run_config.keep_checkpoint_max)?;
    if let Some(step) = checkpoints.latest_step()? {
        tracing::warn!(
            "'{}' already holds checkpoint {}, resuming it instead of the converted weights",
            run_config.model_dir.display(),
            step
        );
        return Estimator::new(model, run_config, params);
    }

    checkpoints.save::<TrainBackend, _>(&model, 0)?;
    tracing::info!("Converted model written as step 0 of '{}'", run_config.model_dir.display());

    Ok(Estimator {
        model,
        run_config,
        params,
        checkpoints,
        global_step: 0,
        device: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::synthetic_dataset as synthetic;
    use crate::ml::functional::FunctionalModelConfig;
    use crate::ml::input_layer::{DenseFeaturesConfig, EmbeddingShape};
    use crate::ml::model::{CensusDnn, CensusDnnConfig};

    fn features() -> DenseFeaturesConfig {
        DenseFeaturesConfig::new(
            2,
            vec![EmbeddingShape { key: "noise".into(), num_buckets: 4, dimension: 2 }],
        )
    }

    fn dnn() -> CensusDnn<TrainBackend> {
        CensusDnnConfig::new(features(), vec![8]).with_dropout(0.0).init(&Default::default())
    }

    fn run_config(dir: &Path) -> RunConfig {
        RunConfig {
            model_dir:              dir.to_path_buf(),
            save_checkpoints_steps: 10,
            keep_checkpoint_max:    2,
            log_step_count_steps:   50,
            seed:                   1,
        }
    }

    fn params() -> EstimatorParams {
        EstimatorParams { learning_rate: 0.05, batch_size: 32 }
    }

    #[test]
    fn test_train_learns_separable_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();
        assert_eq!(est.global_step(), 0);

        let step = est.train(synthetic(512, 1), 150).unwrap();
        assert_eq!(step, 150);

        let metrics = est.evaluate(synthetic(256, 2)).unwrap();
        assert!(metrics.accuracy > 0.8, "accuracy {}", metrics.accuracy);
        assert!(metrics.auc > 0.85, "auc {}", metrics.auc);
        assert_eq!(metrics.global_step, 150);
    }

    #[test]
    fn test_resume_from_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();
            est.train(synthetic(64, 1), 20).unwrap();
        }

        let mut est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();
        assert_eq!(est.global_step(), 20);

        // already there → no-op
        assert_eq!(est.train(synthetic(64, 1), 20).unwrap(), 20);
        assert_eq!(est.train(synthetic(64, 1), 35).unwrap(), 35);

        let mgr   = CheckpointManager::new(dir.path(), 2).unwrap();
        let state = mgr.state().unwrap().unwrap();
        assert_eq!(state.latest, 35);
        assert_eq!(state.all, vec![30, 35]);
    }

    #[test]
    fn test_failed_checkpoint_keeps_last_saved_state() {
        let dir       = tempfile::tempdir().unwrap();
        let model_dir = dir.path().join("model");
        let data      = synthetic(16, 4);

        let mut est = Estimator::new(dnn(), run_config(&model_dir), params()).unwrap();
        est.train(synthetic(64, 1), 10).unwrap();
        let saved = est.predict(data.clone()).unwrap();

        // the next checkpoint (step 20) cannot be written
        std::fs::remove_dir_all(&model_dir).unwrap();
        std::fs::write(&model_dir, "not a directory").unwrap();

        assert!(est.train(synthetic(64, 1), 30).is_err());
        assert_eq!(est.global_step(), 10);
        assert_eq!(est.predict(data).unwrap(), saved);
    }

    #[test]
    fn test_empty_training_set_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();
        assert!(est.train(CensusDataset::new(vec![]), 10).is_err());
    }

    #[test]
    fn test_train_and_evaluate_logs_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let mut est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();

        let metrics = est
            .train_and_evaluate(
                synthetic(128, 1),
                synthetic(64, 2),
                TrainSpec { max_steps: 25 },
                EvalSpec { every_steps: 10 },
            )
            .unwrap();
        assert_eq!(metrics.global_step, 25);

        // evaluations at 10, 20 and the final step 25
        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_predict_returns_one_per_example() {
        let dir = tempfile::tempdir().unwrap();
        let est = Estimator::new(dnn(), run_config(dir.path()), params()).unwrap();
        let preds = est.predict(synthetic(37, 3)).unwrap();
        assert_eq!(preds.len(), 37);
        assert!(preds.iter().all(|p| (0.0..=1.0).contains(&p.logistic)));
    }

    #[test]
    fn test_model_to_estimator_keeps_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let cfg    = FunctionalModelConfig::census_default(features(), &[4], 0.0);
        let model  = cfg.init::<TrainBackend>(&Default::default());
        let data   = synthetic(16, 4);

        let before = predict_model::<InferBackend, _>(&model.valid(), data.clone(), 8, &Default::default()).unwrap();

        let mut est = model_to_estimator(model, run_config(dir.path()), params()).unwrap();
        assert_eq!(est.global_step(), 0);
        assert!(dir.path().join("model_step_0.mpk.gz").exists());
        assert_eq!(est.predict(data.clone()).unwrap(), before);

        est.train(synthetic(64, 5), 5).unwrap();
        assert_eq!(est.global_step(), 5);
        assert_ne!(est.predict(data).unwrap(), before);
    }
}
