// ============================================================
// Layer 2 — ConvertUseCase
// ============================================================
// Turns a saved layer-graph model into an estimator and keeps
// training it step by step:
//
//   Step 1: Load the saved FunctionalModel + its feature spec
//   Step 2: Encode train / eval files with that feature spec
//   Step 3: model_to_estimator → weights become step 0
//   Step 4: Train + evaluate up to `steps` (0 = evaluate only)
//   Step 5: Export the estimator's weights
//
// Reference: Burn Book §5 (Records)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::train_use_case::EXPORT_DIR;
use crate::data::{dataset::CensusDataset, features::FeatureTransformer, loader::CsvLoader};
use crate::domain::traits::RowSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    export::ModelArchitecture,
    metadata_store::MetadataStore,
};
use crate::ml::{
    estimator::{model_to_estimator, EstimatorParams, EvalSpec, RunConfig, TrainSpec},
    evaluation::EvalMetrics,
    functional::load_model,
    TrainBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    pub keras_model:            PathBuf,
    pub model_dir:              PathBuf,
    pub train_file:             PathBuf,
    pub eval_file:              PathBuf,
    pub steps:                  usize,
    pub batch_size:             usize,
    pub learning_rate:          f64,
    pub save_checkpoints_steps: usize,
    pub eval_every_steps:       usize,
    pub keep_checkpoints:       usize,
    pub seed:                   u64,
}

#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub global_step: usize,
    pub metrics:     EvalMetrics,
    pub export_dir:  PathBuf,
}

pub struct ConvertUseCase {
    config: ConvertConfig,
}

impl ConvertUseCase {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ConvertReport> {
        let cfg = &self.config;

        // ── Step 1: Saved model and the features it was trained on ────────────
        let (model, model_cfg) = load_model::<TrainBackend>(&cfg.keras_model, &Default::default())?;
        let features = MetadataStore::new(&cfg.keras_model).load_features()?;
        if features.input_layer_config().embeddings != model_cfg.features.embeddings
            || features.input_layer_config().numeric_dim != model_cfg.features.numeric_dim
        {
            bail!("feature spec in '{}' does not match the saved model", cfg.keras_model.display());
        }
        tracing::info!("Loaded layer graph with {} layers", model_cfg.layers.len());

        // ── Step 2: Encode data ───────────────────────────────────────────────
        let transformer = FeatureTransformer::new(&features);
        let train = CensusDataset::from_rows(&CsvLoader::new(&cfg.train_file).load_all()?, &transformer)?;
        let eval  = CensusDataset::from_rows(&CsvLoader::new(&cfg.eval_file).load_all()?, &transformer)?;

        // ── Step 3: Convert ───────────────────────────────────────────────────
        MetadataStore::new(&cfg.model_dir).save_features(&features)?;
        CheckpointManager::new(&cfg.model_dir, cfg.keep_checkpoints)?.save_config(cfg)?;

        let run_config = RunConfig {
            model_dir:              cfg.model_dir.clone(),
            save_checkpoints_steps: cfg.save_checkpoints_steps,
            keep_checkpoint_max:    cfg.keep_checkpoints,
            log_step_count_steps:   100,
            seed:                   cfg.seed,
        };
        let params = EstimatorParams { learning_rate: cfg.learning_rate, batch_size: cfg.batch_size };
        let mut estimator = model_to_estimator(model, run_config, params)?;

        // ── Step 4: Train / evaluate ──────────────────────────────────────────
        let metrics = if cfg.steps > estimator.global_step() {
            estimator.train_and_evaluate(
                train,
                eval,
                TrainSpec { max_steps: cfg.steps },
                EvalSpec { every_steps: cfg.eval_every_steps },
            )?
        } else {
            estimator.evaluate(eval)?
        };

        // ── Step 5: Export ────────────────────────────────────────────────────
        let export_dir = estimator.export_saved_model(
            &cfg.model_dir.join(EXPORT_DIR),
            &ModelArchitecture::Functional(model_cfg),
            &features,
        )?;

        Ok(ConvertReport { global_step: estimator.global_step(), metrics, export_dir })
    }
}
