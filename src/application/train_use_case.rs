// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Load train + eval CSV files     (Layer 4 - data)
//   Step 2: Metadata from the train split   (Layer 6 - infra)
//   Step 3: Feature columns                 (Layer 4 - data)
//   Step 4: Save config                     (Layer 6 - infra)
//   Step 5: Train with the chosen approach  (Layer 5 - ml)
//             estimator → step-based, evaluates on the eval file
//             keras     → Learner fit on a train/valid split,
//                         model saved to <model_dir>/keras_model
//   Step 6: Final evaluation on the eval file
//   Step 7: Export for serving              (Layer 6 - infra)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::module::AutodiffModule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    dataset::CensusDataset,
    features::{FeatureSpec, FeatureTransformer},
    loader::CsvLoader,
    splitter::split_train_val,
};
use crate::domain::{census::CensusRow, traits::RowSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    export::{export_saved_model, ModelArchitecture},
    metadata_store::MetadataStore,
};
use crate::ml::{
    estimator::{Estimator, EstimatorParams, EvalSpec, RunConfig, TrainSpec},
    evaluation::{evaluate_model, EvalMetrics},
    fit::{fit, FitConfig},
    functional::{save_model, FunctionalModelConfig},
    model::CensusDnnConfig,
    InferBackend, TrainBackend,
};

pub const KERAS_MODEL_DIR: &str = "keras_model";
pub const EXPORT_DIR:      &str = "export";
const FIT_ARTIFACT_DIR:    &str = "keras_fit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    /// Hand-written model function + step-based estimator
    Estimator,
    /// Declarative layer graph + Learner fit loop
    Keras,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved to <model_dir>/train_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_file:             PathBuf,
    pub eval_file:              PathBuf,
    pub model_dir:              PathBuf,
    pub approach:               Approach,
    pub hidden_units:           Vec<usize>,
    pub dropout:                f64,
    pub batch_size:             usize,
    pub learning_rate:          f64,
    /// estimator: absolute max global step
    pub train_steps:            usize,
    pub save_checkpoints_steps: usize,
    pub eval_every_steps:       usize,
    /// keras: epochs, early-stopping patience, validation split
    pub epochs:                 usize,
    pub patience:               usize,
    pub validation_fraction:    f64,
    pub keep_checkpoints:       usize,
    pub normalize_numeric:      bool,
    pub seed:                   u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_file:             PathBuf::from("data/adult.data.csv"),
            eval_file:              PathBuf::from("data/adult.test.csv"),
            model_dir:              PathBuf::from("models/census"),
            approach:               Approach::Estimator,
            hidden_units:           vec![100, 75, 50, 25],
            dropout:                0.1,
            batch_size:             40,
            learning_rate:          1e-3,
            train_steps:            2000,
            save_checkpoints_steps: 200,
            eval_every_steps:       400,
            epochs:                 10,
            patience:               2,
            validation_fraction:    0.1,
            keep_checkpoints:       5,
            normalize_numeric:      true,
            seed:                   42,
        }
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub approach:   Approach,
    pub metrics:    EvalMetrics,
    pub export_dir: PathBuf,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Load rows ─────────────────────────────────────────────────
        tracing::info!("Loading training rows from '{}'", cfg.train_file.display());
        let train_rows = CsvLoader::new(&cfg.train_file).load_all()?;
        let eval_rows  = CsvLoader::new(&cfg.eval_file).load_all()?;
        anyhow::ensure!(!train_rows.is_empty(), "no usable rows in '{}'", cfg.train_file.display());
        tracing::info!("{} train rows, {} eval rows", train_rows.len(), eval_rows.len());

        // ── Step 2 + 3: Metadata and feature columns ──────────────────────────
        // Training split only, so eval values never leak into the vocabulary
        let store    = MetadataStore::new(&cfg.model_dir);
        let features = load_or_build_features(&store, &train_rows, cfg.normalize_numeric)?;
        let transformer = FeatureTransformer::new(&features);
        tracing::info!(
            "{} numeric + {} embedding columns",
            features.numeric_columns().count(),
            features.embedding_columns().count()
        );

        // ── Step 4: Save config ───────────────────────────────────────────────
        // A resumed model dir must keep its architecture
        let ckpt_manager = CheckpointManager::new(&cfg.model_dir, cfg.keep_checkpoints)?;
        if let Some(previous) = ckpt_manager.load_config::<TrainConfig>()? {
            if previous.approach != cfg.approach
                || previous.hidden_units != cfg.hidden_units
                || previous.normalize_numeric != cfg.normalize_numeric
            {
                anyhow::bail!(
                    "'{}' was trained with {:?} {:?} (normalize_numeric={}); use a fresh --model-dir for a different setup",
                    cfg.model_dir.display(), previous.approach, previous.hidden_units, previous.normalize_numeric
                );
            }
        }
        ckpt_manager.save_config(cfg)?;

        let eval_ds = CensusDataset::from_rows(&eval_rows, &transformer)?;

        // ── Step 5-7: Train, evaluate, export ─────────────────────────────────
        let export_base = cfg.model_dir.join(EXPORT_DIR);
        let (metrics, export_dir) = match cfg.approach {
            Approach::Estimator => {
                let train_ds = CensusDataset::from_rows(&train_rows, &transformer)?;
                self.run_estimator(&features, train_ds, eval_ds, &export_base)?
            }
            Approach::Keras => self.run_keras(&features, &transformer, train_rows, eval_ds, &export_base)?,
        };

        tracing::info!(
            "Final eval: accuracy={:.4} auc={:.4} loss={:.4}",
            metrics.accuracy, metrics.auc, metrics.average_loss
        );
        Ok(TrainReport { approach: cfg.approach, metrics, export_dir })
    }

    fn run_estimator(
        &self,
        features:    &FeatureSpec,
        train:       CensusDataset,
        eval:        CensusDataset,
        export_base: &Path,
    ) -> Result<(EvalMetrics, PathBuf)> {
        let cfg       = &self.config;
        let model_cfg = CensusDnnConfig::new(features.input_layer_config(), cfg.hidden_units.clone())
            .with_dropout(cfg.dropout);
        let model     = model_cfg.init::<TrainBackend>(&Default::default());

        let mut estimator = Estimator::new(model, self.run_config(), self.params())?;
        let metrics = estimator.train_and_evaluate(
            train,
            eval,
            TrainSpec { max_steps: cfg.train_steps },
            EvalSpec { every_steps: cfg.eval_every_steps },
        )?;

        let export_dir = estimator.export_saved_model(export_base, &ModelArchitecture::Dnn(model_cfg), features)?;
        Ok((metrics, export_dir))
    }

    fn run_keras(
        &self,
        features:    &FeatureSpec,
        transformer: &FeatureTransformer,
        train_rows:  Vec<CensusRow>,
        eval:        CensusDataset,
        export_base: &Path,
    ) -> Result<(EvalMetrics, PathBuf)> {
        let cfg = &self.config;

        let (fit_rows, valid_rows) = split_train_val(train_rows, 1.0 - cfg.validation_fraction, cfg.seed);
        tracing::info!("Split: {} fit, {} validation", fit_rows.len(), valid_rows.len());
        let fit_ds   = CensusDataset::from_rows(&fit_rows, transformer)?;
        let valid_ds = CensusDataset::from_rows(&valid_rows, transformer)?;

        let model_cfg = FunctionalModelConfig::census_default(
            features.input_layer_config(),
            &cfg.hidden_units,
            cfg.dropout,
        );
        model_cfg.validate()?;
        let model = model_cfg.init::<TrainBackend>(&Default::default());

        let fit_cfg = FitConfig {
            epochs:           cfg.epochs,
            batch_size:       cfg.batch_size,
            learning_rate:    cfg.learning_rate,
            patience:         cfg.patience,
            keep_checkpoints: cfg.keep_checkpoints,
            seed:             cfg.seed,
        };
        let trained = fit(model, fit_ds, valid_ds, &fit_cfg, &cfg.model_dir.join(FIT_ARTIFACT_DIR))?.valid();

        // The saved model carries its own feature spec so `convert` can
        // encode data exactly as it was trained on.
        let keras_dir = cfg.model_dir.join(KERAS_MODEL_DIR);
        save_model(&trained, &model_cfg, &keras_dir)?;
        MetadataStore::new(&keras_dir).save_features(features)?;

        let metrics = evaluate_model::<InferBackend, _>(&trained, eval, cfg.batch_size, 0, &Default::default())?;
        let export_dir = export_saved_model::<InferBackend, _>(
            export_base,
            &trained,
            &ModelArchitecture::Functional(model_cfg),
            features,
            0,
        )?;
        Ok((metrics, export_dir))
    }

    fn run_config(&self) -> RunConfig {
        let cfg = &self.config;
        RunConfig {
            model_dir:              cfg.model_dir.clone(),
            save_checkpoints_steps: cfg.save_checkpoints_steps,
            keep_checkpoint_max:    cfg.keep_checkpoints,
            log_step_count_steps:   100,
            seed:                   cfg.seed,
        }
    }

    fn params(&self) -> EstimatorParams {
        EstimatorParams { learning_rate: self.config.learning_rate, batch_size: self.config.batch_size }
    }
}

/// Reuse the feature spec of an existing model dir, otherwise build
/// and save one from the (possibly stored) training metadata.
///
/// A stored spec must agree with `normalize`; the embedding tables
/// and the input scaling of a resumed model cannot change.
fn load_or_build_features(
    store:      &MetadataStore,
    train_rows: &[CensusRow],
    normalize:  bool,
) -> Result<FeatureSpec> {
    if store.has_features() {
        let spec = store.load_features()?;
        if spec.normalizes_numeric() != normalize {
            anyhow::bail!(
                "stored feature spec has normalize_numeric={}, but this run asks for {}",
                spec.normalizes_numeric(),
                normalize
            );
        }
        tracing::info!("Reusing stored feature spec");
        return Ok(spec);
    }
    let metadata = store.load_or_compute(train_rows)?;
    let spec     = FeatureSpec::from_metadata(&metadata, normalize)?;
    store.save_features(&spec)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::export::read_manifest;
    use std::io::Write;

    const ROWS: [&str; 8] = [
        "39, State-gov, 77516, Bachelors, 13, Never-married, Adm-clerical, Not-in-family, White, Male, 2174, 0, 40, United-States, <=50K",
        "50, Self-emp-not-inc, 83311, Bachelors, 13, Married-civ-spouse, Exec-managerial, Husband, White, Male, 0, 0, 13, United-States, <=50K",
        "38, Private, 215646, HS-grad, 9, Divorced, Handlers-cleaners, Not-in-family, White, Male, 0, 0, 40, United-States, <=50K",
        "52, Self-emp-inc, 287927, HS-grad, 9, Married-civ-spouse, Exec-managerial, Wife, White, Female, 15024, 0, 40, United-States, >50K",
        "31, Private, 45781, Masters, 14, Never-married, Prof-specialty, Not-in-family, White, Female, 14084, 0, 50, United-States, >50K",
        "42, Private, 159449, Bachelors, 13, Married-civ-spouse, Exec-managerial, Husband, White, Male, 5178, 0, 40, United-States, >50K",
        "23, Private, 122272, Bachelors, 13, Never-married, Adm-clerical, Own-child, White, Female, 0, 0, 30, United-States, <=50K",
        "37, Private, 280464, Some-college, 10, Married-civ-spouse, Exec-managerial, Husband, Black, Male, 0, 0, 80, United-States, >50K.",
    ];

    fn write_csv(path: &Path) {
        let mut f = std::fs::File::create(path).unwrap();
        for _ in 0..4 {
            for row in ROWS {
                writeln!(f, "{row}").unwrap();
            }
        }
    }

    fn config(dir: &Path, approach: Approach) -> TrainConfig {
        let train_file = dir.join("train.csv");
        let eval_file  = dir.join("eval.csv");
        write_csv(&train_file);
        write_csv(&eval_file);
        TrainConfig {
            train_file,
            eval_file,
            model_dir: dir.join("model"),
            approach,
            hidden_units: vec![8, 4],
            batch_size: 8,
            train_steps: 12,
            save_checkpoints_steps: 5,
            eval_every_steps: 6,
            epochs: 2,
            keep_checkpoints: 2,
            validation_fraction: 0.25,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_estimator_run_writes_model_dir_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Approach::Estimator);
        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();

        assert_eq!(report.metrics.global_step, 12);
        for file in ["metadata.json", "feature_spec.json", "train_config.json", "checkpoint.json", "metrics.csv"] {
            assert!(cfg.model_dir.join(file).exists(), "{file} missing");
        }
        let manifest = read_manifest(&report.export_dir).unwrap();
        assert!(matches!(manifest.architecture, ModelArchitecture::Dnn(_)));
        assert_eq!(manifest.signature.global_step, 12);
    }

    #[test]
    fn test_keras_run_saves_model() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Approach::Keras);
        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();

        let keras_dir = cfg.model_dir.join(KERAS_MODEL_DIR);
        assert!(keras_dir.join("config.json").exists());
        assert!(keras_dir.join("feature_spec.json").exists());
        let manifest = read_manifest(&report.export_dir).unwrap();
        assert!(matches!(manifest.architecture, ModelArchitecture::Functional(_)));
    }

    #[test]
    fn test_resume_with_different_architecture_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), Approach::Estimator);
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        cfg.hidden_units = vec![16];
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_resume_with_different_normalization_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), Approach::Estimator);
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        cfg.normalize_numeric = false;
        let err = TrainUseCase::new(cfg.clone()).execute().unwrap_err();
        assert!(err.to_string().contains("normalize_numeric"));

        // nothing was overwritten by the rejected run
        let stored = MetadataStore::new(&cfg.model_dir).load_features().unwrap();
        assert!(stored.normalizes_numeric());
        let saved = CheckpointManager::new(&cfg.model_dir, 1).unwrap().load_config::<TrainConfig>().unwrap().unwrap();
        assert!(saved.normalize_numeric);
    }

    #[test]
    fn test_corrupt_model_dir_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Approach::Estimator);
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        std::fs::write(cfg.model_dir.join("train_config.json"), "{ not json").unwrap();
        assert!(TrainUseCase::new(cfg.clone()).execute().is_err());

        let other = tempfile::tempdir().unwrap();
        let cfg   = config(other.path(), Approach::Estimator);
        std::fs::create_dir_all(&cfg.model_dir).unwrap();
        std::fs::write(cfg.model_dir.join("feature_spec.json"), "[]").unwrap();
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_missing_train_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), Approach::Estimator);
        cfg.train_file = dir.path().join("nope.csv");
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }
}
