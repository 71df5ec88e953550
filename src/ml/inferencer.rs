// ============================================================
// Layer 5 — Inferencer (serving an export)
// ============================================================
// Loads an export directory written by infra::export and answers
// requests with it. Nothing from training is needed: the export
// carries the architecture, the weights, and the feature spec
// (vocabularies + normalisers), so raw JSON instances can be
// encoded exactly the way the training rows were.
//
//   JSON instance ─► FeatureTransformer ─► CensusBatcher
//                ─► LogitModel ─► Prediction
//
// Reference: Burn Book §5 (Records and inference)

use anyhow::{bail, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::path::Path;

use crate::data::{
    batcher::CensusBatcher,
    dataset::{CensusDataset, CensusExample},
    features::FeatureTransformer,
};
use crate::domain::census::CensusRow;
use crate::domain::traits::{FeatureSource, Scorer, ServingInstance};
use crate::infra::export::{load_weights, read_manifest, ExportManifest, ModelArchitecture};
use crate::ml::evaluation::{evaluate_model, EvalMetrics, Prediction};
use crate::ml::input_layer::DenseFeaturesConfig;
use crate::ml::model::LogitModel;
use crate::ml::InferBackend;

const EVAL_BATCH_SIZE: usize = 256;

pub struct Predictor {
    model:       Box<dyn LogitModel<InferBackend>>,
    transformer: FeatureTransformer,
    manifest:    ExportManifest,
    device:      <InferBackend as Backend>::Device,
}

impl Predictor {
    pub fn from_export(dir: &Path) -> Result<Self> {
        let device   = <InferBackend as Backend>::Device::default();
        let manifest = read_manifest(dir)?;

        let model: Box<dyn LogitModel<InferBackend>> = match &manifest.architecture {
            ModelArchitecture::Dnn(cfg) => {
                check_input_layer(&cfg.features, &manifest.features.input_layer_config())?;
                Box::new(load_weights(&manifest.dir, cfg.init::<InferBackend>(&device), &device)?)
            }
            ModelArchitecture::Functional(cfg) => {
                cfg.validate()?;
                check_input_layer(&cfg.features, &manifest.features.input_layer_config())?;
                Box::new(load_weights(&manifest.dir, cfg.init::<InferBackend>(&device), &device)?)
            }
        };

        tracing::info!(
            "Loaded export '{}' (step {})",
            manifest.dir.display(),
            manifest.signature.global_step
        );

        let transformer = FeatureTransformer::new(&manifest.features);
        Ok(Self { model, transformer, manifest, device })
    }

    pub fn global_step(&self) -> usize {
        self.manifest.signature.global_step
    }

    pub fn predict_instances(&self, instances: &[ServingInstance]) -> Result<Vec<Prediction>> {
        let sources: Vec<&dyn FeatureSource> = instances.iter().map(|i| i as &dyn FeatureSource).collect();
        self.score(&sources)
    }

    /// Evaluate the export on labelled rows.
    pub fn evaluate_rows(&self, rows: &[CensusRow]) -> Result<EvalMetrics> {
        let dataset = CensusDataset::from_rows(rows, &self.transformer)?;
        evaluate_model::<InferBackend, _>(
            self.model.as_ref(),
            dataset,
            EVAL_BATCH_SIZE,
            self.global_step(),
            &self.device,
        )
    }
}

impl Scorer for Predictor {
    fn score(&self, inputs: &[&dyn FeatureSource]) -> Result<Vec<Prediction>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let examples = inputs
            .iter()
            .map(|source| {
                let encoded = self.transformer.encode(*source)?;
                Ok(CensusExample {
                    numeric:     encoded.numeric,
                    categorical: encoded.categorical,
                    label:       0.0,
                    weight:      1.0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let batch  = CensusBatcher::<InferBackend>::new(self.device.clone()).batch(examples);
        let logits = self.model.logits(batch.numeric, batch.categorical);
        let values = logits
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read logits: {e:?}"))?;

        Ok(values.into_iter().map(Prediction::from_logit).collect())
    }
}

/// The stored architecture must have been built for the stored feature spec.
fn check_input_layer(model: &DenseFeaturesConfig, features: &DenseFeaturesConfig) -> Result<()> {
    if model.numeric_dim != features.numeric_dim || model.embeddings != features.embeddings {
        bail!(
            "export is inconsistent: model expects {} numeric / {} categorical inputs, feature spec provides {} / {}",
            model.numeric_dim,
            model.embeddings.len(),
            features.numeric_dim,
            features.embeddings.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{features::FeatureSpec, metadata::DatasetMetadata};
    use crate::domain::census::sample_row;
    use crate::infra::export::export_saved_model;
    use crate::ml::evaluation::predict_model;
    use crate::ml::functional::FunctionalModelConfig;
    use crate::ml::model::CensusDnnConfig;

    fn rows() -> Vec<CensusRow> {
        vec![
            sample_row(25.0, "Private", "<=50K"),
            sample_row(52.0, "Self-emp-inc", ">50K"),
            sample_row(38.0, "State-gov", "<=50K"),
            sample_row(61.0, "Private", ">50K"),
        ]
    }

    fn spec() -> FeatureSpec {
        FeatureSpec::from_metadata(&DatasetMetadata::compute(&rows()), true).unwrap()
    }

    #[test]
    fn test_export_matches_in_memory_model() {
        let base   = tempfile::tempdir().unwrap();
        let device = Default::default();
        let spec   = spec();
        let cfg    = CensusDnnConfig::new(spec.input_layer_config(), vec![6, 3]);
        let model  = cfg.init::<InferBackend>(&device);

        let dir = export_saved_model::<InferBackend, _>(
            base.path(), &model, &ModelArchitecture::Dnn(cfg), &spec, 7,
        ).unwrap();
        let predictor = Predictor::from_export(&dir).unwrap();
        assert_eq!(predictor.global_step(), 7);

        let dataset  = CensusDataset::from_rows(&rows(), &FeatureTransformer::new(&spec)).unwrap();
        let expected = predict_model::<InferBackend, _>(&model, dataset, 2, &device).unwrap();

        let owned  = rows();
        let inputs: Vec<&dyn FeatureSource> = owned.iter().map(|r| r as &dyn FeatureSource).collect();
        let actual = predictor.score(&inputs).unwrap();

        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(&expected) {
            assert!((a.logistic - e.logistic).abs() < 1e-6);
            assert_eq!(a.class_ids, e.class_ids);
        }
    }

    #[test]
    fn test_json_instances_and_unseen_category() {
        let base  = tempfile::tempdir().unwrap();
        let spec  = spec();
        let cfg   = FunctionalModelConfig::census_default(spec.input_layer_config(), &[4], 0.0);
        let model = cfg.init::<InferBackend>(&Default::default());
        let dir   = export_saved_model::<InferBackend, _>(
            base.path(), &model, &ModelArchitecture::Functional(cfg), &spec, 0,
        ).unwrap();
        let predictor = Predictor::from_export(&dir).unwrap();

        let instance: ServingInstance = serde_json::from_str(
            r#"{"age": 40, "education_num": "13", "capital_gain": 0, "capital_loss": 0,
                "hours_per_week": 45, "workclass": "Never-seen", "education": "Bachelors"}"#,
        ).unwrap();
        let preds = predictor.predict_instances(&[instance]).unwrap();
        assert_eq!(preds.len(), 1);
        assert!((preds[0].probabilities[0] + preds[0].probabilities[1] - 1.0).abs() < 1e-6);

        // a missing numeric column cannot be served
        let partial: ServingInstance = serde_json::from_str(r#"{"age": 40}"#).unwrap();
        assert!(predictor.predict_instances(&[partial]).is_err());
        assert!(predictor.predict_instances(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_evaluate_rows_reports_step() {
        let base  = tempfile::tempdir().unwrap();
        let spec  = spec();
        let cfg   = CensusDnnConfig::new(spec.input_layer_config(), vec![4]);
        let model = cfg.init::<InferBackend>(&Default::default());
        let dir   = export_saved_model::<InferBackend, _>(
            base.path(), &model, &ModelArchitecture::Dnn(cfg), &spec, 3,
        ).unwrap();

        let metrics = Predictor::from_export(&dir).unwrap().evaluate_rows(&rows()).unwrap();
        assert_eq!(metrics.global_step, 3);
        assert!((metrics.label_mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_architecture_rejected() {
        let base  = tempfile::tempdir().unwrap();
        let spec  = spec();
        let other = DenseFeaturesConfig::new(1, vec![]);
        let cfg   = CensusDnnConfig::new(other, vec![4]);
        let model = cfg.init::<InferBackend>(&Default::default());
        let dir   = export_saved_model::<InferBackend, _>(
            base.path(), &model, &ModelArchitecture::Dnn(cfg), &spec, 0,
        ).unwrap();
        assert!(Predictor::from_export(&dir).is_err());
    }
}
