// ============================================================
// Layer 2 — ServeUseCase
// ============================================================
// Uses an export directory without any training state:
//
//   predict  — JSON lines in, one Prediction per line out
//   evaluate — labelled CSV in, EvalMetrics out
//
// `export` may point at one export or at an export base, in
// which case the newest export is used.

use anyhow::{Context, Result};
use std::path::Path;

use crate::data::loader::CsvLoader;
use crate::domain::traits::{RowSource, ServingInstance};
use crate::infra::export::resolve_export;
use crate::ml::{
    evaluation::{EvalMetrics, Prediction},
    inferencer::Predictor,
};

pub struct ServeUseCase {
    predictor: Predictor,
}

impl ServeUseCase {
    pub fn new(export: &Path) -> Result<Self> {
        let dir = resolve_export(export)?;
        Ok(Self { predictor: Predictor::from_export(&dir)? })
    }

    /// Score a JSON-lines file. Blank lines are ignored.
    pub fn predict_file(&self, instances: &Path) -> Result<Vec<Prediction>> {
        let text = std::fs::read_to_string(instances)
            .with_context(|| format!("Cannot read '{}'", instances.display()))?;
        self.predict_lines(&text)
    }

    pub fn predict_lines(&self, text: &str) -> Result<Vec<Prediction>> {
        let instances = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<ServingInstance>(line)
                    .with_context(|| format!("Line {} is not a JSON object", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Scoring {} instances", instances.len());
        self.predictor.predict_instances(&instances)
    }

    pub fn evaluate_file(&self, eval_file: &Path) -> Result<EvalMetrics> {
        let rows = CsvLoader::new(eval_file).load_all()?;
        self.predictor.evaluate_rows(&rows)
    }
}
