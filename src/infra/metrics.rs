// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row every time the estimator evaluates during
// train_and_evaluate.
//
// Metrics recorded per evaluation:
//   - step:       global step the evaluation ran at
//   - train_loss: mean weighted loss over the steps since the
//                 previous evaluation
//   - eval_loss:  weighted average loss on the evaluation set
//   - accuracy:   weighted accuracy on the evaluation set
//   - auc:        ROC AUC on the evaluation set
//
// Output file: <model_dir>/metrics.csv
//
// Example CSV output:
//   step,train_loss,eval_loss,accuracy,auc
//   200,0.412300,0.398100,0.812000,0.861000
//   400,0.361200,0.355400,0.834000,0.889000
//
// How to read the metrics:
//   - If eval_loss rises while train_loss keeps falling → overfitting
//   - accuracy should beat accuracy_baseline (≈0.76 on this data),
//     otherwise the model learnt nothing beyond the class prior

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::evaluation::EvalMetrics;

const HEADER: &str = "step,train_loss,eval_loss,accuracy,auc";

/// One row of the metrics CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub step:       usize,
    pub train_loss: f64,
    pub eval_loss:  f64,
    pub accuracy:   f64,
    pub auc:        f64,
}

impl EvalRecord {
    pub fn new(train_loss: f64, metrics: &EvalMetrics) -> Self {
        Self {
            step:      metrics.global_step,
            train_loss,
            eval_loss: metrics.average_loss,
            accuracy:  metrics.accuracy,
            auc:       metrics.auc,
        }
    }

    /// True if this evaluation beat the best eval loss seen so far
    pub fn is_improvement(&self, best_eval_loss: f64) -> bool {
        self.eval_loss < best_eval_loss
    }
}

/// Appends evaluation rows to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger; writes the header only when the file is new,
    /// so a resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, r: &EvalRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            r.step, r.train_loss, r.eval_loss, r.accuracy, r.auc,
        )?;

        tracing::debug!(
            "Logged step {} metrics: train_loss={:.4}, eval_loss={:.4}",
            r.step, r.train_loss, r.eval_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
