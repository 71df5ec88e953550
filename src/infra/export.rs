// ============================================================
// Layer 6 — Serving Export
// ============================================================
// Writes a self-contained directory that the `predict` and
// `evaluate` commands can serve without the training data:
//
//   export_base/
//     1718000000/                ← unix seconds at export time
//       model.mpk                ← full precision weights
//       architecture.json        ← which network + its config
//       feature_spec.json        ← feature columns + vocabularies
//       signature.json           ← input columns and output keys
//
// Each export gets a fresh numeric directory, so older exports
// stay servable and `latest_export` simply picks the largest.

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::data::features::{FeatureColumn, FeatureSpec};
use crate::ml::{functional::FunctionalModelConfig, model::CensusDnnConfig};

const WEIGHTS_FILE:      &str = "model";
const ARCHITECTURE_FILE: &str = "architecture.json";
const FEATURES_FILE:     &str = "feature_spec.json";
const SIGNATURE_FILE:    &str = "signature.json";

type ServingRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Which network the weights belong to, with everything needed to
/// rebuild it before loading the weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "config", rename_all = "snake_case")]
pub enum ModelArchitecture {
    Dnn(CensusDnnConfig),
    Functional(FunctionalModelConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInput {
    pub name:  String,
    pub dtype: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub inputs:      Vec<SignatureInput>,
    pub outputs:     Vec<String>,
    pub global_step: usize,
}

impl Signature {
    fn for_spec(spec: &FeatureSpec, global_step: usize) -> Self {
        let inputs = spec
            .columns
            .iter()
            .map(|c| SignatureInput {
                name:  c.key().to_string(),
                dtype: match c {
                    FeatureColumn::Numeric { .. }   => "float32".to_string(),
                    FeatureColumn::Embedding { .. } => "string".to_string(),
                },
            })
            .collect();
        let outputs = ["logits", "logistic", "probabilities", "class_ids"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self { inputs, outputs, global_step }
    }
}

/// Everything in an export directory except the weights.
#[derive(Debug, Clone)]
pub struct ExportManifest {
    pub dir:          PathBuf,
    pub architecture: ModelArchitecture,
    pub features:     FeatureSpec,
    pub signature:    Signature,
}

/// Write a new timestamped export under `export_base`.
pub fn export_saved_model<B: Backend, M: Module<B>>(
    export_base:  &Path,
    model:        &M,
    architecture: &ModelArchitecture,
    features:     &FeatureSpec,
    global_step:  usize,
) -> Result<PathBuf> {
    fs::create_dir_all(export_base)
        .with_context(|| format!("Cannot create '{}'", export_base.display()))?;

    let mut stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before 1970")?
        .as_secs();
    while export_base.join(stamp.to_string()).exists() {
        stamp += 1;
    }
    let dir = export_base.join(stamp.to_string());
    fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create '{}'", dir.display()))?;

    ServingRecorder::new()
        .record(model.clone().into_record(), dir.join(WEIGHTS_FILE))
        .with_context(|| format!("Cannot write weights to '{}'", dir.display()))?;

    write_json(&dir, ARCHITECTURE_FILE, architecture)?;
    write_json(&dir, FEATURES_FILE, features)?;
    write_json(&dir, SIGNATURE_FILE, &Signature::for_spec(features, global_step))?;

    tracing::info!("Exported model (step {}) to '{}'", global_step, dir.display());
    Ok(dir)
}

/// Read the JSON side of an export.
pub fn read_manifest(dir: &Path) -> Result<ExportManifest> {
    if !dir.is_dir() {
        bail!("Export directory '{}' does not exist", dir.display());
    }
    let features: FeatureSpec = read_json(dir, FEATURES_FILE)?;
    features.validate()?;
    Ok(ExportManifest {
        dir:          dir.to_path_buf(),
        architecture: read_json(dir, ARCHITECTURE_FILE)?,
        features,
        signature:    read_json(dir, SIGNATURE_FILE)?,
    })
}

/// Load exported weights into a freshly initialised model.
pub fn load_weights<B: Backend, M: Module<B>>(dir: &Path, model: M, device: &B::Device) -> Result<M> {
    let record = ServingRecorder::new()
        .load(dir.join(WEIGHTS_FILE), device)
        .with_context(|| format!("Cannot load weights from '{}'", dir.display()))?;
    Ok(model.load_record(record))
}

/// The newest export under `export_base` (largest numeric name).
pub fn latest_export(export_base: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(export_base)
        .with_context(|| format!("Cannot read '{}'", export_base.display()))?;

    let mut best: Option<(u64, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<u64>().ok());
        if let (Some(stamp), true) = (stamp, path.is_dir()) {
            if best.as_ref().map_or(true, |(b, _)| stamp > *b) {
                best = Some((stamp, path));
            }
        }
    }

    best.map(|(_, p)| p)
        .with_context(|| format!("No exports found under '{}'", export_base.display()))
}

/// Accept either one export directory or an export base holding several.
pub fn resolve_export(path: &Path) -> Result<PathBuf> {
    if path.join(ARCHITECTURE_FILE).is_file() {
        Ok(path.to_path_buf())
    } else {
        latest_export(path)
    }
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))
}

fn read_json<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid JSON in '{}'", path.display()))
}
