// ============================================================
// Layer 6 — Metadata Store
// ============================================================
// Persists the training-split metadata and the feature spec
// built from it.
//
// A model directory that already holds metadata.json reuses it
// instead of recomputing. A resumed estimator needs the exact
// vocabulary its embedding tables were sized for.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::data::{features::FeatureSpec, metadata::DatasetMetadata};
use crate::domain::census::CensusRow;

const METADATA_FILE: &str = "metadata.json";
const FEATURES_FILE: &str = "feature_spec.json";

pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Load existing metadata or compute it from the training rows
    pub fn load_or_compute(&self, train_rows: &[CensusRow]) -> Result<DatasetMetadata> {
        if self.dir.join(METADATA_FILE).exists() {
            tracing::info!("Reusing metadata from '{}'", self.dir.display());
            return self.load_metadata();
        }

        let metadata = DatasetMetadata::compute(train_rows);
        self.save_metadata(&metadata)?;
        tracing::info!(
            "Computed metadata from {} training rows, saved to '{}'",
            metadata.row_count,
            self.dir.display()
        );
        Ok(metadata)
    }

    pub fn load_metadata(&self) -> Result<DatasetMetadata> {
        self.read(METADATA_FILE)
    }

    pub fn save_metadata(&self, metadata: &DatasetMetadata) -> Result<()> {
        self.write(METADATA_FILE, metadata)
    }

    pub fn has_features(&self) -> bool {
        self.dir.join(FEATURES_FILE).exists()
    }

    pub fn load_features(&self) -> Result<FeatureSpec> {
        self.read(FEATURES_FILE)
    }

    pub fn save_features(&self, spec: &FeatureSpec) -> Result<()> {
        self.write(FEATURES_FILE, spec)
    }

    fn write<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    fn read<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))
    }
}
