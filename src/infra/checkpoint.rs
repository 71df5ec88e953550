// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Owns the estimator's model directory.
//
// What gets saved:
//   1. Model weights per global step (.mpk.gz)
//   2. checkpoint.json  — latest step + every step still on disk
//   3. train_config.json — the run's configuration
//
// Retention:
//   Only the newest `keep_max` checkpoints are kept. Saving one
//   more deletes the oldest weights file, so a long run never
//   fills the disk.
//
// Resuming:
//   An estimator pointed at a directory that already holds
//   checkpoints restores the latest one and continues counting
//   global steps from there.
//
// File naming convention:
//   model_dir/
//     model_step_100.mpk.gz
//     model_step_200.mpk.gz
//     checkpoint.json
//     train_config.json
//
// CheckpointRecorder (named MessagePack + gzip, half precision):
//   - Small files, good enough to resume training from
//   - Type-safe: loading fails if the architecture doesn't match
//   - Exports use full precision instead (see export.rs)
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{ensure, Context, Result};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

const STATE_FILE:  &str = "checkpoint.json";
const CONFIG_FILE: &str = "train_config.json";
/// Extension the recorder appends to the weights path
const WEIGHTS_EXT: &str = "mpk.gz";

type CheckpointRecorder = NamedMpkGzFileRecorder<HalfPrecisionSettings>;

/// Contents of checkpoint.json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub latest: usize,
    /// Steps with weights still on disk, oldest first
    pub all:    Vec<usize>,
}

pub struct CheckpointManager {
    dir:      PathBuf,
    keep_max: usize,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>, keep_max: usize) -> Result<Self> {
        ensure!(keep_max > 0, "keep_checkpoint_max must be at least 1");
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model dir '{}'", dir.display()))?;
        Ok(Self { dir, keep_max })
    }

    fn weights_stem(&self, step: usize) -> PathBuf {
        self.dir.join(format!("model_step_{step}"))
    }

    /// Path of the weights file for `step` as it exists on disk
    pub fn weights_path(&self, step: usize) -> PathBuf {
        self.weights_stem(step).with_extension(WEIGHTS_EXT)
    }

    /// Save weights for `step`, update checkpoint.json, apply retention.
    pub fn save<B: Backend, M: Module<B>>(&self, model: &M, step: usize) -> Result<()> {
        let stem = self.weights_stem(step);
        CheckpointRecorder::new()
            .record(model.clone().into_record(), stem.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", stem.display()))?;

        let mut state = self.state()?.unwrap_or_default();
        state.all.retain(|&s| s != step);
        state.all.push(step);
        state.latest = step;

        while state.all.len() > self.keep_max {
            let oldest = state.all.remove(0);
            let path   = self.weights_path(oldest);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Cannot remove old checkpoint '{}': {}", path.display(), e);
            }
        }

        self.write_json(STATE_FILE, &state)?;
        tracing::debug!("Saved checkpoint for step {}", step);
        Ok(())
    }

    /// Restore the latest checkpoint into `model`.
    /// Returns None when the directory holds no checkpoint yet.
    pub fn restore<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        device: &B::Device,
    ) -> Result<Option<(M, usize)>> {
        let Some(step) = self.latest_step()? else {
            return Ok(None);
        };
        let stem = self.weights_stem(step);

        tracing::info!("Restoring checkpoint from step {}", step);
        let record = CheckpointRecorder::new()
            .load(stem.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", stem.display()))?;

        Ok(Some((model.load_record(record), step)))
    }

    pub fn latest_step(&self) -> Result<Option<usize>> {
        Ok(self.state()?.map(|s| s.latest))
    }

    pub fn state(&self) -> Result<Option<CheckpointState>> {
        self.read_json(STATE_FILE)
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        self.write_json(CONFIG_FILE, cfg)
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.read_json(CONFIG_FILE)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let value = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt '{}'", path.display()))?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, nn::{Linear, LinearConfig}};

    type B = NdArray;

    fn linear() -> Linear<B> {
        LinearConfig::new(3, 2).init(&Default::default())
    }

    #[test]
    fn test_empty_dir_has_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), 3).unwrap();
        assert_eq!(mgr.latest_step().unwrap(), None);
        assert!(mgr.restore::<B, _>(linear(), &Default::default()).unwrap().is_none());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::new(dir.path(), 0).is_err());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), 2).unwrap();
        let model = linear();

        for step in [10, 20, 30] {
            mgr.save::<B, _>(&model, step).unwrap();
        }

        let state = mgr.state().unwrap().unwrap();
        assert_eq!(state, CheckpointState { latest: 30, all: vec![20, 30] });
        assert!(!mgr.weights_path(10).exists());
        assert!(mgr.weights_path(20).exists());
        assert!(mgr.weights_path(30).exists());
    }

    #[test]
    fn test_restore_latest() {
        let dir    = tempfile::tempdir().unwrap();
        let mgr    = CheckpointManager::new(dir.path(), 5).unwrap();
        let device = Default::default();
        let saved  = linear();
        mgr.save::<B, _>(&saved, 42).unwrap();

        let (restored, step) = mgr.restore::<B, _>(linear(), &device).unwrap().unwrap();
        assert_eq!(step, 42);
        // half precision storage → compare with tolerance
        let a: Vec<f32> = saved.weight.val().into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.weight.val().into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-2);
        }
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = CheckpointManager::new(dir.path(), 1).unwrap();
        assert!(mgr.load_config::<Vec<usize>>().unwrap().is_none());
        mgr.save_config(&vec![64usize, 32]).unwrap();
        assert_eq!(mgr.load_config::<Vec<usize>>().unwrap(), Some(vec![64, 32]));
    }
}
