// ============================================================
// Layer 4 — Dataset Download
// ============================================================
// Fetches the raw Census Income files from the UCI repository.
//
//   adult.data → <data_dir>/adult.data.csv   (training split)
//   adult.test → <data_dir>/adult.test.csv   (evaluation split)
//
// Files that already exist are left alone so repeated runs
// work offline.

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

const BASE_URL: &str = "https://archive.ics.uci.edu/ml/machine-learning-databases/adult";

/// (remote name, local name)
const FILES: [(&str, &str); 2] = [
    ("adult.data", TRAIN_FILE_NAME),
    ("adult.test", EVAL_FILE_NAME),
];

pub const TRAIN_FILE_NAME: &str = "adult.data.csv";
pub const EVAL_FILE_NAME:  &str = "adult.test.csv";

/// Download both splits into `data_dir`, returning (train, eval) paths.
pub fn download_dataset(data_dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
    let data_dir = data_dir.as_ref();
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Cannot create '{}'", data_dir.display()))?;

    let client = reqwest::blocking::Client::new();

    for (remote, local) in FILES {
        let target = data_dir.join(local);
        if target.exists() {
            tracing::info!("'{}' already present, skipping download", target.display());
            continue;
        }

        let url = format!("{BASE_URL}/{remote}");
        tracing::info!("Downloading {}", url);

        let response = client.get(&url).send()
            .with_context(|| format!("Request to {url} failed"))?;
        if !response.status().is_success() {
            bail!("Download of {url} failed with status {}", response.status());
        }

        let bytes = response.bytes()
            .with_context(|| format!("Cannot read body of {url}"))?;
        fs::write(&target, &bytes)
            .with_context(|| format!("Cannot write '{}'", target.display()))?;

        tracing::info!("Saved {} bytes to '{}'", bytes.len(), target.display());
    }

    Ok((data_dir.join(TRAIN_FILE_NAME), data_dir.join(EVAL_FILE_NAME)))
}
