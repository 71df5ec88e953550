// ============================================================
// Layer 4 — CSV Loader
// ============================================================
// Loads census rows from the raw UCI files using the csv crate.
//
// Quirks of the raw files:
//   - No header row, records are deserialised by position
//   - Fields are separated by ", " (comma + space)
//   - adult.test starts with the line "|1x3 Cross validator"
//   - Both files end with one or more blank lines
//
// The csv crate handles all of these for us:
//   trim(Trim::All)    → strips the space after each comma
//   comment(Some(b'|'))→ skips the cross-validator line
//   blank lines        → skipped by the reader automatically
//
// The reader is flexible so that a short or long record surfaces
// as a field-count mismatch against CSV_COLUMNS instead of aborting
// the whole file. A bad record (wrong field count, unparsable
// number, unknown label) is logged and skipped.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use std::{fs::File, path::{Path, PathBuf}};

use crate::domain::census::{parse_label, CensusRow, CSV_COLUMNS};
use crate::domain::traits::RowSource;

/// Loads every valid row from one census CSV file.
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl RowSource for CsvLoader {
    fn load_all(&self) -> Result<Vec<CensusRow>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open '{}'", self.path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .comment(Some(b'|'))
            .flexible(true)
            .from_reader(file);

        let mut rows    = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping record {} in '{}': {}", line + 1, self.path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            if record.len() != CSV_COLUMNS.len() {
                tracing::warn!(
                    "Skipping record {} in '{}': expected {} fields, found {}",
                    line + 1,
                    self.path.display(),
                    CSV_COLUMNS.len(),
                    record.len()
                );
                skipped += 1;
                continue;
            }

            let row = match record.deserialize::<CensusRow>(None) {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping record {} in '{}': {}", line + 1, self.path.display(), e);
                    skipped += 1;
                    continue;
                }
            };

            // Reject rows whose label we cannot interpret
            if let Err(e) = parse_label(&row.income_bracket) {
                tracing::warn!("Skipping record {} in '{}': {}", line + 1, self.path.display(), e);
                skipped += 1;
                continue;
            }

            rows.push(row);
        }

        tracing::info!(
            "Loaded {} rows from '{}' ({} skipped)",
            rows.len(),
            self.path.display(),
            skipped
        );
        Ok(rows)
    }
}
