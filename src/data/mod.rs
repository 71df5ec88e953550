// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the UCI census files to tensor batches:
//
//   adult.data / adult.test  (download)
//       │
//       ▼
//   CsvLoader          → CensusRow per line, bad lines skipped
//       │
//       ▼
//   DatasetMetadata    → vocabularies + numeric stats, training split only
//       │
//       ▼
//   FeatureSpec        → one feature column per input column
//   FeatureTransformer → encodes a row (or a JSON instance)
//       │
//       ▼
//   CensusDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   CensusBatcher      → stacks examples into tensor batches
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Fetches the census CSV files
pub mod download;

/// Reads census rows from CSV with the csv crate
pub mod loader;

/// Vocabulary and numeric statistics of the training split
pub mod metadata;

/// Feature columns and the transformer that applies them
pub mod features;

/// Implements Burn's Dataset trait for encoded examples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded shuffle and train/validation split
pub mod splitter;
