// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the model directory or the export
// directory on disk:
//
//   checkpoint.rs     — per-step weights, checkpoint.json with
//                       retention, train_config.json
//
//   export.rs         — timestamped serving exports (weights,
//                       architecture, feature spec, signature)
//
//   metadata_store.rs — metadata.json and feature_spec.json, so a
//                       resumed run keeps the same vocabulary
//
//   metrics.rs        — metrics.csv, one row per evaluation
//
// Reference: Burn Book §5 (Checkpointing)
//            Rust Book §9 (Error Handling with anyhow)

/// Estimator checkpoints and retention
pub mod checkpoint;

/// Serving export and its manifest
pub mod export;

/// Dataset metadata and feature spec persistence
pub mod metadata_store;

/// Evaluation metrics CSV logger
pub mod metrics;
