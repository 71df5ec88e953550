// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers:
//
//   RowSource     — where raw census rows come from
//                   (CSV files today)
//   FeatureSource — what a feature column reads values from
//                   (a training row, or a JSON serving instance)
//   Scorer        — anything that turns inputs into predictions
//                   (the exported-model Predictor)
//
// Programming against these lets the feature transformer run
// unchanged at training time and at serving time, which is
// what keeps the vocabulary consistent between the two.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::collections::HashMap;

use crate::domain::census::CensusRow;
use crate::ml::evaluation::Prediction;

// ─── RowSource ────────────────────────────────────────────────────────────────
/// Any component that can load census rows.
pub trait RowSource {
    fn load_all(&self) -> Result<Vec<CensusRow>>;
}

// ─── FeatureSource ────────────────────────────────────────────────────────────
/// Something a feature column can read a named value from.
///
/// Returning None means "column absent": numeric columns treat that
/// as an error, categorical columns as out-of-vocabulary.
pub trait FeatureSource {
    fn numeric_value(&self, name: &str) -> Option<f32>;
    fn categorical_value(&self, name: &str) -> Option<String>;
}

impl FeatureSource for CensusRow {
    fn numeric_value(&self, name: &str) -> Option<f32> {
        self.numeric(name)
    }

    fn categorical_value(&self, name: &str) -> Option<String> {
        self.categorical(name).map(str::to_string)
    }
}

/// A serving request instance: one JSON object per example,
/// e.g. `{"age": 25, "workclass": "Private", ...}`.
pub type ServingInstance = HashMap<String, serde_json::Value>;

impl FeatureSource for ServingInstance {
    fn numeric_value(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            serde_json::Value::Number(n) => n.as_f64().map(|v| v as f32),
            // Numbers quoted as strings are common in hand-written requests
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn categorical_value(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Null      => None,
            other                        => Some(other.to_string()),
        }
    }
}

// ─── Scorer ───────────────────────────────────────────────────────────────────
/// Any component that can score a batch of inputs.
pub trait Scorer {
    fn score(&self, inputs: &[&dyn FeatureSource]) -> Result<Vec<Prediction>>;
}
