// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// train a model, convert a layer graph into an estimator, or
// serve an export.
//
// Rules for this layer:
//   - No model code or tensor maths here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Full training run, estimator or keras style
pub mod train_use_case;

// Layer graph → estimator conversion
pub mod convert_use_case;

// Predict / evaluate with an export
pub mod serve_use_case;
