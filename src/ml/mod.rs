// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, trains or runs a Burn module.
//
//   input_layer.rs — dense features: numeric passthrough +
//                    one embedding table per categorical column
//
//   model.rs       — the hand-written model function (CensusDnn),
//                    the LogitModel trait both model styles share,
//                    and the weighted logistic loss
//
//   functional.rs  — the declarative layer graph (FunctionalModel)
//                    with JSON config, save and load
//
//   fit.rs         — epoch-based fit loop on burn-train's Learner
//                    (metrics, checkpoint retention, early stopping)
//
//   estimator.rs   — step-based train / evaluate / predict driver
//                    that owns a model directory, plus conversion
//                    from a fitted FunctionalModel
//
//   evaluation.rs  — prediction head and binary metrics (AUC, ...)
//
//   inferencer.rs  — serves an exported model
//
// Everything runs on the NdArray CPU backend.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Autodiff backend used for every training loop
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// Plain backend for evaluation and serving
pub type InferBackend = burn::backend::NdArray;

pub mod input_layer;

/// Hand-written DNN, LogitModel trait, loss
pub mod model;

/// Declarative layer graph
pub mod functional;

/// Learner-based fit loop for the layer graph
pub mod fit;

/// Step-based training driver and model conversion
pub mod estimator;

pub mod evaluation;

/// Serving an export directory
pub mod inferencer;
