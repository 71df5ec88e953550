// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Randomly shuffles samples and splits them into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to measure performance on unseen data
//
// Why do we need a validation set?
//   The fit loop watches validation loss to decide when to
//   stop early. Validation rows must never be trained on,
//   and must come from the training file. The evaluation
//   file is kept for the final report only.
//
// Split ratio: configurable (default 90% / 10%)
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom
// with a seeded StdRng, so the same seed always produces the
// same validation split (early stopping depends on it).
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Randomly shuffle `samples` and split into (train, validation).
///
/// # Arguments
/// * `samples`        - All available samples (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.8 = 80%
/// * `seed`           - Shuffle seed
///
/// # Returns
/// A tuple (train_samples, val_samples)
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let fraction = train_fraction.clamp(0.0, 1.0);
    let split_at = (((total as f64) * fraction).round() as usize).min(total);

    // samples keeps [0..split_at], val takes the rest
    let val = samples.split_off(split_at);

    tracing::debug!(
        "Split {} rows into {} train / {} validation (seed {})",
        total,
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
