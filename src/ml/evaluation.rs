// ============================================================
// Layer 5 — Evaluation Metrics and Prediction Head
// ============================================================
// The binary classification head shared by both model styles:
//
//   logit → sigmoid → logistic (P(income > 50K))
//         → probabilities [1 - p, p]
//         → class_ids (p > 0.5)
//
// Metrics reported after evaluation (all weighted by fnlwgt):
//   accuracy          — weighted fraction predicted correctly
//   accuracy_baseline — accuracy of always guessing the majority class
//   auc               — area under the ROC curve
//   precision, recall — for the positive class at threshold 0.5
//   average_loss      — weighted mean sigmoid cross entropy
//   label_mean        — weighted positive rate in the labels
//   prediction_mean   — weighted mean predicted probability
//
// Metric maths runs on plain Vec<f32> so it is testable without
// building a model.

use anyhow::{anyhow, bail, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::CensusBatcher, dataset::CensusDataset};
use crate::ml::model::LogitModel;

/// Serving output for one example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub logits:        f32,
    pub logistic:      f32,
    pub probabilities: [f32; 2],
    pub class_ids:     u8,
}

impl Prediction {
    pub fn from_logit(logit: f32) -> Self {
        let p = sigmoid(logit);
        Self {
            logits:        logit,
            logistic:      p,
            probabilities: [1.0 - p, p],
            class_ids:     u8::from(p > 0.5),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy:          f64,
    pub accuracy_baseline: f64,
    pub auc:               f64,
    pub precision:         f64,
    pub recall:            f64,
    pub average_loss:      f64,
    pub label_mean:        f64,
    pub prediction_mean:   f64,
    pub global_step:       usize,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

/// Compute every head metric from raw logits, labels and weights.
pub fn compute_metrics(logits: &[f32], labels: &[f32], weights: &[f32], global_step: usize) -> EvalMetrics {
    let total_weight: f64 = weights.iter().map(|&w| f64::from(w)).sum();
    if logits.is_empty() || total_weight <= 0.0 {
        return EvalMetrics { global_step, ..Default::default() };
    }

    let mut loss      = 0.0;
    let mut correct   = 0.0;
    let mut positives = 0.0;
    let mut pred_sum  = 0.0;
    let mut true_pos  = 0.0;
    let mut pred_pos  = 0.0;

    for ((&x, &y), &w) in logits.iter().zip(labels).zip(weights) {
        let (x, y, w) = (f64::from(x), f64::from(y), f64::from(w));
        let p         = 1.0 / (1.0 + (-x).exp());
        let predicted = if x > 0.0 { 1.0 } else { 0.0 };

        loss      += w * (x.max(0.0) - x * y + (-x.abs()).exp().ln_1p());
        correct   += w * f64::from(u8::from(predicted == y));
        positives += w * y;
        pred_sum  += w * p;
        pred_pos  += w * predicted;
        true_pos  += w * predicted * y;
    }

    let label_mean = positives / total_weight;
    EvalMetrics {
        accuracy:          correct / total_weight,
        accuracy_baseline: label_mean.max(1.0 - label_mean),
        auc:               roc_auc(logits, labels, weights),
        precision:         ratio(true_pos, pred_pos),
        recall:            ratio(true_pos, positives),
        average_loss:      loss / total_weight,
        label_mean,
        prediction_mean:   pred_sum / total_weight,
        global_step,
    }
}

/// Weighted ROC AUC. Scores are ranked descending; tied scores move
/// the curve diagonally (trapezoid rule). Returns 0.0 when only one
/// class is present, since the curve is undefined there.
pub fn roc_auc(scores: &[f32], labels: &[f32], weights: &[f32]) -> f64 {
    let mut ranked: Vec<(f32, f64, f64)> = scores
        .iter()
        .zip(labels)
        .zip(weights)
        .map(|((&s, &y), &w)| (s, f64::from(w) * f64::from(y), f64::from(w) * (1.0 - f64::from(y))))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let total_pos: f64 = ranked.iter().map(|r| r.1).sum();
    let total_neg: f64 = ranked.iter().map(|r| r.2).sum();
    if total_pos <= 0.0 || total_neg <= 0.0 {
        return 0.0;
    }

    let (mut tp, mut fp, mut area) = (0.0, 0.0, 0.0);
    let mut i = 0;
    while i < ranked.len() {
        let (prev_tp, prev_fp) = (tp, fp);
        let score = ranked[i].0;
        while i < ranked.len() && ranked[i].0 == score {
            tp += ranked[i].1;
            fp += ranked[i].2;
            i += 1;
        }
        area += (fp - prev_fp) * (tp + prev_tp) / 2.0;
    }
    area / (total_pos * total_neg)
}

/// Run `model` over `dataset` and return (logits, labels, weights).
fn collect_logits<B: Backend, M: LogitModel<B> + ?Sized>(
    model:      &M,
    dataset:    CensusDataset,
    batch_size: usize,
    device:     &B::Device,
) -> Result<(Vec<f32>, Vec<f32>, Vec<f32>)> {
    let loader = DataLoaderBuilder::new(CensusBatcher::<B>::new(device.clone()))
        .batch_size(batch_size.max(1))
        .num_workers(1)
        .build(dataset);

    let (mut logits, mut labels, mut weights) = (Vec::new(), Vec::new(), Vec::new());
    for batch in loader.iter() {
        let out = model.logits(batch.numeric, batch.categorical);
        logits.extend(to_vec(out)?);
        labels.extend(to_vec(batch.labels)?);
        weights.extend(to_vec(batch.weights)?);
    }
    Ok((logits, labels, weights))
}

fn to_vec<B: Backend>(t: Tensor<B, 2>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

/// Evaluate a model on a labelled dataset.
pub fn evaluate_model<B: Backend, M: LogitModel<B> + ?Sized>(
    model:       &M,
    dataset:     CensusDataset,
    batch_size:  usize,
    global_step: usize,
    device:      &B::Device,
) -> Result<EvalMetrics> {
    if dataset.sample_count() == 0 {
        bail!("evaluation dataset is empty");
    }
    let (logits, labels, weights) = collect_logits(model, dataset, batch_size, device)?;
    Ok(compute_metrics(&logits, &labels, &weights, global_step))
}

/// Predict every example of a dataset, in order.
pub fn predict_model<B: Backend, M: LogitModel<B> + ?Sized>(
    model:      &M,
    dataset:    CensusDataset,
    batch_size: usize,
    device:     &B::Device,
) -> Result<Vec<Prediction>> {
    let (logits, _, _) = collect_logits(model, dataset, batch_size, device)?;
    Ok(logits.into_iter().map(Prediction::from_logit).collect())
}
