// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Five subcommands: download, train, convert, evaluate, predict.
// Args are converted into application configs at this boundary;
// the application layer never sees clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    convert_use_case::ConvertConfig,
    train_use_case::{Approach, TrainConfig},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the census train/test CSV files
    Download(DownloadArgs),

    /// Train a model and export it for serving
    Train(TrainArgs),

    /// Convert a saved keras-style model into an estimator and keep training
    Convert(ConvertArgs),

    /// Evaluate an exported model on a labelled CSV file
    Evaluate(EvaluateArgs),

    /// Score JSON-lines instances with an exported model
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ApproachArg {
    /// Hand-written model function driven by the estimator
    Estimator,
    /// Declarative layer graph trained with the fit loop
    Keras,
}

impl From<ApproachArg> for Approach {
    fn from(a: ApproachArg) -> Self {
        match a {
            ApproachArg::Estimator => Approach::Estimator,
            ApproachArg::Keras     => Approach::Keras,
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, value_enum, default_value_t = ApproachArg::Estimator)]
    pub approach: ApproachArg,

    #[arg(long, default_value = "data/adult.data.csv")]
    pub train_file: PathBuf,

    #[arg(long, default_value = "data/adult.test.csv")]
    pub eval_file: PathBuf,

    /// Checkpoints, metadata, metrics and exports go here
    #[arg(long, default_value = "models/census")]
    pub model_dir: PathBuf,

    /// Hidden layer widths, comma separated
    #[arg(long, value_delimiter = ',', default_value = "100,75,50,25")]
    pub hidden_units: Vec<usize>,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 40)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Estimator: global step to train up to
    #[arg(long, default_value_t = 2000)]
    pub train_steps: usize,

    #[arg(long, default_value_t = 200)]
    pub save_checkpoints_steps: usize,

    #[arg(long, default_value_t = 400)]
    pub eval_every_steps: usize,

    /// Keras: maximum number of epochs
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Keras: epochs without validation-loss improvement before stopping
    #[arg(long, default_value_t = 2)]
    pub patience: usize,

    /// Keras: share of the training file held out for validation
    #[arg(long, default_value_t = 0.1)]
    pub validation_fraction: f64,

    #[arg(long, default_value_t = 5)]
    pub keep_checkpoints: usize,

    /// Feed numeric columns raw instead of z-scored
    #[arg(long)]
    pub no_normalize: bool,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_file:             a.train_file,
            eval_file:              a.eval_file,
            model_dir:              a.model_dir,
            approach:               a.approach.into(),
            hidden_units:           a.hidden_units,
            dropout:                a.dropout,
            batch_size:             a.batch_size,
            learning_rate:          a.learning_rate,
            train_steps:            a.train_steps,
            save_checkpoints_steps: a.save_checkpoints_steps,
            eval_every_steps:       a.eval_every_steps,
            epochs:                 a.epochs,
            patience:               a.patience,
            validation_fraction:    a.validation_fraction,
            keep_checkpoints:       a.keep_checkpoints,
            normalize_numeric:      !a.no_normalize,
            seed:                   a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory written by `train --approach keras` (its keras_model/)
    #[arg(long)]
    pub keras_model: PathBuf,

    /// Fresh estimator model directory
    #[arg(long)]
    pub model_dir: PathBuf,

    #[arg(long, default_value = "data/adult.data.csv")]
    pub train_file: PathBuf,

    #[arg(long, default_value = "data/adult.test.csv")]
    pub eval_file: PathBuf,

    /// Global step to train the converted estimator up to (0 = evaluate only)
    #[arg(long, default_value_t = 500)]
    pub steps: usize,

    #[arg(long, default_value_t = 40)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 100)]
    pub save_checkpoints_steps: usize,

    #[arg(long, default_value_t = 250)]
    pub eval_every_steps: usize,

    #[arg(long, default_value_t = 5)]
    pub keep_checkpoints: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<ConvertArgs> for ConvertConfig {
    fn from(a: ConvertArgs) -> Self {
        ConvertConfig {
            keras_model:            a.keras_model,
            model_dir:              a.model_dir,
            train_file:             a.train_file,
            eval_file:              a.eval_file,
            steps:                  a.steps,
            batch_size:             a.batch_size,
            learning_rate:          a.learning_rate,
            save_checkpoints_steps: a.save_checkpoints_steps,
            eval_every_steps:       a.eval_every_steps,
            keep_checkpoints:       a.keep_checkpoints,
            seed:                   a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// One export directory, or an export base (newest export is used)
    #[arg(long)]
    pub export_dir: PathBuf,

    #[arg(long, default_value = "data/adult.test.csv")]
    pub eval_file: PathBuf,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// One export directory, or an export base (newest export is used)
    #[arg(long)]
    pub export_dir: PathBuf,

    /// JSON lines, one object per instance
    #[arg(long)]
    pub instances: PathBuf,
}
