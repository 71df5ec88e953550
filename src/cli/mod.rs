// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, hands off to Layer 2, and prints the results.
//
//   download  — fetch adult.data / adult.test
//   train     — estimator or keras-style training + export
//   convert   — keras-style model → estimator
//   evaluate  — metrics of an export on a labelled file
//   predict   — JSON-lines scoring with an export
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConvertArgs, DownloadArgs, EvaluateArgs, PredictArgs, TrainArgs};

use crate::ml::evaluation::EvalMetrics;

#[derive(Parser, Debug)]
#[command(
    name = "census-income",
    version = "0.1.0",
    about = "Train, convert and serve an income classifier on the UCI Census Income data."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the matching use case. No computation happens here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Download(args) => run_download(args),
            Commands::Train(args)    => run_train(args),
            Commands::Convert(args)  => run_convert(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_download(args: DownloadArgs) -> Result<()> {
    let (train, eval) = crate::data::download::download_dataset(&args.data_dir)?;
    println!("Training data: {}", train.display());
    println!("Eval data:     {}", eval.display());
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training ({:?}) into '{}'", args.approach, args.model_dir.display());
    let report = TrainUseCase::new(args.into()).execute()?;

    print_metrics(&report.metrics);
    println!("Model exported to {}", report.export_dir.display());
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    use crate::application::convert_use_case::ConvertUseCase;

    let report = ConvertUseCase::new(args.into()).execute()?;
    println!("Estimator at step {}", report.global_step);
    print_metrics(&report.metrics);
    println!("Model exported to {}", report.export_dir.display());
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::serve_use_case::ServeUseCase;

    let metrics = ServeUseCase::new(&args.export_dir)?.evaluate_file(&args.eval_file)?;
    print_metrics(&metrics);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::serve_use_case::ServeUseCase;

    let predictions = ServeUseCase::new(&args.export_dir)?.predict_file(&args.instances)?;
    for p in predictions {
        println!("{}", serde_json::to_string(&p)?);
    }
    Ok(())
}

fn print_metrics(m: &EvalMetrics) {
    println!("\nResults at global step {}:", m.global_step);
    println!("  accuracy          {:.4}", m.accuracy);
    println!("  accuracy_baseline {:.4}", m.accuracy_baseline);
    println!("  auc               {:.4}", m.auc);
    println!("  precision         {:.4}", m.precision);
    println!("  recall            {:.4}", m.recall);
    println!("  average_loss      {:.4}", m.average_loss);
    println!("  label_mean        {:.4}", m.label_mean);
    println!("  prediction_mean   {:.4}", m.prediction_mean);
}
