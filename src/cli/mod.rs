//! Command-line interface for training, evaluation, and prediction

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::artifact::ArtifactBundle;
use crate::data;
use crate::error::{Result, WellcastError};
use crate::pipeline::{evaluate_bundle, PipelineConfig, TrainPipeline};
use crate::schema::{RawRecord, SchemaSpec};

#[derive(Parser)]
#[command(name = "wellcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wellness-score regression pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full training pipeline on a CSV table
    Train {
        /// Training table (CSV/TSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact bundle output directory
        #[arg(short, long, default_value = "models/wellness")]
        output: PathBuf,

        /// Master random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Randomized-search draws per tuned family
        #[arg(long, default_value = "20")]
        iterations: usize,

        /// Worker-pool size (defaults to all cores)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Score a persisted model against a CSV table
    Evaluate {
        /// Artifact bundle directory
        #[arg(short, long)]
        artifact: PathBuf,

        /// Table to score (CSV/TSV)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Predict one record (JSON object) with a persisted model
    Predict {
        /// Artifact bundle directory
        #[arg(short, long)]
        artifact: PathBuf,

        /// Path to a JSON object with the raw input columns
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Summarize a training table
    Info {
        /// Table to inspect (CSV/TSV)
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn cmd_train(
    data: &PathBuf,
    output: &PathBuf,
    seed: u64,
    iterations: usize,
    workers: Option<usize>,
) -> Result<()> {
    let df = data::load_csv(data)?;
    let config = PipelineConfig {
        seed,
        tune_iterations: iterations,
        n_workers: workers,
        output_dir: output.clone(),
        ..Default::default()
    };

    let outcome = TrainPipeline::new(SchemaSpec::wellness(), config).run(&df)?;

    println!("Best model: {}", outcome.model_name);
    println!(
        "Test R2 {:.4} | MAE {:.4} | RMSE {:.4}",
        outcome.metadata.test_metrics.r2,
        outcome.metadata.test_metrics.mae,
        outcome.metadata.test_metrics.rmse
    );
    println!(
        "Cross-validation R2 {:.4} (+/- {:.4})",
        outcome.cv.r2.mean, outcome.cv.r2.std
    );
    println!("Artifact: {}", outcome.artifact_dir.display());
    Ok(())
}

pub fn cmd_evaluate(artifact: &PathBuf, data: &PathBuf) -> Result<()> {
    let bundle = ArtifactBundle::load(artifact)?;
    let df = data::load_csv(data)?;
    let (metrics, n_rows) = evaluate_bundle(&bundle, &df)?;

    println!("Model: {}", bundle.metadata.model_name);
    println!("Trained: {}", bundle.metadata.training_date);
    println!("Rows scored: {n_rows}");
    println!(
        "R2 {:.4} | MAE {:.4} | RMSE {:.4} | MAPE {:.4}%",
        metrics.r2, metrics.mae, metrics.rmse, metrics.mape
    );
    Ok(())
}

pub fn cmd_predict(artifact: &PathBuf, input: &PathBuf) -> Result<()> {
    let bundle = ArtifactBundle::load(artifact)?;

    let json = std::fs::read_to_string(input)
        .map_err(|e| WellcastError::Data(format!("cannot read {}: {e}", input.display())))?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    let record = RawRecord::from_json(bundle.transform.schema(), &value)?;

    let score = bundle.predict(&record)?;
    println!("{score:.4}");
    Ok(())
}

pub fn cmd_info(data: &PathBuf) -> Result<()> {
    let df = data::load_csv(data)?;
    println!("Rows: {}", df.height());
    println!("Columns: {}", df.width());
    for (name, dtype) in df.get_column_names().iter().zip(df.dtypes().iter()) {
        let nulls = df
            .column(name.as_str())
            .map(|c| c.null_count())
            .unwrap_or(0);
        println!("  {name}: {dtype} ({nulls} missing)");
    }
    Ok(())
}
