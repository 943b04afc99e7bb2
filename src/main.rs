//! Model Evaluation Pipeline - Main Entry Point
//!
//! Scores a held-out test set with a trained model artifact and writes the
//! evaluation report and the prediction baseline.

use anyhow::{Context, Result};
use clap::Parser;
use model_evaluation_pipeline::config::{AppConfig, LogFormat};
use model_evaluation_pipeline::pipeline::Pipeline;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "model-eval", version, about = "Evaluate a regression model artifact")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: PathBuf,

    /// Override the configured log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("model_evaluation_pipeline={level}").parse()?)
        .add_directive(format!("model_eval={level}").parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from_path(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let log_format = cli.log_format.unwrap_or(config.logging.format);
    init_logging(&config.logging.level, log_format)?;

    info!(config = %cli.config.display(), "Starting model evaluation");
    info!(
        format = ?config.model.format,
        metrics = ?config.evaluation.metrics,
        rounding = ?config.evaluation.rounding,
        "Configuration loaded successfully"
    );

    let pipeline = Pipeline::new(config);
    match pipeline.run() {
        Ok(summary) => {
            info!(
                run_id = %summary.run_id,
                rows = summary.rows,
                metrics = ?summary.metrics,
                report = %summary.report_path.display(),
                baseline = %summary.baseline_path.display(),
                elapsed_ms = summary.elapsed_ms(),
                "Evaluation finished"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Evaluation failed");
            Err(e).context("Evaluation run aborted")
        }
    }
}
