//! Evaluate the fresh model against the last registered one

use anyhow::{Context, Result};
use clap::Parser;
use retrain_pipeline::{cli, run_evaluation};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "evaluate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evaluate the model and write the promotion gate", long_about = None)]
struct Args {
    /// Directory holding `data.test_file`
    #[arg(long, alias = "data_dir")]
    data_dir: PathBuf,

    /// Directory holding `model.model_file`
    #[arg(long, alias = "model_dir")]
    model_dir: PathBuf,

    /// Directory receiving reports, plot and gate
    #[arg(long, alias = "eval_dir")]
    eval_dir: PathBuf,

    /// Pipeline configuration (JSON)
    #[arg(long, alias = "config_file")]
    config_file: PathBuf,

    /// Disable experiment tracking
    #[arg(long, alias = "no_logging")]
    no_logging: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    cli::init_tracing()?;
    info!("Input argument: {:?}", args);

    let config = cli::load_config(&args.config_file)?;
    let data = cli::open_store(&args.data_dir, "data directory")?;
    let models = cli::open_store(&args.model_dir, "model directory")?;
    let eval = cli::open_store(&args.eval_dir, "evaluation directory")?;
    let registry = cli::open_registry()?;

    let session = cli::open_session(args.no_logging, cli::EVALUATION_RUN);
    let evaluation = run_evaluation(&data, &models, &eval, &registry, &config, &session)
        .context("Evaluation failed")?;
    session.finish();

    info!(
        "Evaluation complete: weighted f1 {:.3}, gate {}",
        evaluation.current.weighted_f1(),
        evaluation.gate
    );
    Ok(())
}
