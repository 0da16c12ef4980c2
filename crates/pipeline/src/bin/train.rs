//! Fit a model on the train file

use anyhow::{Context, Result};
use clap::Parser;
use retrain_pipeline::{cli, run_training};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the classifier on the train subset", long_about = None)]
struct Args {
    /// Directory holding `data.train_file`
    #[arg(long, alias = "data_dir")]
    data_dir: PathBuf,

    /// Directory receiving `model.model_file`; its top-level files are replaced
    #[arg(long, alias = "model_dir")]
    model_dir: PathBuf,

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

    let session = cli::open_session(args.no_logging, cli::TRAINING_RUN);
    let model = run_training(&data, &models, &config, &session).context("Training failed")?;
    session.finish();

    info!("Training complete: {} trees", model.num_trees());
    Ok(())
}
