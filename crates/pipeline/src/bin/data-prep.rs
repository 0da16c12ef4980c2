//! Split the input dataset into train and test files

use anyhow::{Context, Result};
use clap::Parser;
use retrain_pipeline::{cli, run_data_prep};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "data-prep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Split the labeled dataset into train and test subsets", long_about = None)]
struct Args {
    /// Directory holding `data.data_file`
    #[arg(long, alias = "data_input_dir")]
    data_input_dir: PathBuf,

    /// Directory receiving the train and test files
    #[arg(long, alias = "data_output_dir")]
    data_output_dir: PathBuf,

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
    let input = cli::open_store(&args.data_input_dir, "data input directory")?;
    let output = cli::open_store(&args.data_output_dir, "data output directory")?;

    let session = cli::open_session(args.no_logging, cli::DATA_PREP_RUN);
    let stats = run_data_prep(&input, &output, &config, &session).context("Data prep failed")?;
    session.finish();

    info!(
        "Data prep complete: {} train / {} test rows",
        stats.num_train_samples, stats.num_test_samples
    );
    Ok(())
}
