//! Register the model if the evaluator promoted it

use anyhow::{Context, Result};
use clap::Parser;
use retrain_pipeline::{cli, run_registration, RegistrationOutcome};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "register")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Register the model when the promotion gate is set", long_about = None)]
struct Args {
    /// Directory holding `model.model_file`
    #[arg(long, alias = "model_dir")]
    model_dir: PathBuf,

    /// Directory the model is staged in before registration
    #[arg(long, alias = "registry_dir")]
    registry_dir: PathBuf,

    /// Directory holding the promotion gate
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
    let models = cli::open_store(&args.model_dir, "model directory")?;
    let staging = cli::open_store(&args.registry_dir, "registry directory")?;
    let eval = cli::open_store(&args.eval_dir, "evaluation directory")?;
    let registry = cli::open_registry()?;

    let session = cli::open_session(args.no_logging, cli::REGISTRATION_RUN);
    let outcome = run_registration(&models, &eval, &staging, &registry, &config, &session)
        .context("Registration failed")?;
    session.finish();

    match outcome {
        RegistrationOutcome::Registered(version) => {
            info!("Registered {} version {}", version.name, version.version)
        }
        RegistrationOutcome::Skipped => info!("Registration skipped"),
    }
    Ok(())
}
