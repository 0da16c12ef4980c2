//! Helpers shared by the stage binaries

use anyhow::{Context, Result};
use retrain_model_core::LocalStore;
use retrain_registry::LocalRegistry;
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::PipelineConfig;
use crate::tracking::{FileTracker, TrackingSession, DEFAULT_TRACKING_DIR, TRACKING_DIR_ENV};

pub const DATA_PREP_RUN: &str = "Credit_Default_Data_Prep";
pub const TRAINING_RUN: &str = "Credit_Default_Model_Training";
pub const EVALUATION_RUN: &str = "Credit_Default_Evaluation";
pub const REGISTRATION_RUN: &str = "Credit_Default_Model_Registering";

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Root of the tracking runs and the model registry
pub fn tracking_root() -> PathBuf {
    env::var_os(TRACKING_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACKING_DIR))
}

/// Start a tracking run unless `no_logging` is set
pub fn open_session(no_logging: bool, run_name: &str) -> TrackingSession {
    if no_logging {
        info!("Tracking disabled");
        return TrackingSession::disabled();
    }
    let root = tracking_root();
    match FileTracker::open(&root) {
        Ok(tracker) => TrackingSession::start(Box::new(tracker), run_name),
        Err(e) => {
            tracing::warn!("Tracking unavailable at {}: {}", root.display(), e);
            TrackingSession::disabled()
        }
    }
}

pub fn open_registry() -> Result<LocalRegistry> {
    let root = tracking_root().join("registry");
    LocalRegistry::open(&root)
        .with_context(|| format!("Failed to open model registry at {}", root.display()))
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

pub fn open_store(dir: &Path, what: &str) -> Result<LocalStore> {
    LocalStore::open(dir).with_context(|| format!("Failed to open {what} {}", dir.display()))
}
