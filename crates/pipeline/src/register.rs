//! Registrar stage: promote the fresh model into the registry when the gate says so

use retrain_model_core::{join_name, ArtifactStore};
use retrain_registry::{ModelRegistry, ModelVersion, RegistryError, MODEL_FILE};
use tracing::info;

use crate::config::{PipelineConfig, Summary};
use crate::decision::PromotionGate;
use crate::errors::{PipelineError, Result};
use crate::training::load_model;
use crate::tracking::TrackingSession;

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Registered(ModelVersion),
    Skipped,
}

impl RegistrationOutcome {
    pub fn version(&self) -> Option<u64> {
        match self {
            RegistrationOutcome::Registered(v) => Some(v.version),
            RegistrationOutcome::Skipped => None,
        }
    }
}

/// Local directory the model is written to in the registry's native layout
/// before it is logged
pub struct Staging<'a> {
    pub store: &'a dyn ArtifactStore,
    pub dir: &'a str,
}

fn registration_error(context: &str, err: RegistryError) -> PipelineError {
    match err {
        RegistryError::Store(e) => e.into(),
        other => PipelineError::Registration(format!("{context}: {other}")),
    }
}

/// Read the promotion gate written by the evaluator
pub fn read_gate(eval_store: &dyn ArtifactStore, gate_file: &str) -> Result<PromotionGate> {
    let content = eval_store.read(gate_file)?;
    PromotionGate::decode(&content, &eval_store.describe(gate_file))
}

/// Register the model at `model_file` as a new version of `logical_name`
/// when `gate` is [`PromotionGate::Promote`].
///
/// The staging directory is replaced before the registry is touched; a
/// registry failure after that point leaves the staged copy in place.
pub fn register_if_promoted(
    gate: PromotionGate,
    model_store: &dyn ArtifactStore,
    model_file: &str,
    logical_name: &str,
    staging: &Staging<'_>,
    registry: &dyn ModelRegistry,
    session: &TrackingSession,
) -> Result<RegistrationOutcome> {
    if !gate.is_promote() {
        info!("Model is not better than the last. Skip registering");
        return Ok(RegistrationOutcome::Skipped);
    }
    session.log_metric("better_than_last", gate.as_metric());

    let model = load_model(model_store, model_file)?;
    info!("Registering {} from {}", logical_name, model_store.describe(model_file));

    registry
        .save_local(&model, staging.store, staging.dir)
        .map_err(|e| registration_error("saving to staging", e))?;
    let staged = registry
        .load_local(staging.store, staging.dir)
        .map_err(|e| registration_error("reloading from staging", e))?;
    info!("Model staged at {}", staging.store.describe(staging.dir));

    let bytes = staged.to_bytes()?;
    session.log_artifact(&join_name(logical_name, MODEL_FILE), &bytes);

    let uri = registry
        .log_model(&staged, logical_name)
        .map_err(|e| registration_error("logging model", e))?;
    let version = registry
        .register(&uri, logical_name)
        .map_err(|e| registration_error("registering model", e))?;

    info!("Registered {} version {}", version.name, version.version);
    Ok(RegistrationOutcome::Registered(version))
}

/// Register stage: read the gate from `eval_store` and register if promoted
pub fn run_registration(
    model_store: &dyn ArtifactStore,
    eval_store: &dyn ArtifactStore,
    registry_dir: &dyn ArtifactStore,
    registry: &dyn ModelRegistry,
    config: &PipelineConfig,
    session: &TrackingSession,
) -> Result<RegistrationOutcome> {
    info!("Model config: {}", Summary(&config.model));
    info!("Eval config: {}", Summary(&config.eval));
    info!("Registry config: {}", Summary(&config.registry));

    let gate = read_gate(eval_store, &config.eval.better_than_last_file)?;
    let staging = Staging {
        store: registry_dir,
        dir: &config.registry.model_name,
    };
    register_if_promoted(
        gate,
        model_store,
        &config.model.model_file,
        &config.model.model_name,
        &staging,
        registry,
        session,
    )
}
