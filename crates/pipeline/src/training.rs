//! Trainer stage: fit a model on the train subset and persist it

use retrain_model_core::{ArtifactStore, Model};
use retrain_trainer::{GbdtTrainer, TrainerError, TrainingParams, ESTIMATOR_NAME};
use tracing::{debug, info};

use crate::config::{PipelineConfig, Summary, TrainConfig};
use crate::data::{labeled, read_table};
use crate::errors::{PipelineError, Result};
use crate::tracking::TrackingSession;

fn trainer_error(err: TrainerError) -> PipelineError {
    match err {
        TrainerError::Dataset(e) => e.into(),
        TrainerError::InvalidParams(msg) => PipelineError::Configuration(msg),
        TrainerError::Training(msg) => PipelineError::Training(msg),
    }
}

pub fn training_params(train: &TrainConfig) -> Result<TrainingParams> {
    TrainingParams::new(train.n_estimators, train.learning_rate).map_err(trainer_error)
}

/// Train stage: read `data.train_file` from `data_store`, fit, and make
/// `model.model_file` the only top-level file in `model_store`
pub fn run_training(
    data_store: &dyn ArtifactStore,
    model_store: &dyn ArtifactStore,
    config: &PipelineConfig,
    session: &TrackingSession,
) -> Result<Model> {
    info!("Data config: {}", Summary(&config.data));
    info!("Train config: {}", Summary(&config.train));
    info!("Model config: {}", Summary(&config.model));

    let params = training_params(&config.train)?;
    let table = read_table(data_store, &config.data.train_file, &config.data)?;
    let dataset = labeled(&table, &config.data.label_column)?;
    info!(
        "Training on {} rows with {} features, class counts {:?}",
        dataset.len(),
        dataset.feature_count(),
        dataset.class_counts()
    );
    for (name, (min, max)) in dataset.feature_names.iter().zip(dataset.feature_stats()) {
        debug!("Feature {}: min {}, max {} (fixed-point)", name, min, max);
    }

    let trainer = GbdtTrainer::new(params);
    let model = trainer.train(&dataset).map_err(trainer_error)?;

    let bytes = model.to_bytes()?;
    model_store.replace_contents("", &[(config.model.model_file.as_str(), &bytes)])?;
    info!(
        "Model saved to {} ({} trees, hash {})",
        model_store.describe(&config.model.model_file),
        model.num_trees(),
        model.hash_hex()?
    );

    let params = trainer.params();
    session.log_param("model", ESTIMATOR_NAME);
    session.log_param("n_estimators", params.n_estimators);
    session.log_param("learning_rate", params.learning_rate);
    session.log_artifact(&config.model.model_file, &bytes);
    Ok(model)
}

/// Load the model written by [`run_training`]
pub fn load_model(model_store: &dyn ArtifactStore, model_file: &str) -> Result<Model> {
    let bytes = model_store.read(model_file)?;
    Model::from_bytes(&bytes).map_err(|e| {
        PipelineError::Evaluation(format!("{}: {e}", model_store.describe(model_file)))
    })
}
