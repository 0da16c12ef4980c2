//! Pipeline error taxonomy

use retrain_model_core::{ModelError, StoreError};
use retrain_trainer::DatasetError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or invalid configuration key, argument or hyperparameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// The registry could not be queried for the last model
    #[error("Model registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The registry refused to log or register the model
    #[error("Registration failed: {0}")]
    Registration(String),

    /// Input data is empty or malformed
    #[error("Data error: {0}")]
    Data(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Promotion gate holds anything but `0` or `1`
    #[error("Corrupt promotion gate at {location}: {content:?}")]
    CorruptGate { location: String, content: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => PipelineError::ArtifactNotFound(name),
            StoreError::InvalidName(name) => {
                PipelineError::Configuration(format!("invalid artifact name {name:?}"))
            }
            StoreError::Io { path, source } => PipelineError::Io { path, source },
        }
    }
}

impl From<DatasetError> for PipelineError {
    fn from(err: DatasetError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Json(e) => PipelineError::Serialization(e),
            other => PipelineError::Evaluation(other.to_string()),
        }
    }
}
