//! Error types for the model registry

use retrain_model_core::{ModelError, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the model registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Model or version not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Invalid logical name or model URI
    #[error("Invalid registration: {0}")]
    InvalidRegistration(String),

    /// The version the registry picked is already taken
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Stored artifact does not match its recorded hash
    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),

    /// Backing storage could not be reached
    #[error("Registry storage unavailable at {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
