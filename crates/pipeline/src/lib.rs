//! Model retraining pipeline
//!
//! Four stages, each a function of (input artifacts, config) to
//! (output artifacts, tracking side effects):
//!
//! 1. [`partition::run_data_prep`] splits the labeled dataset into train and test.
//! 2. [`training::run_training`] fits a model on the train subset.
//! 3. [`evaluate::run_evaluation`] scores it against the last registered
//!    model and writes the promotion gate.
//! 4. [`register::run_registration`] registers the model if the gate says so.
//!
//! Stages only communicate through artifacts in [`ArtifactStore`]s, so each
//! one runs as its own binary.
//!
//! [`ArtifactStore`]: retrain_model_core::ArtifactStore

pub mod cli;
pub mod config;
pub mod data;
pub mod decision;
pub mod errors;
pub mod evaluate;
pub mod metrics;
pub mod partition;
pub mod plot;
pub mod register;
pub mod tracking;
pub mod training;

pub use config::PipelineConfig;
pub use decision::{decide, PromotionGate};
pub use errors::{PipelineError, Result};
pub use evaluate::{evaluate, run_evaluation, Evaluation};
pub use metrics::{classification_report, ClassificationReport, ConfusionMatrix};
pub use partition::{partition, run_data_prep, DataStats, Split};
pub use register::{read_gate, register_if_promoted, run_registration, RegistrationOutcome, Staging};
pub use tracking::{FileTracker, MemoryTracker, Tracker, TrackingSession};
pub use training::{load_model, run_training};
