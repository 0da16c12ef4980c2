//! Deterministic trainer for the retraining pipeline
//!
//! Loads delimited datasets, shuffles them reproducibly and fits gradient
//! boosted tree classifiers with integer-only arithmetic, so the same data
//! and parameters always produce a byte-identical model.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod trainer;

pub use dataset::{parse_fixed, LabeledDataset, Table};
pub use deterministic::{shuffled_indices, LcgRng, SplitTieBreaker};
pub use errors::{DatasetError, TrainerError};
pub use trainer::{GbdtTrainer, TrainingParams, ESTIMATOR_NAME};
