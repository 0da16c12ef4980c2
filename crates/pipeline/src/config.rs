//! Shared configuration document
//!
//! Every stage reads the same JSON file and uses the sections it needs.
//! File names inside sections are relative to the directories passed on
//! the command line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::{PipelineError, Result};

/// Label column of the credit default dataset
pub const DEFAULT_LABEL_COLUMN: &str = "default payment next month";
/// Seed used for the train/test shuffle when none is configured
pub const DEFAULT_SEED: u64 = 42;

fn default_label_column() -> String {
    DEFAULT_LABEL_COLUMN.to_string()
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_file: String,
    pub train_file: String,
    pub test_file: String,
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_train_ratio: f64,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Row identifier column dropped on load
    #[serde(default)]
    pub index_column: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Hyperparameters. The set is closed: unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_file: String,
    /// Logical name the model is registered and looked up under
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    pub eval_file: String,
    pub eval_file_last_model: String,
    pub better_than_last_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Name of the staging directory under the registry directory
    pub model_name: String,
}

/// The whole configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub train: TrainConfig,
    pub model: ModelConfig,
    pub eval: EvalConfig,
    pub registry: RegistryConfig,
}

impl PipelineConfig {
    /// Read, parse and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|e| match e {
            PipelineError::Configuration(msg) => {
                PipelineError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.data.test_train_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(PipelineError::Configuration(format!(
                "data.test_train_ratio must be in (0, 1), got {ratio}"
            )));
        }
        if self.train.n_estimators == 0 {
            return Err(PipelineError::Configuration(
                "train.n_estimators must be a positive integer".to_string(),
            ));
        }
        if !(self.train.learning_rate.is_finite() && self.train.learning_rate > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "train.learning_rate must be a positive number, got {}",
                self.train.learning_rate
            )));
        }

        let required = [
            ("data.data_file", &self.data.data_file),
            ("data.train_file", &self.data.train_file),
            ("data.test_file", &self.data.test_file),
            ("data.label_column", &self.data.label_column),
            ("model.model_file", &self.model.model_file),
            ("model.model_name", &self.model.model_name),
            ("eval.eval_file", &self.eval.eval_file),
            ("eval.eval_file_last_model", &self.eval.eval_file_last_model),
            ("eval.better_than_last_file", &self.eval.better_than_last_file),
            ("registry.model_name", &self.registry.model_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(PipelineError::Configuration(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Renders `key=value, key=value` for the per-stage config summary lines
pub struct Summary<'a, T: Serialize>(pub &'a T);

impl<T: Serialize> fmt::Display for Summary<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_value(self.0).map_err(|_| fmt::Error)?;
        let Some(map) = value.as_object() else {
            return write!(f, "{value}");
        };
        let mut first = true;
        for (key, value) in map {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                serde_json::Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}
