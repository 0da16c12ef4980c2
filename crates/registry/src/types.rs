//! Registry data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const STAGED_SCHEME: &str = "staged:/";

/// Reference to a logged (not yet registered) model: `staged:/<id>/<name>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUri {
    pub staged_id: String,
    pub name: String,
}

impl ModelUri {
    pub fn new(staged_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            staged_id: staged_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{STAGED_SCHEME}{}/{}", self.staged_id, self.name)
    }
}

/// A registered version of a logical model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u64,
    /// URI the version was registered from
    pub source: String,
    pub model_hash: String,
    pub registered_at: DateTime<Utc>,
}

/// Sidecar written next to every model in the registry's native layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeModelMeta {
    pub format: String,
    pub format_version: i32,
    pub model_hash: String,
    pub tree_count: usize,
    pub feature_count: usize,
    /// `retrain-model-core` version that wrote the model
    #[serde(default)]
    pub library_version: String,
    pub saved_at: DateTime<Utc>,
}
