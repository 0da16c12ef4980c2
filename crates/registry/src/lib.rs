//! Model registry for the retraining pipeline
//!
//! Stores versioned model artifacts under a logical name. Versions are
//! assigned by the registry and strictly increase per name; callers only
//! ever ask for the existing versions and register new artifacts.

pub mod errors;
pub mod registry;
pub mod types;

pub use errors::{RegistryError, Result};
pub use registry::{LocalRegistry, ModelRegistry, META_FILE, MODEL_FILE};
pub use types::{ModelUri, ModelVersion, NativeModelMeta};
