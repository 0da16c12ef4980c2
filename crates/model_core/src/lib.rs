//! Core artifact types for the retraining pipeline
//!
//! Modules:
//! - `gbdt`: fixed-point gradient boosted tree classifier (the model artifact)
//! - `serde_canon`: canonical JSON encoding and content hashing
//! - `store`: artifact storage shared by every pipeline stage

pub mod gbdt;
pub mod serde_canon;
pub mod store;

pub use gbdt::{Model, ModelError, Node, Tree, SCALE};
pub use serde_canon::{content_hash_hex, to_canonical_json, CanonicalError};
pub use store::{join_name, ArtifactStore, LocalStore, MemoryStore, StoreError};

/// Crate version string recorded in model metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
