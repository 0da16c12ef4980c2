//! Fixed-point gradient boosted tree classifier
//!
//! The model artifact produced by training and consumed by evaluation and
//! registration. All arithmetic is integer-only at [`SCALE`] precision:
//!
//! - feature values are decimals multiplied by `SCALE`
//! - each tree contributes `leaf * weight / scale` to the raw score
//! - the raw score estimates the probability of the positive class, so a
//!   row is labelled positive when `score > scale / 2`
//!
//! Models are persisted as canonical JSON (sorted keys, no whitespace) and
//! identified by the BLAKE3 hash of that encoding.

pub mod model;
pub mod tree;

pub use model::{Model, ModelError, FORMAT_VERSION, SCALE};
pub use tree::{Node, Tree};
