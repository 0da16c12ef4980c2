//! Binary classifier built from an ensemble of fixed-point trees

use super::tree::Tree;
use crate::serde_canon::{content_hash_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Row {row} has {found} features, model expects {expected}")]
    FeatureCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),
}

/// Fixed-point scale shared by features, targets and leaf values (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current artifact format version
pub const FORMAT_VERSION: i32 = 1;

/// Gradient boosted binary classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub version: i32,
    pub scale: i64,
    /// Number of features every scored row must carry
    pub feature_count: usize,
    /// Class labels as `[negative, positive]`
    pub classes: [i64; 2],
    /// Initial prediction (positive-class rate of the training data)
    pub bias: i64,
    pub trees: Vec<Tree>,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64, feature_count: usize, classes: [i64; 2]) -> Self {
        Self {
            version: FORMAT_VERSION,
            scale: SCALE,
            feature_count,
            classes,
            bias,
            trees,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "unsupported model version: {}",
                self.version
            )));
        }
        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "invalid scale: {}",
                self.scale
            )));
        }
        if self.feature_count == 0 {
            return Err(ModelError::ValidationFailed(
                "model has no features".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                ModelError::ValidationFailed(format!("tree {i} validation failed: {e}"))
            })?;
        }
        Ok(())
    }

    /// Raw ensemble output for one row, at `scale` precision.
    pub fn score(&self, features: &[i64]) -> i64 {
        let mut sum = self.bias as i128;
        for tree in &self.trees {
            let leaf = tree.evaluate(features) as i128;
            sum += leaf * tree.weight as i128 / self.scale as i128;
        }
        sum.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Class label for one row. Callers are expected to have checked the
    /// row length; use [`Model::predict`] for checked batch scoring.
    pub fn predict_row(&self, features: &[i64]) -> i64 {
        let score = self.score(features) as i128;
        if score * 2 > self.scale as i128 {
            self.classes[1]
        } else {
            self.classes[0]
        }
    }

    /// Class labels for a feature matrix.
    pub fn predict(&self, rows: &[Vec<i64>]) -> Result<Vec<i64>, ModelError> {
        rows.iter()
            .enumerate()
            .map(|(row, features)| {
                if features.len() != self.feature_count {
                    return Err(ModelError::FeatureCount {
                        row,
                        expected: self.feature_count,
                        found: features.len(),
                    });
                }
                Ok(self.predict_row(features))
            })
            .collect()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Canonical JSON bytes; the on-disk artifact format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(to_canonical_json(self)?.into_bytes())
    }

    /// Parse and validate an artifact produced by [`Model::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Model = serde_json::from_slice(bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// BLAKE3 hash of the canonical encoding
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(content_hash_hex(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
        let tree = Tree::new(
            vec![
                Node::split(1, 2 * SCALE, 1, 2),
                Node::leaf(-400_000),
                Node::leaf(400_000),
            ],
            SCALE,
        );
        Model::new(vec![tree], 500_000, 2, [0, 1])
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, FORMAT_VERSION);
        assert_eq!(model.scale, SCALE);
        assert_eq!(model.num_trees(), 1);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_half_scale_is_negative() {
        // A score of exactly 0.5 is not enough for the positive class.
        let model = Model::new(Vec::new(), SCALE / 2, 1, [0, 1]);
        assert_eq!(model.predict_row(&[0]), 0);

        let model = Model::new(Vec::new(), SCALE / 2 + 1, 1, [0, 1]);
        assert_eq!(model.predict_row(&[0]), 1);
    }

    #[test]
    fn test_predict_checks_feature_count() {
        let model = create_test_model();
        let err = model.predict(&[vec![0, 0], vec![1]]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureCount {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_canonical_bytes_are_compact_and_sorted() {
        let json = String::from_utf8(create_test_model().to_bytes().unwrap()).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.find("\"bias\"").unwrap() < json.find("\"trees\"").unwrap());
    }

    #[test]
    fn test_from_bytes_rejects_invalid_models() {
        let mut model = create_test_model();
        model.scale = 0;
        let bytes = serde_json::to_vec(&model).unwrap();
        assert!(matches!(
            Model::from_bytes(&bytes),
            Err(ModelError::ValidationFailed(_))
        ));

        assert!(matches!(Model::from_bytes(b"not json"), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_hash_changes_with_model() {
        let a = create_test_model();
        let mut b = create_test_model();
        b.bias += 1;
        assert_ne!(a.hash_hex().unwrap(), b.hash_hex().unwrap());
        assert_eq!(a.hash_hex().unwrap().len(), 64);
    }
}
