//! Gradient boosted tree classifier trainer
//!
//! Least-squares boosting on 0/1 targets scaled to `SCALE`: the ensemble
//! output estimates the positive-class rate, and every tree fits the
//! current residuals. All arithmetic is fixed-point.

use retrain_model_core::{Model, SCALE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::cart::{CartBuilder, SortedColumns, TreeConfig};
use crate::dataset::LabeledDataset;
use crate::errors::TrainerError;

/// Estimator name recorded with every trained model
pub const ESTIMATOR_NAME: &str = "retrain_trainer::GbdtTrainer";

/// Hyperparameters accepted from configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
}

impl TrainingParams {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Result<Self, TrainerError> {
        let params = Self {
            n_estimators,
            learning_rate,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.n_estimators == 0 {
            return Err(TrainerError::InvalidParams(
                "n_estimators must be a positive integer".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainerError::InvalidParams(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Learning rate at `SCALE` precision (0.1 -> 100_000). Positive rates
    /// below the resolution step use the smallest step, 1.
    pub fn learning_rate_fixed(&self) -> i64 {
        ((self.learning_rate * SCALE as f64).round() as i64).max(1)
    }
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
        }
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: TrainingParams,
    tree_config: TreeConfig,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self {
            params,
            tree_config: TreeConfig::default(),
        }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Fit a binary classifier. The dataset must hold exactly two labels;
    /// the larger one is the positive class.
    pub fn train(&self, dataset: &LabeledDataset) -> Result<Model, TrainerError> {
        self.params.validate()?;

        if dataset.is_empty() || dataset.feature_count() == 0 {
            return Err(TrainerError::Training(format!(
                "feature matrix is empty ({} rows, {} features)",
                dataset.len(),
                dataset.feature_count()
            )));
        }
        if let Some((row, found)) = dataset
            .features
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != dataset.feature_count())
            .map(|(i, f)| (i, f.len()))
        {
            return Err(TrainerError::Training(format!(
                "row {row} has {found} features, expected {}",
                dataset.feature_count()
            )));
        }

        let distinct: Vec<i64> = dataset
            .labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let classes: [i64; 2] = match distinct.as_slice() {
            &[negative, positive] => [negative, positive],
            other => {
                return Err(TrainerError::Training(format!(
                    "binary classifier needs exactly two classes, found {other:?}"
                )))
            }
        };

        let targets: Vec<i64> = dataset
            .labels
            .iter()
            .map(|&label| if label == classes[1] { SCALE } else { 0 })
            .collect();
        let bias = calculate_bias(&targets);
        let weight = self.params.learning_rate_fixed();

        info!(
            "Fitting {} trees on {} rows x {} features (learning rate {})",
            self.params.n_estimators,
            dataset.len(),
            dataset.feature_count(),
            self.params.learning_rate
        );

        let sorted = SortedColumns::new(&dataset.features);
        let hessians = vec![1i64; dataset.len()];
        let mut predictions = vec![bias; dataset.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for tree_idx in 0..self.params.n_estimators {
            let gradients: Vec<i64> = predictions
                .iter()
                .zip(&targets)
                .map(|(p, t)| p.saturating_sub(*t))
                .collect();

            let tree = CartBuilder::new(
                &self.tree_config,
                &dataset.features,
                &sorted,
                &gradients,
                &hessians,
            )
            .build(weight);

            for (pred, row) in predictions.iter_mut().zip(&dataset.features) {
                let step = tree.evaluate(row) as i128 * weight as i128 / SCALE as i128;
                *pred = pred.saturating_add(step as i64);
            }

            debug!(
                "Tree {}/{}: {} nodes, depth {}",
                tree_idx + 1,
                self.params.n_estimators,
                tree.nodes.len(),
                tree.depth()
            );
            trees.push(tree);
        }

        let model = Model::new(trees, bias, dataset.feature_count(), classes);
        model
            .validate()
            .map_err(|e| TrainerError::Training(e.to_string()))?;
        Ok(model)
    }
}

/// Mean target, i.e. the positive-class rate at `SCALE`
fn calculate_bias(targets: &[i64]) -> i64 {
    if targets.is_empty() {
        return 0;
    }
    let sum: i128 = targets.iter().map(|&t| t as i128).sum();
    (sum / targets.len() as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_simple_dataset() -> LabeledDataset {
        LabeledDataset {
            feature_names: vec!["limit".to_string(), "age".to_string()],
            features: vec![
                vec![100_000, 200_000],
                vec![200_000, 300_000],
                vec![300_000, 400_000],
                vec![400_000, 500_000],
                vec![500_000, 100_000],
                vec![600_000, 200_000],
            ],
            labels: vec![0, 0, 0, 1, 1, 1],
        }
    }

    #[test]
    fn test_train_simple_model() {
        let trainer = GbdtTrainer::new(TrainingParams::new(10, 0.5).unwrap());
        let model = trainer.train(&create_simple_dataset()).unwrap();

        assert_eq!(model.num_trees(), 10);
        assert_eq!(model.feature_count, 2);
        assert_eq!(model.classes, [0, 1]);
        assert_eq!(model.bias, SCALE / 2);

        let data = create_simple_dataset();
        assert_eq!(model.predict(&data.features).unwrap(), data.labels);
    }

    #[test]
    fn test_bias_calculation() {
        assert_eq!(calculate_bias(&[0, SCALE, SCALE, SCALE]), 750_000);
        assert_eq!(calculate_bias(&[]), 0);
    }

    #[test]
    fn test_determinism() {
        let params = TrainingParams::new(5, 0.1).unwrap();
        let model1 = GbdtTrainer::new(params.clone())
            .train(&create_simple_dataset())
            .unwrap();
        let model2 = GbdtTrainer::new(params)
            .train(&create_simple_dataset())
            .unwrap();

        assert_eq!(model1, model2);
        assert_eq!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());
    }

    #[test]
    fn test_rejects_single_class_and_empty_data() {
        let trainer = GbdtTrainer::new(TrainingParams::default());

        let mut single = create_simple_dataset();
        single.labels = vec![1; 6];
        assert!(matches!(trainer.train(&single), Err(TrainerError::Training(_))));

        let mut three = create_simple_dataset();
        three.labels[0] = 2;
        assert!(matches!(trainer.train(&three), Err(TrainerError::Training(_))));

        let empty = LabeledDataset {
            feature_names: vec!["x".to_string()],
            features: Vec::new(),
            labels: Vec::new(),
        };
        assert!(matches!(trainer.train(&empty), Err(TrainerError::Training(_))));
    }

    #[test]
    fn test_params_validation() {
        assert!(TrainingParams::new(0, 0.1).is_err());
        assert!(TrainingParams::new(10, 0.0).is_err());
        assert!(TrainingParams::new(10, -0.5).is_err());
        assert!(TrainingParams::new(10, f64::NAN).is_err());
        assert_eq!(TrainingParams::new(10, 0.1).unwrap().learning_rate_fixed(), 100_000);
    }

    #[test]
    fn test_tiny_learning_rate_uses_smallest_step() {
        let params = TrainingParams::new(3, 1e-9).unwrap();
        assert_eq!(params.learning_rate_fixed(), 1);

        let model = GbdtTrainer::new(params).train(&create_simple_dataset()).unwrap();
        assert_eq!(model.num_trees(), 3);
        assert!(model.trees.iter().all(|tree| tree.weight == 1));
    }
}
