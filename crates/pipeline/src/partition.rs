//! Partitioner stage: split a labeled dataset into train and test subsets

use retrain_model_core::ArtifactStore;
use retrain_trainer::{shuffled_indices, Table};
use serde::Serialize;
use tracing::info;

use crate::config::{PipelineConfig, Summary};
use crate::data::{read_table, write_table};
use crate::errors::{PipelineError, Result};
use crate::tracking::TrackingSession;

/// Disjoint train/test subsets covering every input row
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Table,
    pub test: Table,
}

/// Row counts reported after partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataStats {
    pub num_samples: usize,
    pub num_features: usize,
    pub num_train_samples: usize,
    pub num_test_samples: usize,
}

impl DataStats {
    pub fn as_metrics(&self) -> [(&'static str, f64); 4] {
        [
            ("num_samples", self.num_samples as f64),
            ("num_features", self.num_features as f64),
            ("num_train_samples", self.num_train_samples as f64),
            ("num_test_samples", self.num_test_samples as f64),
        ]
    }
}

/// Number of test rows for `n` rows at fraction `r`: `round(r * n)`, kept
/// within `[1, n - 1]` so both sides are non-empty. A single row goes to train.
pub fn test_size(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let raw = (test_fraction * n as f64).round() as usize;
    raw.clamp(1, n - 1)
}

/// Split `table` with a seeded shuffle. The first `test_size` shuffled rows
/// form the test set, the rest the train set; both keep the header.
pub fn partition(
    table: &Table,
    test_fraction: f64,
    label_column: &str,
    seed: u64,
) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::Configuration(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if table.column_index(label_column).is_none() {
        return Err(PipelineError::Configuration(format!(
            "label column {label_column:?} not found in dataset header"
        )));
    }
    if table.is_empty() {
        return Err(PipelineError::Data("dataset has no rows".to_string()));
    }

    let order = shuffled_indices(table.len(), seed);
    let (test_idx, train_idx) = order.split_at(test_size(table.len(), test_fraction));

    Ok(Split {
        train: table.select_rows(train_idx),
        test: table.select_rows(test_idx),
    })
}

/// Data-prep stage: read `data.data_file` from `input`, write
/// `data.train_file` and `data.test_file` to `output`
pub fn run_data_prep(
    input: &dyn ArtifactStore,
    output: &dyn ArtifactStore,
    config: &PipelineConfig,
    session: &TrackingSession,
) -> Result<DataStats> {
    let data = &config.data;
    info!("Data config: {}", Summary(data));

    let table = read_table(input, &data.data_file, data).map_err(|e| match e {
        PipelineError::ArtifactNotFound(path) => {
            PipelineError::Configuration(format!("data.data_file: no such file {path}"))
        }
        other => other,
    })?;
    let split = partition(&table, data.test_train_ratio, &data.label_column, data.seed)?;

    write_table(output, &data.train_file, &split.train)?;
    write_table(output, &data.test_file, &split.test)?;
    info!(
        "Wrote {} and {}",
        output.describe(&data.train_file),
        output.describe(&data.test_file)
    );

    let stats = DataStats {
        num_samples: table.len(),
        num_features: table.columns.len().saturating_sub(1),
        num_train_samples: split.train.len(),
        num_test_samples: split.test.len(),
    };
    info!("Data stats: {}", Summary(&stats));
    session.log_metrics(&stats.as_metrics());
    Ok(stats)
}
