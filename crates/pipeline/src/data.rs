//! Dataset access shared by the stages

use retrain_model_core::ArtifactStore;
use retrain_trainer::{DatasetError, LabeledDataset, Table};
use tracing::debug;

use crate::config::DataConfig;
use crate::errors::{PipelineError, Result};

/// Read a table from `store`, dropping the configured index column if present
pub fn read_table(store: &dyn ArtifactStore, name: &str, data: &DataConfig) -> Result<Table> {
    let bytes = store.read(name)?;
    let mut table = Table::from_bytes(&bytes)
        .map_err(|e| PipelineError::Data(format!("{}: {e}", store.describe(name))))?;

    if let Some(index) = &data.index_column {
        if table.drop_column(index) {
            debug!("Dropped index column {:?} from {}", index, name);
        }
    }
    Ok(table)
}

pub fn write_table(store: &dyn ArtifactStore, name: &str, table: &Table) -> Result<()> {
    let bytes = table
        .to_csv()
        .map_err(|e| PipelineError::Data(format!("{}: {e}", store.describe(name))))?;
    store.write(name, &bytes)?;
    Ok(())
}

/// Numeric view of a table. A missing label column is a data error here;
/// the partitioner reports it as a configuration error instead.
pub fn labeled(table: &Table, label_column: &str) -> Result<LabeledDataset> {
    LabeledDataset::from_table(table, label_column).map_err(|e| match e {
        DatasetError::MissingColumn(column) => PipelineError::Data(format!(
            "label column {column:?} missing from dataset"
        )),
        other => other.into(),
    })
}
