use thiserror::Error;

/// Problems with the shape or content of an input table.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,

    #[error("dataset is not valid UTF-8")]
    InvalidUtf8,

    #[error("column {0:?} not found in dataset header")]
    MissingColumn(String),

    #[error("line {line}: expected {expected} columns, got {found}")]
    Ragged {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("malformed delimited text: {0}")]
    Malformed(String),

    #[error("line {line}, column {column:?}: invalid number {value:?}")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },
}

/// Errors returned by the trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error("training error: {0}")]
    Training(String),
}
