//! Delimited dataset loading
//!
//! A [`Table`] is the raw form passed between stages: a header row plus
//! string cells, written back exactly as read. A [`LabeledDataset`] is the
//! numeric view used for fitting and scoring, with every feature converted
//! to fixed-point at `SCALE`.

use retrain_model_core::SCALE;
use std::collections::BTreeMap;

use crate::errors::DatasetError;

const DELIMITER: u8 = b',';

/// Header plus rows of raw cells
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn csv_error(err: csv::Error) -> DatasetError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => DatasetError::Ragged {
            line: pos.as_ref().map_or(0, |p| p.line() as usize),
            expected: *expected_len as usize,
            found: *len as usize,
        },
        csv::ErrorKind::Utf8 { .. } => DatasetError::InvalidUtf8,
        _ => DatasetError::Malformed(err.to_string()),
    }
}

impl Table {
    /// Parse comma-delimited text with optional double-quoted cells. The
    /// first record is the header; blank lines are skipped. Cells are trimmed.
    pub fn parse(text: &str) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatasetError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DatasetError::InvalidUtf8)?;
        Self::parse(text)
    }

    /// Serialize back to comma-delimited text, quoting cells where needed.
    pub fn to_csv(&self) -> Result<Vec<u8>, DatasetError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(Vec::new());
        writer.write_record(&self.columns).map_err(csv_error)?;
        for row in &self.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer
            .into_inner()
            .map_err(|e| DatasetError::Malformed(e.error().to_string()))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Remove a column; returns false when it does not exist.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// New table with the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a decimal cell into a fixed-point integer at `SCALE`.
pub fn parse_fixed(cell: &str) -> Option<i64> {
    let value: f64 = cell.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let scaled = (value * SCALE as f64).round();
    if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

fn parse_label(cell: &str) -> Option<i64> {
    let cell = cell.trim();
    if let Ok(label) = cell.parse::<i64>() {
        return Some(label);
    }
    let value: f64 = cell.parse().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

/// Numeric features and integer class labels
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledDataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<i64>>,
    pub labels: Vec<i64>,
}

impl LabeledDataset {
    /// Split `label_column` off a table and convert the rest to fixed-point.
    pub fn from_table(table: &Table, label_column: &str) -> Result<Self, DatasetError> {
        let label_idx = table
            .column_index(label_column)
            .ok_or_else(|| DatasetError::MissingColumn(label_column.to_string()))?;

        let feature_names: Vec<String> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx)
            .map(|(_, name)| name.clone())
            .collect();

        let mut features = Vec::with_capacity(table.len());
        let mut labels = Vec::with_capacity(table.len());

        for (row_idx, row) in table.rows.iter().enumerate() {
            // +2: one for the header, one for 1-based numbering
            let line = row_idx + 2;
            let mut values = Vec::with_capacity(feature_names.len());
            for (col_idx, cell) in row.iter().enumerate() {
                if col_idx == label_idx {
                    continue;
                }
                let value = parse_fixed(cell).ok_or_else(|| DatasetError::InvalidNumber {
                    line,
                    column: table.columns[col_idx].clone(),
                    value: cell.clone(),
                })?;
                values.push(value);
            }

            let label = parse_label(&row[label_idx]).ok_or_else(|| DatasetError::InvalidNumber {
                line,
                column: label_column.to_string(),
                value: row[label_idx].clone(),
            })?;

            features.push(values);
            labels.push(label);
        }

        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Number of rows per label, ordered by label
    pub fn class_counts(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// (min, max) of every feature, for sanity logging
    pub fn feature_stats(&self) -> Vec<(i64, i64)> {
        let mut stats = vec![(i64::MAX, i64::MIN); self.feature_count()];
        for row in &self.features {
            for (i, &val) in row.iter().enumerate() {
                stats[i].0 = stats[i].0.min(val);
                stats[i].1 = stats[i].1.max(val);
            }
        }
        stats
    }
}
