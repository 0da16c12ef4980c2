//! Classification metrics
//!
//! Reports use the key layout of a scikit-learn `classification_report`
//! dictionary: one entry per class label, then `accuracy`, `macro avg` and
//! `weighted avg`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Keyed by the label's decimal string
    #[serde(flatten)]
    pub classes: BTreeMap<String, ClassMetrics>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<u64>,
}

impl ClassificationReport {
    /// Weighted-average F1, the promotion metric
    pub fn weighted_f1(&self) -> f64 {
        self.weighted_avg.f1_score
    }

    /// Tag the report with the registry entry it describes
    pub fn tagged(mut self, model_name: &str, model_version: u64) -> Self {
        self.model_name = Some(model_name.to_string());
        self.model_version = Some(model_version);
        self
    }

    /// `precision`, `recall`, `f1-score`, `support` of the weighted average
    pub fn weighted_avg_metrics(&self) -> [(&'static str, f64); 4] {
        let w = &self.weighted_avg;
        [
            ("precision", w.precision),
            ("recall", w.recall),
            ("f1-score", w.f1_score),
            ("support", w.support as f64),
        ]
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn check_lengths(y_true: &[i64], y_pred: &[i64]) -> Result<()> {
    if y_true.is_empty() {
        return Err(PipelineError::Evaluation("no samples to score".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Sorted labels present in either input
fn labels_of(y_true: &[i64], y_pred: &[i64]) -> Vec<i64> {
    y_true
        .iter()
        .chain(y_pred)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Per-class precision, recall and F1 with zero for undefined ratios
pub fn classification_report(y_true: &[i64], y_pred: &[i64]) -> Result<ClassificationReport> {
    check_lengths(y_true, y_pred)?;
    let labels = labels_of(y_true, y_pred);
    let total = y_true.len();

    let mut classes = BTreeMap::new();
    let mut per_class = Vec::with_capacity(labels.len());
    for &label in &labels {
        let mut tp = 0;
        let mut predicted = 0;
        let mut actual = 0;
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if p == label {
                predicted += 1;
            }
            if t == label {
                actual += 1;
                if p == label {
                    tp += 1;
                }
            }
        }
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, actual);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let metrics = ClassMetrics {
            precision,
            recall,
            f1_score,
            support: actual,
        };
        per_class.push(metrics);
        classes.insert(label.to_string(), metrics);
    }

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let n_labels = per_class.len() as f64;
    let mean = |f: fn(&ClassMetrics) -> f64| per_class.iter().map(f).sum::<f64>() / n_labels;
    let weighted = |f: fn(&ClassMetrics) -> f64| {
        per_class
            .iter()
            .map(|m| f(m) * m.support as f64)
            .sum::<f64>()
            / total as f64
    };

    Ok(ClassificationReport {
        classes,
        accuracy: ratio(correct, total),
        macro_avg: ClassMetrics {
            precision: mean(|m| m.precision),
            recall: mean(|m| m.recall),
            f1_score: mean(|m| m.f1_score),
            support: total,
        },
        weighted_avg: ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1_score: weighted(|m| m.f1_score),
            support: total,
        },
        model_name: None,
        model_version: None,
    })
}

/// Counts of (true label, predicted label) pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub labels: Vec<i64>,
    /// `counts[i][j]`: rows with true label `labels[i]` predicted as `labels[j]`
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[i64], y_pred: &[i64]) -> Result<Self> {
        check_lengths(y_true, y_pred)?;
        let labels = labels_of(y_true, y_pred);
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in y_true.iter().zip(y_pred) {
            // Both labels come from `labels`, so the searches succeed
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                counts[i][j] += 1;
            }
        }
        Ok(Self { labels, counts })
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn report_matches_hand_computed_values() {
        // 0: tp=3 predicted=4 actual=4; 1: tp=1 predicted=2 actual=2
        let y_true = [0, 0, 0, 0, 1, 1];
        let y_pred = [0, 0, 0, 1, 1, 0];
        let report = classification_report(&y_true, &y_pred).unwrap();

        let zero = report.classes["0"];
        assert!(close(zero.precision, 0.75));
        assert!(close(zero.recall, 0.75));
        assert_eq!(zero.support, 4);
        let one = report.classes["1"];
        assert!(close(one.precision, 0.5));
        assert!(close(one.f1_score, 0.5));

        assert!(close(report.accuracy, 4.0 / 6.0));
        assert!(close(report.macro_avg.f1_score, 0.625));
        assert!(close(report.weighted_f1(), (0.75 * 4.0 + 0.5 * 2.0) / 6.0));
        assert_eq!(report.weighted_avg.support, 6);
    }

    #[test]
    fn undefined_precision_is_zero() {
        let report = classification_report(&[0, 1, 1], &[0, 0, 0]).unwrap();
        assert_eq!(report.classes["1"].precision, 0.0);
        assert_eq!(report.classes["1"].f1_score, 0.0);
    }

    #[test]
    fn json_layout_uses_report_keys() {
        let report = classification_report(&[0, 1], &[0, 1])
            .unwrap()
            .tagged("credit_default", 3);
        let value: serde_json::Value =
            serde_json::from_slice(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["weighted avg"]["f1-score"], 1.0);
        assert_eq!(value["0"]["support"], 1);
        assert_eq!(value["model_name"], "credit_default");
        assert_eq!(value["model_version"], 3);

        let back: ClassificationReport = serde_json::from_value(value).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn untagged_report_has_no_model_keys() {
        let report = classification_report(&[0, 1], &[1, 1]).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("model_name").is_none());
    }

    #[test]
    fn confusion_matrix_counts_pairs() {
        let cm = ConfusionMatrix::new(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]).unwrap();
        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.counts, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.max_count(), 2);
    }

    #[test]
    fn mismatched_lengths_fail() {
        assert!(classification_report(&[0, 1], &[0]).is_err());
        assert!(ConfusionMatrix::new(&[], &[]).is_err());
    }
}
