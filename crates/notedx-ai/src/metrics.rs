//! Classification report: per-class precision, recall and F1 plus averages.
//!
//! Any ratio with a zero denominator is reported as 0.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// UTC, RFC 3339.
    pub generated_at: String,
    pub n_samples: usize,
    pub accuracy: f64,
    /// Keyed by label; covers every label seen in either truth or prediction.
    pub classes: BTreeMap<String, ClassMetrics>,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassMetrics,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Same numbers, ignoring when the report was produced.
    pub fn same_scores(&self, other: &Self) -> bool {
        self.n_samples == other.n_samples
            && self.accuracy == other.accuracy
            && self.classes == other.classes
            && self.macro_avg == other.macro_avg
            && self.weighted_avg == other.weighted_avg
    }
}

/// Score predictions against ground truth. Both slices must be the same
/// length.
pub fn classification_report(y_true: &[String], y_pred: &[String]) -> ClassificationReport {
    let labels: BTreeSet<&str> = y_true
        .iter()
        .chain(y_pred)
        .map(String::as_str)
        .collect();

    let mut classes = BTreeMap::new();
    for label in &labels {
        let mut tp = 0usize;
        let mut predicted = 0usize;
        let mut support = 0usize;
        for (t, p) in y_true.iter().zip(y_pred) {
            let is_true = t == label;
            let is_pred = p == label;
            tp += usize::from(is_true && is_pred);
            predicted += usize::from(is_pred);
            support += usize::from(is_true);
        }
        let precision = ratio(tp, predicted);
        let recall = ratio(tp, support);
        classes.insert(
            label.to_string(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1(precision, recall),
                support,
            },
        );
    }

    let n_samples = y_true.len();
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

    ClassificationReport {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        n_samples,
        accuracy: ratio(correct, n_samples),
        macro_avg: average(&classes, |_| 1.0),
        weighted_avg: average(&classes, |m| m.support as f64),
        classes,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn average(
    classes: &BTreeMap<String, ClassMetrics>,
    weight: impl Fn(&ClassMetrics) -> f64,
) -> ClassMetrics {
    let total: f64 = classes.values().map(&weight).sum();
    let support = classes.values().map(|m| m.support).sum();
    if total == 0.0 {
        return ClassMetrics {
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            support,
        };
    }
    let mean = |field: fn(&ClassMetrics) -> f64| {
        classes.values().map(|m| weight(m) * field(m)).sum::<f64>() / total
    };
    ClassMetrics {
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1_score: mean(|m| m.f1_score),
        support,
    }
}
