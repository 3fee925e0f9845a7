//! Evaluation metrics

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::data::TARGET_NAMES;

/// Headline metrics logged for every run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl EvaluationMetrics {
    /// Accuracy plus support-weighted precision / recall / F1
    pub fn compute(y_true: &[usize], y_pred: &[usize]) -> Self {
        let report = ClassificationReport::compute(y_true, y_pred);
        Self {
            accuracy: report.accuracy,
            precision: report.weighted_avg.precision,
            recall: report.weighted_avg.recall,
            f1_score: report.weighted_avg.f1_score,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("precision".to_string(), self.precision),
            ("recall".to_string(), self.recall),
            ("f1_score".to_string(), self.f1_score),
        ])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ClassScores {
    fn to_json(self) -> Value {
        json!({
            "precision": self.precision,
            "recall": self.recall,
            "f1-score": self.f1_score,
            "support": self.support,
        })
    }
}

/// Per-class breakdown with macro and weighted averages
///
/// Only labels seen in either `y_true` or `y_pred` get a row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub per_class: BTreeMap<usize, ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn compute(y_true: &[usize], y_pred: &[usize]) -> Self {
        // (true positives, predicted, support) per present label
        let mut counts: BTreeMap<usize, (usize, usize, usize)> = BTreeMap::new();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            counts.entry(t).or_default().2 += 1;
            counts.entry(p).or_default().1 += 1;
            if t == p {
                counts.entry(t).or_default().0 += 1;
            }
        }

        let per_class: BTreeMap<usize, ClassScores> = counts
            .iter()
            .map(|(&class, &(tp, predicted, support))| {
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                (class, ClassScores { precision, recall, f1_score, support })
            })
            .collect();

        let total: usize = per_class.values().map(|s| s.support).sum();
        let mean = |f: fn(&ClassScores) -> f64| {
            if per_class.is_empty() {
                0.0
            } else {
                per_class.values().map(f).sum::<f64>() / per_class.len() as f64
            }
        };
        let macro_avg = ClassScores {
            precision: mean(|s| s.precision),
            recall: mean(|s| s.recall),
            f1_score: mean(|s| s.f1_score),
            support: total,
        };
        let weighted = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                per_class.values().map(|s| f(s) * s.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = ClassScores {
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1_score: weighted(|s| s.f1_score),
            support: total,
        };

        Self {
            per_class,
            accuracy: accuracy(y_true, y_pred),
            macro_avg,
            weighted_avg,
        }
    }

    /// Dictionary layout keyed by class label, as stored with each run
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (&class, scores) in &self.per_class {
            let label = TARGET_NAMES.get(class).map_or_else(|| class.to_string(), |s| s.to_string());
            out.insert(label, scores.to_json());
        }
        out.insert("accuracy".to_string(), json!(self.accuracy));
        out.insert("macro avg".to_string(), self.macro_avg.to_json());
        out.insert("weighted avg".to_string(), self.weighted_avg.to_json());
        Value::Object(out)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}
