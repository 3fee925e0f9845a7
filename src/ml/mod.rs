//! Classifiers, evaluation metrics and the persisted model artifact
//!
//! All classifiers share the [`Classifier`] trait so the trainer can fit,
//! evaluate and log them uniformly. The fitted winner is wrapped in
//! [`TrainedModel`] and written to disk as tagged JSON.

pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod svm;

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::storage::{load_json, save_json};
use crate::error::{PipelineError, PipelineResult};

pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use metrics::{ClassificationReport, EvaluationMetrics};
pub use svm::Svm;

/// Parameters reported to the experiment tracker
pub type Params = BTreeMap<String, String>;

pub trait Classifier {
    /// Short identifier used for runs and registered models
    fn name(&self) -> &'static str;

    fn params(&self) -> Params;

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> PipelineResult<()>;

    /// Per-class probabilities, one row per sample
    fn predict_proba(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>>;

    fn predict(&self, x: &Array2<f64>) -> PipelineResult<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.axis_iter(Axis(0)).map(|row| argmax(row.iter().copied())).collect())
    }
}

/// Fitted model as persisted by the trainer and loaded by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    Svm(Svm),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Svm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::Svm(m) => m,
        }
    }

    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        save_json(self, path)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        load_json(path)
    }
}

impl Classifier for TrainedModel {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn params(&self) -> Params {
        self.inner().params()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> PipelineResult<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.inner().predict_proba(x)
    }
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

/// Row-wise softmax in place
pub(crate) fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

pub(crate) fn check_training_input(x: &Array2<f64>, y: &[usize]) -> PipelineResult<usize> {
    if x.nrows() == 0 {
        return Err(PipelineError::InvalidData("empty training set".into()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeMismatch { expected: x.nrows(), actual: y.len() });
    }
    Ok(y.iter().copied().max().unwrap_or(0) + 1)
}
