//! Serving-side model: the fitted scaler and classifier, loaded once

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};

use crate::data::{processor::load_scaler, StandardScaler, FEATURE_COUNT, TARGET_NAMES};
use crate::error::{PipelineError, PipelineResult};
use crate::ml::{argmax, Classifier, TrainedModel};

/// Outcome of scoring one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub label: &'static str,
    pub probability: f64,
    pub all_probabilities: BTreeMap<String, f64>,
}

/// Immutable model/scaler pair shared by every request
#[derive(Debug)]
pub struct Predictor {
    model: TrainedModel,
    scaler: StandardScaler,
    loaded_at: DateTime<Utc>,
}

impl Predictor {
    pub fn new(model: TrainedModel, scaler: StandardScaler) -> PipelineResult<Self> {
        if scaler.n_features() != FEATURE_COUNT {
            return Err(PipelineError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: scaler.n_features(),
            });
        }
        Ok(Self { model, scaler, loaded_at: Utc::now() })
    }

    pub fn load(model_path: &Path, scaler_path: &Path) -> PipelineResult<Self> {
        let model = TrainedModel::load(model_path)?;
        let scaler = load_scaler(scaler_path)?;
        let predictor = Self::new(model, scaler)?;
        tracing::info!(
            model = predictor.model_name(),
            path = %model_path.display(),
            "Model and scaler loaded successfully"
        );
        Ok(predictor)
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn predict(&self, features: [f64; FEATURE_COUNT]) -> PipelineResult<Prediction> {
        let scaled: Array1<f64> = self.scaler.transform_row(Array1::from(features.to_vec()).view())?;
        let input = scaled
            .into_shape_with_order((1, FEATURE_COUNT))
            .map_err(|e| PipelineError::InvalidData(e.to_string()))?;

        let proba: Array2<f64> = self.model.predict_proba(&input)?;
        let row = proba.row(0);
        if row.len() != TARGET_NAMES.len() {
            return Err(PipelineError::ShapeMismatch { expected: TARGET_NAMES.len(), actual: row.len() });
        }

        let class_index = argmax(row.iter().copied());
        let all_probabilities = TARGET_NAMES
            .iter()
            .zip(row.iter())
            .map(|(name, p)| (name.to_string(), *p))
            .collect();

        Ok(Prediction {
            class_index,
            label: TARGET_NAMES[class_index],
            probability: row[class_index],
            all_probabilities,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::{dataset, DataProcessor};
    use crate::ml::LogisticRegression;

    pub fn fitted_predictor() -> Predictor {
        let mut processor = DataProcessor::default();
        let split = processor.preprocess(&dataset::load()).unwrap();
        let mut model = TrainedModel::LogisticRegression(LogisticRegression::default());
        model.fit(&split.x_train, &split.y_train).unwrap();
        Predictor::new(model, processor.scaler().clone()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::fitted_predictor;
    use super::*;
    use crate::ml::test_support::iris_split;
    use crate::ml::LogisticRegression;

    #[test]
    fn test_predicts_canonical_samples() {
        let predictor = fitted_predictor();

        let setosa = predictor.predict([5.1, 3.5, 1.4, 0.2]).unwrap();
        assert_eq!(setosa.label, "setosa");
        assert_eq!(setosa.class_index, 0);

        let virginica = predictor.predict([7.7, 3.0, 6.1, 2.3]).unwrap();
        assert_eq!(virginica.label, "virginica");
    }

    #[test]
    fn test_probabilities_cover_all_labels() {
        let predictor = fitted_predictor();
        let prediction = predictor.predict([6.0, 2.9, 4.5, 1.5]).unwrap();

        assert_eq!(prediction.all_probabilities.len(), 3);
        let total: f64 = prediction.all_probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(prediction.all_probabilities[prediction.label], prediction.probability);
    }

    #[test]
    fn test_rejects_scaler_of_wrong_width() {
        let split = iris_split();
        let mut model = TrainedModel::LogisticRegression(LogisticRegression::new(42, 10));
        model.fit(&split.x_train, &split.y_train).unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&ndarray::array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(
            Predictor::new(model, scaler),
            Err(PipelineError::ShapeMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_load_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = Predictor::load(&dir.path().join("m.json"), &dir.path().join("s.json"));
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }
}
