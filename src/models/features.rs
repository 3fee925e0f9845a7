//! Request and response bodies of the prediction endpoint

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::data::FEATURE_COUNT;

/// Iris measurements in cm
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Validate, PartialEq)]
pub struct IrisFeatures {
    #[validate(range(min = 0.0, max = 10.0))]
    pub sepal_length: f64,
    #[validate(range(min = 0.0, max = 10.0))]
    pub sepal_width: f64,
    #[validate(range(min = 0.0, max = 10.0))]
    pub petal_length: f64,
    #[validate(range(min = 0.0, max = 10.0))]
    pub petal_width: f64,
}

impl IrisFeatures {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [self.sepal_length, self.sepal_width, self.petal_length, self.petal_width]
    }
}

impl From<[f64; FEATURE_COUNT]> for IrisFeatures {
    fn from(v: [f64; FEATURE_COUNT]) -> Self {
        Self {
            sepal_length: v[0],
            sepal_width: v[1],
            petal_length: v[2],
            petal_width: v[3],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: String,
    pub probability: f64,
    pub all_probabilities: BTreeMap<String, f64>,
    pub timestamp: String,
}
