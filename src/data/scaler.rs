//! Standard scaler: zero mean / unit variance per feature

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Fitted on the training split once, reused unchanged at inference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub n_samples_seen: usize,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        !self.mean.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> PipelineResult<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::InvalidData("cannot fit scaler on zero rows".into()));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::InvalidData("empty feature matrix".into()))?;
        // Population std; constant columns keep their raw spread
        let std = x.std_axis(Axis(0), 0.0);

        self.mean = mean.to_vec();
        self.scale = std.iter().map(|&s| if s > 0.0 { s } else { 1.0 }).collect();
        self.n_samples_seen = x.nrows();
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.check_width(x.ncols())?;

        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((x - &mean) / &scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Scale a single sample
    pub fn transform_row(&self, row: ArrayView1<f64>) -> PipelineResult<Array1<f64>> {
        self.check_width(row.len())?;

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    fn check_width(&self, width: usize) -> PipelineResult<()> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted("StandardScaler"));
        }
        if width != self.n_features() {
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features(),
                actual: width,
            });
        }
        Ok(())
    }
}
