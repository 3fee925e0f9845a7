//! Multinomial logistic regression trained with full-batch gradient descent

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_training_input, softmax_rows, Classifier, Params};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Stop once every gradient component falls below this
    pub tol: f64,
    pub random_state: u64,

    coef: Option<Array2<f64>>,
    intercept: Option<Array1<f64>>,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
            random_state: 42,
            coef: None,
            intercept: None,
            n_iter: 0,
        }
    }
}

impl LogisticRegression {
    pub fn new(random_state: u64, max_iter: usize) -> Self {
        Self { random_state, max_iter, ..Self::default() }
    }

    /// Iterations actually run by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn scores(&self, x: &Array2<f64>, coef: &Array2<f64>, intercept: &Array1<f64>) -> Array2<f64> {
        let mut scores = x.dot(&coef.t()) + intercept;
        softmax_rows(&mut scores);
        scores
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn params(&self) -> Params {
        [
            ("C", self.c.to_string()),
            ("max_iter", self.max_iter.to_string()),
            ("learning_rate", self.learning_rate.to_string()),
            ("tol", self.tol.to_string()),
            ("random_state", self.random_state.to_string()),
            ("multi_class", "multinomial".to_string()),
            ("penalty", "l2".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> PipelineResult<()> {
        let n_classes = check_training_input(x, y)?;
        let (n, d) = x.dim();
        let penalty = 1.0 / (self.c * n as f64);

        let mut onehot = Array2::<f64>::zeros((n, n_classes));
        for (i, &label) in y.iter().enumerate() {
            onehot[[i, label]] = 1.0;
        }

        // Zero start keeps the fit deterministic regardless of seed
        let mut coef = Array2::<f64>::zeros((n_classes, d));
        let mut intercept = Array1::<f64>::zeros(n_classes);

        self.n_iter = 0;
        for _ in 0..self.max_iter {
            self.n_iter += 1;
            let proba = self.scores(x, &coef, &intercept);
            let residual = proba - &onehot;

            let grad_coef = residual.t().dot(x) / n as f64 + &coef * penalty;
            let grad_intercept = residual
                .mean_axis(Axis(0))
                .ok_or_else(|| PipelineError::InvalidData("empty residual".into()))?;

            coef = coef - &grad_coef * self.learning_rate;
            intercept = intercept - &grad_intercept * self.learning_rate;

            let max_grad = grad_coef
                .iter()
                .chain(grad_intercept.iter())
                .fold(0.0_f64, |m, g| m.max(g.abs()));
            if max_grad < self.tol {
                break;
            }
        }

        tracing::debug!(iterations = self.n_iter, "logistic regression converged");
        self.coef = Some(coef);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        let (coef, intercept) = match (&self.coef, &self.intercept) {
            (Some(c), Some(i)) => (c, i),
            _ => return Err(PipelineError::NotFitted("LogisticRegression")),
        };
        if x.ncols() != coef.ncols() {
            return Err(PipelineError::ShapeMismatch { expected: coef.ncols(), actual: x.ncols() });
        }
        Ok(self.scores(x, coef, intercept))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::accuracy;
    use crate::ml::test_support::iris_split;

    #[test]
    fn test_fits_iris() {
        let split = iris_split();
        let mut model = LogisticRegression::default();
        model.fit(&split.x_train, &split.y_train).unwrap();

        let predicted = model.predict(&split.x_test).unwrap();
        assert!(accuracy(&split.y_test, &predicted) >= 0.85);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let split = iris_split();
        let mut model = LogisticRegression::new(42, 200);
        model.fit(&split.x_train, &split.y_train).unwrap();

        let proba = model.predict_proba(&split.x_test).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(model.n_iter() <= 200);
    }

    #[test]
    fn test_unfitted_model_errors() {
        let model = LogisticRegression::default();
        let x = Array2::<f64>::zeros((1, 4));
        assert!(matches!(model.predict_proba(&x), Err(PipelineError::NotFitted(_))));
    }

    #[test]
    fn test_params_include_regularization() {
        let params = LogisticRegression::default().params();
        assert_eq!(params.get("C").map(String::as_str), Some("1"));
        assert_eq!(params.get("max_iter").map(String::as_str), Some("1000"));
    }
}
