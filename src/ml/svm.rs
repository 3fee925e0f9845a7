//! RBF-kernel SVM, one-vs-rest, trained with kernelized Pegasos

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_training_input, softmax_rows, Classifier, Params};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Svm {
    pub c: f64,
    /// `None` resolves to `1 / (n_features * Var(X))` at fit time
    pub gamma: Option<f64>,
    /// Passes over the training set per class
    pub epochs: usize,
    pub random_state: u64,

    support_vectors: Option<Array2<f64>>,
    /// One row per class, already divided by `lambda * T`
    dual_coef: Option<Array2<f64>>,
    fitted_gamma: f64,
}

impl Default for Svm {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            epochs: 20,
            random_state: 42,
            support_vectors: None,
            dual_coef: None,
            fitted_gamma: 0.0,
        }
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * dist).exp()
}

impl Svm {
    pub fn new(random_state: u64) -> Self {
        Self { random_state, ..Self::default() }
    }

    pub fn gamma(&self) -> f64 {
        self.fitted_gamma
    }

    /// Raw one-vs-rest margins, one column per class
    pub fn decision_function(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(PipelineError::NotFitted("Svm")),
        };
        if x.ncols() != sv.ncols() {
            return Err(PipelineError::ShapeMismatch { expected: sv.ncols(), actual: x.ncols() });
        }

        let kernel = Array2::from_shape_fn((x.nrows(), sv.nrows()), |(i, j)| {
            rbf(x.row(i), sv.row(j), self.fitted_gamma)
        });
        Ok(kernel.dot(&coef.t()))
    }
}

impl Classifier for Svm {
    fn name(&self) -> &'static str {
        "svm"
    }

    fn params(&self) -> Params {
        [
            ("C", self.c.to_string()),
            ("kernel", "rbf".to_string()),
            ("gamma", self.gamma.map_or("scale".to_string(), |g| g.to_string())),
            ("epochs", self.epochs.to_string()),
            ("probability", "true".to_string()),
            ("random_state", self.random_state.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> PipelineResult<()> {
        let n_classes = check_training_input(x, y)?;
        let (n, d) = x.dim();

        let gamma = match self.gamma {
            Some(g) => g,
            None => {
                let var = x.var(0.0);
                if var > 0.0 { 1.0 / (d as f64 * var) } else { 1.0 }
            }
        };

        let gram = Array2::from_shape_fn((n, n), |(i, j)| rbf(x.row(i), x.row(j), gamma));
        let lambda = 1.0 / (self.c * n as f64);
        let steps = (self.epochs * n).max(1);
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut dual_coef = Array2::<f64>::zeros((n_classes, n));

        for class in 0..n_classes {
            let sign: Vec<f64> = y.iter().map(|&l| if l == class { 1.0 } else { -1.0 }).collect();
            let mut alpha = vec![0.0_f64; n];

            for t in 1..=steps {
                let i = rng.gen_range(0..n);
                let margin: f64 = (0..n)
                    .filter(|&j| alpha[j] > 0.0)
                    .map(|j| alpha[j] * sign[j] * gram[[j, i]])
                    .sum::<f64>()
                    / (lambda * t as f64);
                if sign[i] * margin < 1.0 {
                    alpha[i] += 1.0;
                }
            }

            let scale = lambda * steps as f64;
            for j in 0..n {
                dual_coef[[class, j]] = alpha[j] * sign[j] / scale;
            }
        }

        self.support_vectors = Some(x.clone());
        self.dual_coef = Some(dual_coef);
        self.fitted_gamma = gamma;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        let mut scores = self.decision_function(x)?;
        softmax_rows(&mut scores);
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::accuracy;
    use crate::ml::test_support::iris_split;
    use ndarray::array;

    #[test]
    fn test_rbf_kernel() {
        let a = array![0.0, 0.0];
        let b = array![1.0, 1.0];
        assert_eq!(rbf(a.view(), a.view(), 0.5), 1.0);
        assert!((rbf(a.view(), b.view(), 0.5) - (-1.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_fits_iris() {
        let split = iris_split();
        let mut svm = Svm::default();
        svm.fit(&split.x_train, &split.y_train).unwrap();

        let predicted = svm.predict(&split.x_test).unwrap();
        assert!(accuracy(&split.y_test, &predicted) >= 0.85);
        assert!(svm.gamma() > 0.0);
    }

    #[test]
    fn test_probabilities_follow_margins() {
        let split = iris_split();
        let mut svm = Svm::new(3);
        svm.fit(&split.x_train, &split.y_train).unwrap();

        let margins = svm.decision_function(&split.x_test).unwrap();
        let proba = svm.predict_proba(&split.x_test).unwrap();
        for (m, p) in margins.rows().into_iter().zip(proba.rows()) {
            assert!((p.sum() - 1.0).abs() < 1e-9);
            assert_eq!(
                crate::ml::argmax(m.iter().copied()),
                crate::ml::argmax(p.iter().copied())
            );
        }
    }

    #[test]
    fn test_explicit_gamma_is_kept() {
        let split = iris_split();
        let mut svm = Svm { gamma: Some(0.5), epochs: 2, ..Svm::default() };
        svm.fit(&split.x_train, &split.y_train).unwrap();
        assert_eq!(svm.gamma(), 0.5);
        assert_eq!(svm.params().get("gamma").map(String::as_str), Some("0.5"));
    }
}
