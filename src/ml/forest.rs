//! Random forest of CART trees (Gini impurity, bootstrap sampling)

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{check_training_input, Classifier, Params};
use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        proba: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeParams {
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
    n_classes: usize,
}

impl DecisionTree {
    fn build(
        x: &Array2<f64>,
        y: &[usize],
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = DecisionTree::default();
        tree.grow(x, y, samples, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(y, &samples, params.n_classes);
        let total = samples.len() as f64;
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: counts.iter().map(|&c| c as f64 / total).collect(),
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = params.max_depth.map_or(false, |max| depth >= max);
        if pure || depth_reached || samples.len() < params.min_samples_split {
            return node_id;
        }

        let mut features: Vec<usize> = (0..x.ncols()).collect();
        features.shuffle(rng);

        // Keep searching past max_features until some feature separates the node
        let mut best: Option<(usize, f64, f64)> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= params.max_features && best.is_some() {
                break;
            }
            if let Some((threshold, impurity)) = best_threshold(x, y, &samples, feature, params.n_classes) {
                if best.map_or(true, |(_, _, b)| impurity < b) {
                    best = Some((feature, threshold, impurity));
                }
            }
        }

        let Some((feature, threshold, _)) = best else {
            return node_id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| x[[i, feature]] <= threshold);

        let left = self.grow(x, y, left_samples, depth + 1, params, rng);
        let right = self.grow(x, y, right_samples, depth + 1, params, rng);
        self.nodes[node_id] = Node::Split { feature, threshold, left, right };
        node_id
    }

    fn leaf_proba(&self, row: &[f64]) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { proba } => return proba,
                Node::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

fn class_counts(y: &[usize], samples: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &i in samples {
        counts[y[i]] += 1;
    }
    counts
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

/// Best midpoint threshold on one feature, with its weighted child impurity
fn best_threshold(
    x: &Array2<f64>,
    y: &[usize],
    samples: &[usize],
    feature: usize,
    n_classes: usize,
) -> Option<(f64, f64)> {
    let mut sorted: Vec<usize> = samples.to_vec();
    sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

    let n = sorted.len();
    let mut left = vec![0usize; n_classes];
    let mut right = class_counts(y, &sorted, n_classes);
    let mut best: Option<(f64, f64)> = None;

    for pos in 1..n {
        let moved = sorted[pos - 1];
        left[y[moved]] += 1;
        right[y[moved]] -= 1;

        let prev = x[[moved, feature]];
        let next = x[[sorted[pos], feature]];
        if prev >= next {
            continue;
        }

        let impurity = (pos as f64 * gini(&left, pos) + (n - pos) as f64 * gini(&right, n - pos)) / n as f64;
        if best.map_or(true, |(_, b)| impurity < b) {
            best = Some(((prev + next) / 2.0, impurity));
        }
    }
    best
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub bootstrap: bool,
    pub random_state: u64,

    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            bootstrap: true,
            random_state: 42,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }
}

impl RandomForest {
    pub fn new(random_state: u64, n_estimators: usize) -> Self {
        Self { random_state, n_estimators, ..Self::default() }
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    fn max_features(n_features: usize) -> usize {
        ((n_features as f64).sqrt().floor() as usize).max(1)
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn params(&self) -> Params {
        [
            ("n_estimators", self.n_estimators.to_string()),
            ("max_depth", self.max_depth.map_or("None".to_string(), |d| d.to_string())),
            ("min_samples_split", self.min_samples_split.to_string()),
            ("max_features", "sqrt".to_string()),
            ("bootstrap", self.bootstrap.to_string()),
            ("criterion", "gini".to_string()),
            ("random_state", self.random_state.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> PipelineResult<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidData("n_estimators must be positive".into()));
        }
        let n_classes = check_training_input(x, y)?;
        let n = x.nrows();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
            max_features: Self::max_features(x.ncols()),
            n_classes,
        };

        let mut rng = StdRng::seed_from_u64(self.random_state);
        self.trees = (0..self.n_estimators)
            .map(|_| {
                let samples = if self.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::build(x, y, samples, &params, &mut rng)
            })
            .collect();

        self.n_classes = n_classes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> PipelineResult<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("RandomForest"));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeMismatch { expected: self.n_features, actual: x.ncols() });
        }

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let row = row.to_vec();
            for tree in &self.trees {
                // A bootstrap sample may miss a class entirely
                for (class, p) in tree.leaf_proba(&row).iter().enumerate() {
                    proba[[i, class]] += p;
                }
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metrics::accuracy;
    use crate::ml::test_support::iris_split;
    use ndarray::array;

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5, 0, 0], 5), 0.0);
        assert!((gini(&[1, 1], 2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_best_threshold_separates_classes() {
        let x = array![[1.0], [2.0], [8.0], [9.0]];
        let y = [0, 0, 1, 1];
        let (threshold, impurity) = best_threshold(&x, &y, &[0, 1, 2, 3], 0, 2).unwrap();
        assert_eq!(threshold, 5.0);
        assert_eq!(impurity, 0.0);
    }

    #[test]
    fn test_constant_feature_has_no_split() {
        let x = array![[3.0], [3.0], [3.0]];
        assert!(best_threshold(&x, &[0, 1, 0], &[0, 1, 2], 0, 2).is_none());
    }

    #[test]
    fn test_fits_iris() {
        let split = iris_split();
        let mut forest = RandomForest::new(42, 25);
        forest.fit(&split.x_train, &split.y_train).unwrap();

        assert_eq!(forest.trees().len(), 25);
        let predicted = forest.predict(&split.x_test).unwrap();
        assert!(accuracy(&split.y_test, &predicted) >= 0.85);

        let proba = forest.predict_proba(&split.x_test).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_max_depth_is_respected() {
        let split = iris_split();
        let mut forest = RandomForest { max_depth: Some(2), ..RandomForest::new(1, 5) };
        forest.fit(&split.x_train, &split.y_train).unwrap();
        assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_same_seed_same_forest() {
        let split = iris_split();
        let mut a = RandomForest::new(9, 10);
        let mut b = RandomForest::new(9, 10);
        a.fit(&split.x_train, &split.y_train).unwrap();
        b.fit(&split.x_train, &split.y_train).unwrap();
        assert_eq!(
            a.predict_proba(&split.x_test).unwrap(),
            b.predict_proba(&split.x_test).unwrap()
        );
    }
}
