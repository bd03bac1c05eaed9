use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierType, Criterion};
use crate::error::{ClassifierError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, ProbabilisticClassifier};
use crate::models::decision_tree::{DecisionTree, TreeParams};

/// Bagged ensemble of CART trees. Probabilities are the mean of the leaf
/// class distributions across trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_estimators: usize,
    params: TreeParams,
    random_state: Option<u64>,
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn new(
        n_estimators: usize,
        criterion: Criterion,
        max_features: Option<usize>,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
        random_state: Option<u64>,
    ) -> Self {
        RandomForestClassifier {
            n_estimators: n_estimators.max(1),
            params: TreeParams {
                criterion,
                max_depth,
                min_samples_leaf,
                max_features,
            },
            random_state,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }

    pub fn from_config(config: &ClassifierType, random_state: Option<u64>) -> Result<Self> {
        match config {
            ClassifierType::RandomForest {
                n_estimators,
                criterion,
                max_features,
                max_depth,
                min_samples_leaf,
            } => Ok(Self::new(
                *n_estimators,
                *criterion,
                *max_features,
                *max_depth,
                *min_samples_leaf,
                random_state,
            )),
            other => Err(ClassifierError::Config(format!(
                "expected random forest parameters, got {}",
                other.name()
            ))),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl ProbabilisticClassifier for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(x, y, n_classes)?;
        let n_samples = x.nrows();
        let base_seed = self
            .random_state
            .unwrap_or_else(|| StdRng::from_entropy().gen());
        let params = self.params;

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = StdRng::seed_from_u64(seed);
                let rows: Vec<usize> = (0..n_samples)
                    .map(|_| rng.gen_range(0..n_samples))
                    .collect();
                DecisionTree::fit(x, y, n_classes, rows, &params, &mut rng)
            })
            .collect();
        self.n_classes = n_classes;
        self.n_features = x.ncols();

        debug!(
            "Random forest fitted {} trees on {} samples",
            self.trees.len(),
            n_samples
        );
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(ClassifierError::Unfitted("RandomForestClassifier"));
        }
        if x.ncols() != self.n_features {
            return Err(ClassifierError::Data(format!(
                "random forest was fitted on {} features but got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let mut proba = Array2::zeros(x.nrows(), self.n_classes);
        let weight = 1.0 / self.trees.len() as f64;
        for (r, sample) in x.rows().enumerate() {
            let out = proba.row_slice_mut(r);
            for tree in &self.trees {
                for (p, v) in out.iter_mut().zip(tree.leaf_distribution(sample)) {
                    *p += v * weight;
                }
            }
        }
        Ok(proba)
    }

    fn name(&self) -> &str {
        "rf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            let jitter = (i as f64) * 0.01;
            rows.push(vec![jitter, 1.0 - jitter]);
            y.push(0);
            rows.push(vec![3.0 + jitter, -2.0 + jitter]);
            y.push(1);
        }
        (Array2::from_rows(&rows, 2).unwrap(), y)
    }

    #[test]
    fn probabilities_are_normalised_and_correct() {
        let (x, y) = clusters();
        let mut rf = RandomForestClassifier::new(25, Criterion::Entropy, Some(1), None, 1, Some(9));
        rf.fit(&x, &y, 2).unwrap();
        assert_eq!(rf.n_trees(), 25);
        let proba = rf.predict_proba(&x).unwrap();
        for (r, row) in proba.rows().enumerate() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(row[y[r]] > 0.5);
        }
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = clusters();
        let mut a = RandomForestClassifier::new(10, Criterion::Gini, None, Some(3), 1, Some(4));
        let mut b = a.clone();
        a.fit(&x, &y, 2).unwrap();
        b.fit(&x, &y, 2).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn unfitted_forest_refuses_to_predict() {
        let rf = RandomForestClassifier::new(5, Criterion::Gini, None, None, 1, None);
        let x = Array2::zeros(1, 2);
        assert!(matches!(
            rf.predict_proba(&x),
            Err(ClassifierError::Unfitted(_))
        ));
    }
}
