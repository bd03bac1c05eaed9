use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use serde::{Deserialize, Serialize};

use crate::config::ClassifierType;
use crate::error::{ClassifierError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, normalize_rows, ProbabilisticClassifier};

/// RBF-kernel SVM with Platt-scaled probabilities, one model per class
/// (one-vs-rest). Per-class probabilities are normalised to sum to one.
#[derive(Debug, Serialize, Deserialize)]
pub struct SvmClassifier {
    c: f64,
    gamma: f64,
    eps: f64,
    models: Vec<Option<Svm<f64, Pr>>>,
    n_features: usize,
}

fn to_ndarray(x: &Array2<f64>) -> Result<ndarray::Array2<f64>> {
    ndarray::Array2::from_shape_vec(x.shape(), x.to_vec())
        .map_err(|e| ClassifierError::Data(e.to_string()))
}

impl SvmClassifier {
    pub fn from_config(config: &ClassifierType) -> Result<Self> {
        match config {
            ClassifierType::Svm { c, gamma, eps } => {
                if *gamma <= 0.0 || *c <= 0.0 {
                    return Err(ClassifierError::Config(format!(
                        "svm requires positive c and gamma, got c={} gamma={}",
                        c, gamma
                    )));
                }
                Ok(SvmClassifier {
                    c: *c,
                    gamma: *gamma,
                    eps: *eps,
                    models: Vec::new(),
                    n_features: 0,
                })
            }
            other => Err(ClassifierError::Config(format!(
                "expected svm parameters, got {}",
                other.name()
            ))),
        }
    }
}

impl ProbabilisticClassifier for SvmClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(x, y, n_classes)?;
        let records = to_ndarray(x)?;
        // exp(-gamma |a-b|^2) corresponds to linfa's exp(-|a-b|^2 / eps)
        let params: SvmParams<f64, Pr> = Svm::<f64, Pr>::params()
            .eps(self.eps)
            .pos_neg_weights(self.c, self.c)
            .gaussian_kernel(1.0 / self.gamma);

        self.models.clear();
        for class in 0..n_classes {
            if !y.contains(&class) {
                self.models.push(None);
                continue;
            }
            let targets = ndarray::Array1::from_vec(y.iter().map(|&l| l == class).collect());
            let dataset = Dataset::new(records.clone(), targets);
            let model = params
                .fit(&dataset)
                .map_err(|e| ClassifierError::Training(e.to_string()))?;
            self.models.push(Some(model));
        }
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.models.is_empty() {
            return Err(ClassifierError::Unfitted("SvmClassifier"));
        }
        if x.ncols() != self.n_features {
            return Err(ClassifierError::Data(format!(
                "svm was fitted on {} features but got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let records = to_ndarray(x)?;
        let mut proba = Array2::zeros(x.nrows(), self.models.len());
        for (class, model) in self.models.iter().enumerate() {
            if let Some(model) = model {
                let predictions = model.predict(records.clone());
                for (r, p) in predictions.targets().iter().enumerate() {
                    proba[(r, class)] = f64::from(**p);
                }
            }
        }
        normalize_rows(&mut proba);
        Ok(proba)
    }

    fn name(&self) -> &str {
        "svm"
    }
}
