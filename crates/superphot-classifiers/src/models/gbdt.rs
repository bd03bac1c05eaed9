use std::fmt;

use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierType;
use crate::error::{ClassifierError, Result};
use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, normalize_rows, ProbabilisticClassifier};

/// Gradient boosted trees, one binary booster per class (one-vs-rest).
/// Per-class scores are normalised to sum to one.
#[derive(Serialize, Deserialize)]
pub struct GbdtClassifier {
    max_depth: u32,
    num_boost_round: u32,
    learning_rate: f32,
    debug: bool,
    training_optimization_level: u8,
    loss_type: String,
    models: Vec<Option<GBDT>>,
    /// Classes absent from the training labels get a constant score.
    class_present: Vec<bool>,
    n_features: usize,
}

impl fmt::Debug for GbdtClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GbdtClassifier")
            .field("max_depth", &self.max_depth)
            .field("num_boost_round", &self.num_boost_round)
            .field("learning_rate", &self.learning_rate)
            .field("loss_type", &self.loss_type)
            .field("n_models", &self.models.len())
            .finish()
    }
}

impl GbdtClassifier {
    pub fn from_config(config: &ClassifierType) -> Result<Self> {
        match config {
            ClassifierType::Gbdt {
                max_depth,
                num_boost_round,
                learning_rate,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                if loss_type != "LogLikelyhood" {
                    return Err(ClassifierError::Config(format!(
                        "gbdt one-vs-rest requires the LogLikelyhood loss, got {}",
                        loss_type
                    )));
                }
                Ok(GbdtClassifier {
                    max_depth: *max_depth,
                    num_boost_round: *num_boost_round,
                    learning_rate: *learning_rate,
                    debug: *debug,
                    training_optimization_level: *training_optimization_level,
                    loss_type: loss_type.clone(),
                    models: Vec::new(),
                    class_present: Vec::new(),
                    n_features: 0,
                })
            }
            other => Err(ClassifierError::Config(format!(
                "expected gbdt parameters, got {}",
                other.name()
            ))),
        }
    }

    fn booster_config(&self, feature_size: usize) -> Config {
        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.learning_rate);
        config.set_max_depth(self.max_depth);
        config.set_iterations(self.num_boost_round as usize);
        config.set_debug(self.debug);
        config.set_training_optimization_level(self.training_optimization_level);
        config.set_loss(&self.loss_type);
        config
    }

    fn to_data(x: &Array2<f64>, labels: Option<&[f32]>) -> DataVec {
        let mut data = DataVec::with_capacity(x.nrows());
        for (i, row) in x.rows().enumerate() {
            let features = row.iter().map(|&v| v as f32).collect();
            let label = labels.map_or(0.0, |l| l[i]);
            data.push(Data::new_training_data(features, 1.0, label, None));
        }
        data
    }
}

impl ProbabilisticClassifier for GbdtClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(x, y, n_classes)?;
        let config = self.booster_config(x.ncols());
        self.models.clear();
        self.class_present = vec![false; n_classes];
        for &label in y {
            self.class_present[label] = true;
        }

        for class in 0..n_classes {
            if !self.class_present[class] {
                self.models.push(None);
                continue;
            }
            // LogLikelyhood expects labels in {-1, 1}
            let labels: Vec<f32> = y
                .iter()
                .map(|&l| if l == class { 1.0 } else { -1.0 })
                .collect();
            let mut train = Self::to_data(x, Some(&labels));
            let mut booster = GBDT::new(&config);
            booster.fit(&mut train);
            self.models.push(Some(booster));
            debug!("Fitted gbdt booster for class index {}", class);
        }
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.models.is_empty() {
            return Err(ClassifierError::Unfitted("GbdtClassifier"));
        }
        if x.ncols() != self.n_features {
            return Err(ClassifierError::Data(format!(
                "gbdt was fitted on {} features but got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let n_classes = self.models.len();
        let test = Self::to_data(x, None);
        let mut proba = Array2::zeros(x.nrows(), n_classes);
        for (class, model) in self.models.iter().enumerate() {
            if let Some(booster) = model {
                for (r, score) in booster.predict(&test).into_iter().enumerate() {
                    proba[(r, class)] = f64::from(score).clamp(0.0, 1.0);
                }
            }
        }
        normalize_rows(&mut proba);
        Ok(proba)
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_vs_rest_probabilities() {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.05;
            rows.push(vec![0.0 + jitter, 1.0]);
            y.push(0);
            rows.push(vec![5.0 + jitter, 1.0]);
            y.push(1);
            rows.push(vec![10.0 + jitter, 1.0]);
            y.push(2);
        }
        let x = Array2::from_rows(&rows, 2).unwrap();
        let config = ClassifierType::Gbdt {
            max_depth: 3,
            num_boost_round: 20,
            learning_rate: 0.3,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        };
        let mut gbdt = GbdtClassifier::from_config(&config).unwrap();
        gbdt.fit(&x, &y, 3).unwrap();
        let proba = gbdt.predict_proba(&x).unwrap();
        assert_eq!(proba.shape(), (30, 3));
        for (r, row) in proba.rows().enumerate() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            assert_eq!(crate::math::vector::argmax(row), Some(y[r]));
        }
    }

    #[test]
    fn rejects_other_losses() {
        let config = ClassifierType::Gbdt {
            max_depth: 3,
            num_boost_round: 5,
            learning_rate: 0.1,
            debug: false,
            training_optimization_level: 2,
            loss_type: "SquaredError".to_string(),
        };
        assert!(matches!(
            GbdtClassifier::from_config(&config),
            Err(ClassifierError::Config(_))
        ));
    }
}
