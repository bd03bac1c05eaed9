use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::resampling::SamplingTarget;

/// Split quality measure for the random forest trees.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
}

impl FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            _ => Err(format!("Unknown split criterion: {}", s)),
        }
    }
}

/// Supported classifier types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ClassifierType {
    RandomForest {
        n_estimators: usize,
        criterion: Criterion,
        /// Features considered per split; `None` means all of them.
        max_features: Option<usize>,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
    },
    Mlp {
        hidden_layer_sizes: Vec<usize>,
        /// L2 penalty.
        alpha: f64,
        learning_rate: f64,
        max_iter: usize,
        batch_size: usize,
        early_stopping: bool,
        validation_fraction: f64,
        n_iter_no_change: usize,
        tol: f64,
    },
    Gbdt {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
    #[cfg(feature = "svm")]
    Svm {
        c: f64,
        gamma: f64,
        eps: f64,
    },
}

impl ClassifierType {
    pub fn random_forest() -> Self {
        ClassifierType::RandomForest {
            n_estimators: 100,
            criterion: Criterion::Entropy,
            max_features: Some(5),
            max_depth: None,
            min_samples_leaf: 1,
        }
    }

    pub fn mlp() -> Self {
        ClassifierType::Mlp {
            hidden_layer_sizes: vec![10, 5],
            alpha: 1e-5,
            learning_rate: 1e-3,
            max_iter: 200,
            batch_size: 200,
            early_stopping: true,
            validation_fraction: 0.1,
            n_iter_no_change: 10,
            tol: 1e-4,
        }
    }

    pub fn gbdt() -> Self {
        ClassifierType::Gbdt {
            max_depth: 6,
            num_boost_round: 50,
            learning_rate: 0.1,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }

    #[cfg(feature = "svm")]
    pub fn svm() -> Self {
        ClassifierType::Svm {
            c: 1000.0,
            gamma: 0.1,
            eps: 1e-3,
        }
    }

    /// Short name as accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierType::RandomForest { .. } => "rf",
            ClassifierType::Mlp { .. } => "mlp",
            ClassifierType::Gbdt { .. } => "gbdt",
            #[cfg(feature = "svm")]
            ClassifierType::Svm { .. } => "svm",
        }
    }
}

impl Default for ClassifierType {
    fn default() -> Self {
        ClassifierType::random_forest()
    }
}

impl FromStr for ClassifierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rf" | "random_forest" => Ok(ClassifierType::random_forest()),
            "mlp" => Ok(ClassifierType::mlp()),
            "gbdt" => Ok(ClassifierType::gbdt()),
            #[cfg(feature = "svm")]
            "svm" => Ok(ClassifierType::svm()),
            _ => Err(format!(
                "Unknown classifier type: {}. Expected one of rf, mlp, gbdt, svm (svm requires `--features svm`)",
                s
            )),
        }
    }
}

/// Supported resampling strategies.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum SamplerType {
    /// Multivariate Gaussian class balancing.
    Mvg { target: SamplingTarget },
    Smote { k_neighbors: usize },
}

impl SamplerType {
    pub fn name(&self) -> &'static str {
        match self {
            SamplerType::Mvg { .. } => "mvg",
            SamplerType::Smote { .. } => "smote",
        }
    }
}

impl Default for SamplerType {
    fn default() -> Self {
        SamplerType::Mvg {
            target: SamplingTarget::SamplesPerClass(1000),
        }
    }
}

impl FromStr for SamplerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mvg" => Ok(SamplerType::default()),
            "smote" => Ok(SamplerType::Smote { k_neighbors: 5 }),
            _ => Err(format!(
                "Unknown sampler type: {}. Expected one of mvg, smote",
                s
            )),
        }
    }
}

/// Configuration of a scaler → sampler → classifier pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub classifier: ClassifierType,
    pub sampler: SamplerType,
    /// Seed shared by the sampler and the classifier. `None` draws from entropy.
    pub random_state: Option<u64>,
}

impl PipelineConfig {
    pub fn new(classifier: ClassifierType, sampler: SamplerType, random_state: Option<u64>) -> Self {
        Self {
            classifier,
            sampler,
            random_state,
        }
    }
}
