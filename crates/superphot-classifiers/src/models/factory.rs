use serde::{Deserialize, Serialize};

use crate::config::ClassifierType;
use crate::error::Result;
use crate::math::Array2;
use crate::models::classifier_trait::ProbabilisticClassifier;
use crate::models::gbdt::GbdtClassifier;
use crate::models::mlp::MlpClassifier;
use crate::models::random_forest::RandomForestClassifier;
#[cfg(feature = "svm")]
use crate::models::svm::SvmClassifier;

/// Closed set of classifiers a pipeline can hold. Serializable so a fitted
/// pipeline can be persisted as one document.
#[derive(Debug, Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForestClassifier),
    Mlp(MlpClassifier),
    Gbdt(GbdtClassifier),
    #[cfg(feature = "svm")]
    Svm(SvmClassifier),
}

/// Build an unfitted classifier from its configuration.
pub fn build_classifier(config: &ClassifierType, random_state: Option<u64>) -> Result<Classifier> {
    match config {
        ClassifierType::RandomForest { .. } => Ok(Classifier::RandomForest(
            RandomForestClassifier::from_config(config, random_state)?,
        )),
        ClassifierType::Mlp { .. } => Ok(Classifier::Mlp(MlpClassifier::from_config(
            config,
            random_state,
        )?)),
        ClassifierType::Gbdt { .. } => Ok(Classifier::Gbdt(GbdtClassifier::from_config(config)?)),
        #[cfg(feature = "svm")]
        ClassifierType::Svm { .. } => Ok(Classifier::Svm(SvmClassifier::from_config(config)?)),
    }
}

impl Classifier {
    fn inner(&self) -> &dyn ProbabilisticClassifier {
        match self {
            Classifier::RandomForest(model) => model,
            Classifier::Mlp(model) => model,
            Classifier::Gbdt(model) => model,
            #[cfg(feature = "svm")]
            Classifier::Svm(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ProbabilisticClassifier {
        match self {
            Classifier::RandomForest(model) => model,
            Classifier::Mlp(model) => model,
            Classifier::Gbdt(model) => model,
            #[cfg(feature = "svm")]
            Classifier::Svm(model) => model,
        }
    }
}

impl ProbabilisticClassifier for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
