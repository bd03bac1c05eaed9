pub mod classifier_trait;
pub mod decision_tree;
pub mod factory;
pub mod gbdt;
pub mod mlp;
pub mod random_forest;
#[cfg(feature = "svm")]
pub mod svm;

pub use classifier_trait::ProbabilisticClassifier;
pub use factory::{build_classifier, Classifier};
