//! superphot-classifiers: photometric classification of supernovae.
//!
//! The crate trains class-balanced classifiers on light-curve model
//! parameters. Each object contributes many posterior draws; a pipeline
//! standardises the features, rebalances the classes with synthetic samples
//! (multivariate-Gaussian by default, SMOTE optionally) and fits a
//! probabilistic classifier (random forest, MLP, GBDT or, with the `svm`
//! feature, a support vector machine).
//!
//! Around the pipeline sit leave-one-object-out cross-validation, averaging of
//! per-draw probabilities per object, confusion-matrix evaluation, and
//! readers/writers for feature tables, result tables and persisted pipelines.
pub mod aggregation;
pub mod config;
pub mod cross_validation;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod math;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod resampling;
