//! Scaler → resampler → classifier pipeline plus the train and classify
//! entry points built on it.

use std::borrow::Cow;
use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::aggregation::aggregate_probabilities;
use crate::config::PipelineConfig;
use crate::data_handling::{Dataset, ProbabilityTable};
use crate::error::{ClassifierError, Result};
use crate::io::TableReaderConfig;
use crate::math::Array2;
use crate::models::{build_classifier, Classifier, ProbabilisticClassifier};
use crate::preprocessing::StandardScaler;
use crate::resampling::Sampler;

/// A trainable classification pipeline.
///
/// `fit` standardises the features, rebalances the classes on the scaled data
/// and trains the classifier on the rebalanced rows. `predict_proba` applies
/// the frozen scaler and the classifier only; resampling never happens at
/// predict time.
///
/// A pipeline fitted through [`Pipeline::fit_dataset`] remembers the feature
/// column names it was trained on, and datasets are matched to them by name
/// before predicting. The table layout of the training data travels with the
/// pipeline so later runs can read their tables the same way.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pipeline {
    config: PipelineConfig,
    scaler: Option<StandardScaler>,
    sampler: Sampler,
    classifier: Classifier,
    classes: Vec<String>,
    #[serde(default)]
    feature_names: Vec<String>,
    #[serde(default)]
    table_layout: TableReaderConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let sampler = Sampler::from_config(&config.sampler, config.random_state);
        let classifier = build_classifier(&config.classifier, config.random_state)?;
        Ok(Self {
            config,
            scaler: None,
            sampler,
            classifier,
            classes: Vec::new(),
            feature_names: Vec::new(),
            table_layout: TableReaderConfig::default(),
        })
    }

    /// Layout used to read the training table.
    pub fn with_table_layout(mut self, layout: TableReaderConfig) -> Self {
        self.table_layout = layout;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sorted class labels seen at fit time. Empty before fitting.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    /// Feature columns seen at fit time, in training order. Empty when the
    /// pipeline was fitted on a bare matrix.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn table_layout(&self) -> &TableReaderConfig {
        &self.table_layout
    }

    /// Reader configuration for tables classified by this pipeline: the
    /// training layout with the feature columns pinned to the training
    /// features.
    pub fn input_reader_config(&self) -> TableReaderConfig {
        let mut config = self.table_layout.clone();
        if !self.feature_names.is_empty() {
            config.feature_columns = Some(self.feature_names.clone());
        }
        config
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Fit every stage. Any earlier fitted state is discarded.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[String]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ClassifierError::Data(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }
        let (scaler, scaled) = StandardScaler::fit_transform(x)?;

        let mut sampler = Sampler::from_config(&self.config.sampler, self.config.random_state);
        let resampled = sampler.fit_resample(&scaled, y)?;
        debug!(
            "{} sampler added {} synthetic rows",
            sampler.name(),
            resampled.total_synthetic()
        );

        let classes: Vec<String> = y
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let encoded: Vec<usize> = resampled
            .y
            .iter()
            .map(|label| {
                classes.binary_search(label).map_err(|_| {
                    ClassifierError::Data(format!("resampled label '{}' is unknown", label))
                })
            })
            .collect::<Result<_>>()?;

        let mut classifier =
            build_classifier(&self.config.classifier, self.config.random_state)?;
        classifier.fit(&resampled.x, &encoded, classes.len())?;

        self.scaler = Some(scaler);
        self.sampler = sampler;
        self.classifier = classifier;
        self.classes = classes;
        self.feature_names.clear();
        Ok(())
    }

    /// Fit on a fully labelled dataset and remember its feature names.
    pub fn fit_dataset(&mut self, data: &Dataset) -> Result<()> {
        let labels = data.require_labels()?;
        self.fit(&data.x, &labels)?;
        self.feature_names = data.feature_names.clone();
        Ok(())
    }

    /// Feature matrix of `data` with its columns in training order.
    ///
    /// Columns are matched by name; extra columns are dropped and a missing
    /// training feature is a data error. Pipelines fitted without feature
    /// names take the matrix as is.
    pub fn aligned_features<'a>(&self, data: &'a Dataset) -> Result<Cow<'a, Array2<f64>>> {
        if self.feature_names.is_empty() || data.feature_names == self.feature_names {
            return Ok(Cow::Borrowed(&data.x));
        }
        let indices = self
            .feature_names
            .iter()
            .map(|name| {
                data.feature_names
                    .iter()
                    .position(|candidate| candidate == name)
                    .ok_or_else(|| {
                        ClassifierError::Data(format!(
                            "feature '{}' used for training is missing from the data",
                            name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Matched {} of {} data columns to the training features by name",
            indices.len(),
            data.n_features()
        );
        Ok(Cow::Owned(data.x.select_columns(&indices)))
    }

    /// Class probabilities for every row of `x`, columns in `classes()` order.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scaler = self
            .scaler
            .as_ref()
            .ok_or(ClassifierError::Unfitted("Pipeline"))?;
        let scaled = scaler.transform(x)?;
        self.classifier.predict_proba(&scaled)
    }

    /// Most probable class per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .map(|row| {
                let idx = crate::math::vector::argmax(row).unwrap_or(0);
                self.classes[idx].clone()
            })
            .collect())
    }

    /// Draw `n` further synthetic samples per class from the fitted sampler.
    /// Samples live in the scaled feature space.
    pub fn more_samples(&mut self, n: usize) -> Result<(Array2<f64>, Vec<String>)> {
        if !self.is_fitted() {
            return Err(ClassifierError::Unfitted("Pipeline"));
        }
        self.sampler.more_samples(n)
    }
}

/// Fit `pipeline` on a fully labelled dataset.
pub fn train_classifier(pipeline: &mut Pipeline, data: &Dataset) -> Result<()> {
    data.log_input_data_summary();
    pipeline.fit_dataset(data)?;
    info!(
        "Trained {} classifier with {} sampler on {} classes",
        pipeline.classifier().name(),
        pipeline.sampler().name(),
        pipeline.classes().len()
    );
    Ok(())
}

/// Predict every row of `data` and optionally average draws per object.
pub fn classify(pipeline: &Pipeline, data: &Dataset, aggregate: bool) -> Result<ProbabilityTable> {
    let x = pipeline.aligned_features(data)?;
    let proba = pipeline.predict_proba(&x)?;
    let table = ProbabilityTable::from_predictions(data, pipeline.classes(), &proba)?;
    Ok(if aggregate {
        aggregate_probabilities(&table)
    } else {
        table
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierType, Criterion, SamplerType};
    use crate::data_handling::{MetadataSchema, RowMetadata};
    use crate::resampling::SamplingTarget;

    fn config() -> PipelineConfig {
        PipelineConfig::new(
            ClassifierType::RandomForest {
                n_estimators: 10,
                criterion: Criterion::Entropy,
                max_features: None,
                max_depth: None,
                min_samples_leaf: 1,
            },
            SamplerType::Mvg {
                target: SamplingTarget::Balance,
            },
            Some(17),
        )
    }

    fn data() -> (Array2<f64>, Vec<String>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..6 {
            rows.push(vec![i as f64 * 0.1, 10.0]);
            y.push("SNII".to_string());
        }
        for i in 0..3 {
            rows.push(vec![5.0 + i as f64 * 0.1, 20.0]);
            y.push("SNIa".to_string());
        }
        (Array2::from_rows(&rows, 2).unwrap(), y)
    }

    #[test]
    fn unfitted_pipeline_refuses_to_predict() {
        let pipeline = Pipeline::new(config()).unwrap();
        assert!(matches!(
            pipeline.predict_proba(&Array2::zeros(1, 2)),
            Err(ClassifierError::Unfitted(_))
        ));
    }

    #[test]
    fn fit_exposes_sorted_classes_and_predicts() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.fit(&x, &y).unwrap();
        assert_eq!(pipeline.classes(), &["SNII".to_string(), "SNIa".to_string()]);
        let predicted = pipeline.predict(&x).unwrap();
        assert_eq!(predicted, y);
    }

    #[test]
    fn wrong_width_at_predict_is_a_data_error() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.fit(&x, &y).unwrap();
        assert!(matches!(
            pipeline.predict_proba(&Array2::zeros(1, 3)),
            Err(ClassifierError::Data(_))
        ));
    }

    fn dataset(x: &Array2<f64>, y: &[String], names: &[&str]) -> Dataset {
        let metadata = y
            .iter()
            .enumerate()
            .map(|(i, label)| {
                RowMetadata::new(format!("obj_{}", i), Some(label.as_str()), vec![])
            })
            .collect();
        Dataset::new(
            x.clone(),
            metadata,
            names.iter().map(|n| n.to_string()).collect(),
            MetadataSchema::default(),
        )
        .unwrap()
    }

    #[test]
    fn fit_dataset_records_feature_names() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.fit_dataset(&dataset(&x, &y, &["f1", "f2"])).unwrap();
        assert_eq!(pipeline.feature_names(), &["f1".to_string(), "f2".to_string()]);
        assert_eq!(
            pipeline.input_reader_config().feature_columns,
            Some(vec!["f1".to_string(), "f2".to_string()])
        );

        pipeline.fit(&x, &y).unwrap();
        assert!(pipeline.feature_names().is_empty());
    }

    #[test]
    fn swapped_columns_are_matched_by_name() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        let train = dataset(&x, &y, &["f1", "f2"]);
        pipeline.fit_dataset(&train).unwrap();

        let swapped = dataset(&x.select_columns(&[1, 0]), &y, &["f2", "f1"]);
        let expected = classify(&pipeline, &train, false).unwrap();
        let got = classify(&pipeline, &swapped, false).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn missing_training_feature_is_a_data_error() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        pipeline.fit_dataset(&dataset(&x, &y, &["f1", "f2"])).unwrap();
        let renamed = dataset(&x, &y, &["f1", "f3"]);
        assert!(matches!(
            classify(&pipeline, &renamed, false),
            Err(ClassifierError::Data(_))
        ));
    }

    #[test]
    fn more_samples_after_fit() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new(config()).unwrap();
        assert!(pipeline.more_samples(4).is_err());
        pipeline.fit(&x, &y).unwrap();
        let (more, labels) = pipeline.more_samples(4).unwrap();
        assert_eq!(more.nrows(), 8);
        assert_eq!(labels.iter().filter(|l| *l == "SNIa").count(), 4);
    }
}
