//! Leave-one-group-out cross-validation.
//!
//! Every object (group of draws) in the training set is predicted by a
//! pipeline fitted without any of that object's rows. Evaluation rows whose
//! group is not part of the training set keep the prediction of the pipeline
//! fitted on the whole training set.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};
use rayon::prelude::*;

use crate::aggregation::aggregate_probabilities;
use crate::config::PipelineConfig;
use crate::data_handling::{Dataset, ProbabilityTable};
use crate::error::{ClassifierError, Result};
use crate::math::Array2;
use crate::pipeline::Pipeline;

/// Progress callbacks for a validation run.
pub trait ValidationObserver: Sync {
    fn on_start(&self, _n_folds: usize) {}
    fn on_group_complete(&self, _group: &str, _completed: usize, _total: usize) {}
    fn on_finish(&self, _n_rows: usize) {}
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ValidationObserver for LogObserver {
    fn on_start(&self, n_folds: usize) {
        info!("Starting leave-one-group-out validation over {} objects", n_folds);
    }

    fn on_group_complete(&self, group: &str, completed: usize, total: usize) {
        debug!("Fold {}/{} done (held out {})", completed, total, group);
        if total >= 10 && completed % (total / 10) == 0 {
            info!("Validation {:.0}% complete", 100.0 * completed as f64 / total as f64);
        }
    }

    fn on_finish(&self, n_rows: usize) {
        info!("Validation finished: {} result rows", n_rows);
    }
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ValidationObserver for NullObserver {}

#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Refit the held-out folds on the rayon thread pool.
    pub parallel: bool,
    /// Average draws per object in the returned table.
    pub aggregate: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            aggregate: true,
        }
    }
}

struct Fold {
    group: String,
    eval_rows: Vec<usize>,
}

/// Fit a fresh pipeline without `fold.group` and predict that group's
/// evaluation rows, with columns laid out in `classes` order.
fn run_fold(
    config: &PipelineConfig,
    train: &Dataset,
    labels: &[String],
    eval_x: &Array2<f64>,
    classes: &[String],
    fold: &Fold,
) -> Result<Array2<f64>> {
    let keep: Vec<usize> = (0..train.len())
        .filter(|&i| train.metadata[i].group != fold.group)
        .collect();
    if keep.is_empty() {
        return Err(ClassifierError::Data(format!(
            "no training rows remain after holding out '{}'",
            fold.group
        )));
    }
    let fold_labels: Vec<String> = keep.iter().map(|&i| labels[i].clone()).collect();

    let mut pipeline = Pipeline::new(config.clone())?;
    pipeline.fit(&train.x.select_rows(&keep), &fold_labels)?;
    let proba = pipeline.predict_proba(&eval_x.select_rows(&fold.eval_rows))?;

    // a fold may lack a class entirely; its column stays zero
    let mut aligned = Array2::zeros(proba.nrows(), classes.len());
    for (j, class) in pipeline.classes().iter().enumerate() {
        let target = classes.iter().position(|c| c == class).ok_or_else(|| {
            ClassifierError::Data(format!("fold produced unknown class '{}'", class))
        })?;
        for r in 0..proba.nrows() {
            aligned[(r, target)] = proba[(r, j)];
        }
    }
    Ok(aligned)
}

/// Out-of-fold class probabilities for `test` (or `train` when `test` is
/// `None`).
///
/// `pipeline` is refitted on the whole training set and stays fitted on
/// return. Any fold failing to fit aborts the run.
pub fn validate_classifier(
    pipeline: &mut Pipeline,
    train: &Dataset,
    test: Option<&Dataset>,
    options: &ValidationOptions,
    observer: &dyn ValidationObserver,
) -> Result<ProbabilityTable> {
    let labels = train.require_labels()?;
    let eval = test.unwrap_or(train);

    pipeline.fit_dataset(train)?;
    let classes = pipeline.classes().to_vec();
    // evaluation columns follow the training feature order from here on
    let eval_x = pipeline.aligned_features(eval)?;
    let mut proba = pipeline.predict_proba(&eval_x)?;

    let eval_groups = eval.rows_by_group();
    let folds: Vec<Fold> = train
        .unique_groups()
        .into_iter()
        .filter_map(|group| {
            let eval_rows = eval_groups.get(group.as_str())?.clone();
            Some(Fold { group, eval_rows })
        })
        .collect();
    let skipped = train.unique_groups().len() - folds.len();
    if skipped > 0 {
        debug!("{} training objects have no evaluation rows", skipped);
    }

    let total = folds.len();
    observer.on_start(total);
    let completed = AtomicUsize::new(0);
    let config = pipeline.config().clone();
    let run = |fold: &Fold| -> Result<Array2<f64>> {
        let out = run_fold(&config, train, &labels, &eval_x, &classes, fold)?;
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        observer.on_group_complete(&fold.group, done, total);
        Ok(out)
    };

    let results: Vec<Array2<f64>> = if options.parallel {
        folds.par_iter().map(run).collect::<Result<_>>()?
    } else {
        folds.iter().map(run).collect::<Result<_>>()?
    };

    for (fold, fold_proba) in folds.iter().zip(&results) {
        for (i, &row) in fold.eval_rows.iter().enumerate() {
            proba
                .row_slice_mut(row)
                .copy_from_slice(fold_proba.row_slice(i));
        }
    }

    let table = ProbabilityTable::from_predictions(eval, &classes, &proba)?;
    let table = if options.aggregate {
        aggregate_probabilities(&table)
    } else {
        table
    };
    observer.on_finish(table.len());
    Ok(table)
}
