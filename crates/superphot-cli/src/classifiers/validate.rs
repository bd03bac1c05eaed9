use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use superphot_classifiers::cross_validation::{validate_classifier, LogObserver, ValidationOptions};
use superphot_classifiers::data_handling::{Dataset, ProbabilityTable};
use superphot_classifiers::evaluation::{
    make_confusion_matrix, ConfusionMatrixOptions, Normalization,
};
use superphot_classifiers::io::{
    load_pipeline, read_feature_table_with_config, write_results, TableReaderConfig,
};
use superphot_classifiers::report::write_confusion_matrix;

use crate::util::validate_input_file;

#[derive(Debug, Clone)]
pub struct ValidateArgs {
    pub pipeline: PathBuf,
    pub validation_data: PathBuf,
    /// Defaults to the validation data.
    pub train_data: Option<PathBuf>,
    pub p_min: f64,
    pub parallel: bool,
    /// Directory receiving `validation.txt` and the confusion matrices.
    pub output_dir: PathBuf,
}

fn load_labelled(path: &Path, role: &str, layout: &TableReaderConfig) -> Result<Dataset> {
    validate_input_file(path)?;
    let data = read_feature_table_with_config(path, layout)?;
    data.require_labels()
        .with_context(|| format!("{} data {} is not fully labelled", role, path.display()))?;
    Ok(data)
}

/// Leave-one-object-out validation of the pipeline's configuration, written
/// as a results table plus completeness and purity confusion matrices.
pub fn run_validation(args: &ValidateArgs) -> Result<ProbabilityTable> {
    validate_input_file(&args.pipeline)?;
    info!("Started validation");

    let mut pipeline = load_pipeline(&args.pipeline)?;
    let layout = pipeline.input_reader_config();
    let validation = load_labelled(&args.validation_data, "Validation", &layout)?;
    let train = match &args.train_data {
        Some(path) => Some(load_labelled(path, "Training", &layout)?),
        None => None,
    };
    let (train, test) = match &train {
        Some(train) => (train, Some(&validation)),
        None => (&validation, None),
    };

    let options = ValidationOptions {
        parallel: args.parallel,
        aggregate: true,
    };
    let results = validate_classifier(&mut pipeline, train, test, &options, &LogObserver)?;
    write_results(&results, args.output_dir.join("validation.txt"))?;

    for (normalization, name) in [
        (Normalization::Completeness, "confusion_matrix.html"),
        (Normalization::Purity, "confusion_matrix_purity.html"),
    ] {
        let report = make_confusion_matrix(
            &results,
            &ConfusionMatrixOptions {
                p_min: args.p_min,
                normalization,
                binary: false,
            },
        )?;
        write_confusion_matrix(&report, args.output_dir.join(name))?;
    }

    info!("Finished validation");
    Ok(results)
}
