use std::path::Path;

use anyhow::Result;

use superphot_classifiers::evaluation::{make_confusion_matrix, ConfusionMatrixOptions, ConfusionReport};
use superphot_classifiers::io::{load_pipeline, read_results, TableReaderConfig};
use superphot_classifiers::report::write_confusion_matrix;

use crate::util::validate_input_file;

/// Layout of a results table: the training layout of `pipeline` when given,
/// otherwise the default one, with `metadata_columns` overriding either.
pub fn results_layout(
    pipeline: Option<&Path>,
    metadata_columns: Option<Vec<String>>,
) -> Result<TableReaderConfig> {
    let mut layout = match pipeline {
        Some(path) => {
            validate_input_file(path)?;
            load_pipeline(path)?.table_layout().clone()
        }
        None => TableReaderConfig::default(),
    };
    if let Some(columns) = metadata_columns {
        layout.metadata_columns = columns;
    }
    Ok(layout)
}

/// Confusion matrix of a results table. Written as HTML when `saveto` is
/// given; always returned for printing.
pub fn run_confusion_matrix<P: AsRef<Path>>(
    results: P,
    layout: &TableReaderConfig,
    options: &ConfusionMatrixOptions,
    saveto: Option<&Path>,
) -> Result<ConfusionReport> {
    validate_input_file(&results)?;
    let table = read_results(&results, layout)?;
    let report = make_confusion_matrix(&table, options)?;
    if let Some(path) = saveto {
        write_confusion_matrix(&report, path)?;
    }
    Ok(report)
}
