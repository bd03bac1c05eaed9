use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use superphot_classifiers::io::{load_pipeline, read_feature_table_with_config, write_results};
use superphot_classifiers::pipeline::classify;

use crate::util::{results_path, validate_input_file};

/// Classify every object of `test_data` and write `<output>_results.txt`.
///
/// The table is read with the layout the pipeline was trained on.
pub fn run_classification<P: AsRef<Path>>(
    pipeline_path: P,
    test_data: P,
    output: &str,
) -> Result<PathBuf> {
    validate_input_file(&pipeline_path)?;
    validate_input_file(&test_data)?;
    info!("Started classification");

    let pipeline = load_pipeline(&pipeline_path)?;
    let data = read_feature_table_with_config(&test_data, &pipeline.input_reader_config())?;
    let results = classify(&pipeline, &data, true)?;

    let path = results_path(output);
    write_results(&results, &path)?;
    info!("Classified {} objects", results.len());
    Ok(path)
}
