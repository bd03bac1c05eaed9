use anyhow::{Context, Result};
use log::info;

use superphot_classifiers::io::{read_feature_table_with_config, save_pipeline};
use superphot_classifiers::pipeline::{train_classifier, Pipeline};

use crate::classifiers::input::TrainConfig;
use crate::util::validate_input_file;

/// Fit a pipeline on the configured training table and save it.
pub fn run_training(config: &TrainConfig) -> Result<Pipeline> {
    validate_input_file(&config.train_data)?;
    info!(
        "Training {} classifier with {} sampler (random_state: {:?})",
        config.classifier.name(),
        config.sampler.name(),
        config.random_state
    );

    let data = read_feature_table_with_config(&config.train_data, &config.reader_config())?;
    let mut pipeline =
        Pipeline::new(config.pipeline_config())?.with_table_layout(config.reader_config());
    train_classifier(&mut pipeline, &data)
        .with_context(|| format!("Training on {} failed", config.train_data))?;

    save_pipeline(&pipeline, &config.output_file)?;
    info!("Finished training");
    Ok(pipeline)
}
