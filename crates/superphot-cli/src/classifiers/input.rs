use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use superphot_classifiers::config::{ClassifierType, PipelineConfig, SamplerType};
use superphot_classifiers::io::TableReaderConfig;
use superphot_classifiers::resampling::SamplingTarget;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrainConfig {
    pub version: String,
    pub train_data: String,
    pub output_file: String,
    pub classifier: ClassifierType,
    pub sampler: SamplerType,
    pub random_state: Option<u64>,
    /// Non-feature columns carried into result tables.
    pub metadata_columns: Vec<String>,
    /// Columns excluded from the features.
    pub ignore_columns: Vec<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            version: clap::crate_version!().to_string(),
            train_data: String::new(),
            output_file: String::from("pipeline.json"),
            classifier: ClassifierType::default(),
            sampler: SamplerType::default(),
            random_state: None,
            metadata_columns: vec![String::from("redshift"), String::from("MWEBV")],
            ignore_columns: Vec::new(),
        }
    }
}

/// Classifier and sampler kinds may be given either as their short name
/// (`"rf"`, `"smote"`) or as a full serialized value.
fn parse_kind<T>(value: &serde_json::Value) -> Result<T>
where
    T: DeserializeOwned + FromStr<Err = String>,
{
    match value.as_str() {
        Some(name) => T::from_str(name).map_err(anyhow::Error::msg),
        None => Ok(serde_json::from_value(value.clone())?),
    }
}

impl TrainConfig {
    /// Load a JSON config (fields missing from it keep their defaults), then
    /// apply command line overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = TrainConfig::default();

        if let Some(config_path) = config_path {
            let config_json = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            let partial: serde_json::Value = serde_json::from_str(&config_json)
                .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;

            macro_rules! load_or_default {
                ($field:ident) => {
                    if let Some(val) = partial.get(stringify!($field)) {
                        if let Ok(parsed) = serde_json::from_value(val.clone()) {
                            config.$field = parsed;
                        } else {
                            log::warn!(
                                "Config Invalid value for '{}', using default: {:?}",
                                stringify!($field),
                                config.$field
                            );
                        }
                    } else {
                        log::debug!(
                            "Config Missing field '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                };
            }

            load_or_default!(train_data);
            load_or_default!(output_file);
            load_or_default!(random_state);
            load_or_default!(metadata_columns);
            load_or_default!(ignore_columns);

            if let Some(val) = partial.get("classifier") {
                config.classifier = parse_kind(val).context("Config Invalid 'classifier'")?;
            }
            if let Some(val) = partial.get("sampler") {
                config.sampler = parse_kind(val).context("Config Invalid 'sampler'")?;
            }
        }

        // Apply CLI overrides
        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        if let Some(output_file) = matches.get_one::<String>("output") {
            config.output_file = output_file.clone();
        }
        if let Some(classifier) = matches.get_one::<String>("classifier") {
            config.classifier = ClassifierType::from_str(classifier).map_err(anyhow::Error::msg)?;
        }
        if let Some(sampler) = matches.get_one::<String>("sampler") {
            config.sampler = SamplerType::from_str(sampler).map_err(anyhow::Error::msg)?;
        }
        if let Some(seed) = matches.get_one::<u64>("random_state") {
            config.random_state = Some(*seed);
        }
        if let Some(&n) = matches.get_one::<usize>("samples_per_class") {
            match &mut config.sampler {
                SamplerType::Mvg { target } => *target = SamplingTarget::SamplesPerClass(n),
                SamplerType::Smote { .. } => {
                    log::warn!("--samples-per-class is ignored by the smote sampler")
                }
            }
        }

        if config.train_data.is_empty() {
            anyhow::bail!("No training data given");
        }
        Ok(config)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(
            self.classifier.clone(),
            self.sampler.clone(),
            self.random_state,
        )
    }

    pub fn reader_config(&self) -> TableReaderConfig {
        TableReaderConfig {
            metadata_columns: self.metadata_columns.clone(),
            ignore_columns: self.ignore_columns.clone(),
            ..Default::default()
        }
    }
}
