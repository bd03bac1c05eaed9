//! Integration tests for training config parsing and util helpers.

use std::path::PathBuf;

use superphot_classifiers::config::{ClassifierType, SamplerType};
use superphot_classifiers::resampling::SamplingTarget;
use superphot_cli::classifiers::input::TrainConfig;
use superphot_cli::cli::build_cli;
use superphot_cli::util::{results_path, validate_input_file};

fn train_config(args: &[&str], config: Option<&PathBuf>) -> anyhow::Result<TrainConfig> {
    let mut argv = vec!["superphot", "train"];
    argv.extend_from_slice(args);
    let matches = build_cli().try_get_matches_from(argv).unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    TrainConfig::from_arguments(config, sub)
}

// ---------------------------------------------------------------------------
// util
// ---------------------------------------------------------------------------

#[test]
fn validate_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.tsv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_input_file(&path).is_ok());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_input_file("/nonexistent/path/data.tsv").is_err());
}

#[test]
fn results_path_appends_suffix() {
    assert_eq!(results_path("out/test"), PathBuf::from("out/test_results.txt"));
}

// ---------------------------------------------------------------------------
// TrainConfig
// ---------------------------------------------------------------------------

#[test]
fn train_config_default_values() {
    let cfg = TrainConfig::default();
    assert_eq!(cfg.output_file, "pipeline.json");
    assert_eq!(cfg.classifier.name(), "rf");
    assert_eq!(
        cfg.sampler,
        SamplerType::Mvg {
            target: SamplingTarget::SamplesPerClass(1000)
        }
    );
    assert_eq!(cfg.random_state, None);
    assert_eq!(cfg.metadata_columns, vec!["redshift", "MWEBV"]);
}

#[test]
fn command_line_overrides() {
    let cfg = train_config(
        &[
            "train.tsv",
            "--classifier",
            "mlp",
            "--random-state",
            "12",
            "--samples-per-class",
            "50",
            "-o",
            "model.json",
        ],
        None,
    )
    .unwrap();
    assert_eq!(cfg.train_data, "train.tsv");
    assert_eq!(cfg.output_file, "model.json");
    assert_eq!(cfg.classifier, ClassifierType::mlp());
    assert_eq!(cfg.random_state, Some(12));
    assert_eq!(
        cfg.sampler,
        SamplerType::Mvg {
            target: SamplingTarget::SamplesPerClass(50)
        }
    );
    assert_eq!(cfg.pipeline_config().random_state, Some(12));
}

#[test]
fn json_config_with_cli_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("train.json");
    std::fs::write(
        &path,
        r#"{"train_data": "from_config.tsv", "classifier": "gbdt", "sampler": "smote", "random_state": 3, "ignore_columns": ["peak_mag"]}"#,
    )
    .unwrap();

    let cfg = train_config(&["--random-state", "9"], Some(&path)).unwrap();
    assert_eq!(cfg.train_data, "from_config.tsv");
    assert_eq!(cfg.classifier.name(), "gbdt");
    assert_eq!(cfg.sampler, SamplerType::Smote { k_neighbors: 5 });
    assert_eq!(cfg.random_state, Some(9));
    assert_eq!(cfg.reader_config().ignore_columns, vec!["peak_mag"]);
    assert_eq!(cfg.output_file, "pipeline.json");
}

#[test]
fn unknown_sampler_is_an_error() {
    assert!(train_config(&["train.tsv", "--sampler", "adasyn"], None).is_err());
}

#[test]
fn missing_training_data_is_an_error() {
    assert!(train_config(&[], None).is_err());
}

#[test]
fn train_config_serializes_to_json() {
    let cfg = TrainConfig::default();
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert!(json.contains("train_data"));
    assert!(json.contains("RandomForest"));
}
