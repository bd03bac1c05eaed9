use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;
use std::path::PathBuf;

use superphot_classifiers::evaluation::{ConfusionMatrixOptions, Normalization};
use superphot_cli::classifiers::classify::run_classification;
use superphot_cli::classifiers::confusion_matrix::{results_layout, run_confusion_matrix};
use superphot_cli::classifiers::input::TrainConfig;
use superphot_cli::classifiers::trainer::run_training;
use superphot_cli::classifiers::validate::{run_validation, ValidateArgs};
use superphot_cli::cli::build_cli;

fn main() {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("SUPERPHOT_LOG", "error,superphot=info"))
        .init();

    let matches = build_cli().get_matches();

    let (name, result) = match matches.subcommand() {
        Some(("train", sub_m)) => ("Training", handle_train(sub_m)),
        Some(("classify", sub_m)) => ("Classification", handle_classify(sub_m)),
        Some(("validate", sub_m)) => ("Validation", handle_validate(sub_m)),
        Some(("confusion-matrix", sub_m)) => ("Confusion matrix", handle_confusion_matrix(sub_m)),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };
    if let Err(e) = result {
        log::error!("{} failed: {:#}", name, e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.get_one::<PathBuf>("config");
    if let Some(path) = config_path {
        log::info!("[superphot::train] Using config: {:?}", path);
    }
    let config = TrainConfig::from_arguments(config_path, matches)?;
    log::debug!(
        "[superphot::train] Effective config:\n{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );
    run_training(&config)?;
    Ok(())
}

fn handle_classify(matches: &ArgMatches) -> Result<()> {
    let pipeline: &PathBuf = matches.get_one("pipeline").unwrap();
    let test_data: &PathBuf = matches.get_one("test_data").unwrap();
    let output: &String = matches.get_one("output").unwrap();
    let path = run_classification(pipeline, test_data, output)?;
    log::info!("[superphot::classify] Results written to {}", path.display());
    Ok(())
}

fn handle_validate(matches: &ArgMatches) -> Result<()> {
    let args = ValidateArgs {
        pipeline: matches.get_one::<PathBuf>("pipeline").unwrap().clone(),
        validation_data: matches.get_one::<PathBuf>("validation_data").unwrap().clone(),
        train_data: matches.get_one::<PathBuf>("train_data").cloned(),
        p_min: *matches.get_one::<f64>("pmin").unwrap(),
        parallel: matches.get_flag("parallel"),
        output_dir: matches.get_one::<PathBuf>("output_dir").unwrap().clone(),
    };
    run_validation(&args)?;
    Ok(())
}

fn handle_confusion_matrix(matches: &ArgMatches) -> Result<()> {
    let filename: &PathBuf = matches.get_one("filename").unwrap();
    let options = ConfusionMatrixOptions {
        p_min: *matches.get_one::<f64>("pmin").unwrap(),
        normalization: if matches.get_flag("purity") {
            Normalization::Purity
        } else {
            Normalization::Completeness
        },
        binary: matches.get_flag("binary"),
    };
    let layout = results_layout(
        matches.get_one::<PathBuf>("pipeline").map(PathBuf::as_path),
        matches
            .get_many::<String>("metadata_columns")
            .map(|columns| columns.cloned().collect()),
    )?;
    let saveto = matches.get_one::<PathBuf>("saveto");
    let report = run_confusion_matrix(filename, &layout, &options, saveto.map(PathBuf::as_path))?;
    print!("{}", report);
    Ok(())
}
