use clap::{Arg, ArgAction, Command, ValueHint};
use std::path::PathBuf;

fn pmin_arg() -> Arg {
    Arg::new("pmin")
        .long("pmin")
        .help("Minimum confidence to be included in the confusion matrix.")
        .value_parser(clap::value_parser!(f64))
        .default_value("0")
}

pub fn build_cli() -> Command {
    Command::new("superphot")
        .version(clap::crate_version!())
        .about("Photometric classification of supernovae from light-curve features")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a classification pipeline on a labelled feature table")
                .arg(
                    Arg::new("train_data")
                        .help("Feature table of the training set")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .help("JSON training configuration. Command line options override it.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("classifier")
                        .long("classifier")
                        .help(
                            "Classification algorithm: rf (random forest; default), mlp, gbdt \
                             or svm (requires the svm feature).",
                        )
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("sampler")
                        .long("sampler")
                        .help(
                            "Resampling algorithm: mvg (multivariate Gaussian; default) or smote.",
                        )
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("random_state")
                        .long("random-state")
                        .help("Seed for the random number generator (for reproducibility).")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("samples_per_class")
                        .long("samples-per-class")
                        .help("Number of rows per class after multivariate Gaussian resampling.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("File the fitted pipeline is written to. Default: pipeline.json")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify the objects of a feature table with a trained pipeline")
                .arg(
                    Arg::new("pipeline")
                        .help("Trained pipeline file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("test_data")
                        .help("Feature table of the test set")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Filename prefix of the results table (<output>_results.txt).")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .default_value("test_data"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Leave-one-object-out validation of a pipeline configuration")
                .arg(
                    Arg::new("pipeline")
                        .help("Trained pipeline file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("validation_data")
                        .help("Labelled feature table of the validation set")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("train_data")
                        .long("train-data")
                        .help("Feature table of the training set, if different from the validation set.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(pmin_arg())
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .help("Fit the held-out folds in parallel.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output_dir")
                        .long("output-dir")
                        .help("Directory for validation.txt and the confusion matrices.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value(".")
                        .value_hint(ValueHint::DirPath),
                ),
        )
        .subcommand(
            Command::new("confusion-matrix")
                .about("Confusion matrix of a classification results table")
                .arg(
                    Arg::new("filename")
                        .help("Table of classification results")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(pmin_arg())
                .arg(
                    Arg::new("pipeline")
                        .long("pipeline")
                        .help("Trained pipeline whose table layout the results table follows.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("metadata_columns")
                        .long("metadata-columns")
                        .help(
                            "Comma-separated metadata columns of the results table. \
                             Default: redshift,MWEBV",
                        )
                        .value_delimiter(',')
                        .num_args(1..),
                )
                .arg(
                    Arg::new("purity")
                        .long("purity")
                        .help("Normalise by column instead of by row.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("binary")
                        .long("binary")
                        .help("SNIa vs non-SNIa (CCSN) binary confusion matrix.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("saveto")
                        .long("saveto")
                        .help("If provided, save the confusion matrix to this HTML file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}
