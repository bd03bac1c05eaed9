//! Integration tests for pipeline training and leave-one-group-out validation.

use superphot_classifiers::config::{ClassifierType, Criterion, PipelineConfig, SamplerType};
use superphot_classifiers::cross_validation::{validate_classifier, NullObserver, ValidationOptions};
use superphot_classifiers::data_handling::{Dataset, MetaValue, MetadataSchema, RowMetadata, Sample};
use superphot_classifiers::error::ClassifierError;
use superphot_classifiers::pipeline::{classify, train_classifier, Pipeline};
use superphot_classifiers::resampling::SamplingTarget;

fn config() -> PipelineConfig {
    PipelineConfig::new(
        ClassifierType::RandomForest {
            n_estimators: 8,
            criterion: Criterion::Entropy,
            max_features: None,
            max_depth: Some(6),
            min_samples_leaf: 1,
        },
        SamplerType::Mvg {
            target: SamplingTarget::Balance,
        },
        Some(7),
    )
}

/// Four draws per object; `ia*` objects sit near (0, 0), the rest near (4, 4).
fn objects(layout: &[(&str, Option<&str>, f64)]) -> Dataset {
    let mut samples = Vec::new();
    for (k, (name, label, redshift)) in layout.iter().enumerate() {
        let centre = if name.starts_with("ia") { 0.0 } else { 4.0 };
        for d in 0..4 {
            let t = (k * 4 + d) as f64;
            samples.push(Sample {
                features: vec![centre + 0.4 * (t * 0.9).sin(), centre + 0.4 * (t * 1.7).cos()],
                metadata: RowMetadata::new(*name, *label, vec![MetaValue::Number(*redshift)]),
            });
        }
    }
    Dataset::from_samples(
        samples,
        vec!["amplitude".to_string(), "rise_time".to_string()],
        MetadataSchema::with_fields(&["redshift"]),
    )
    .unwrap()
}

fn training_set() -> Dataset {
    objects(&[
        ("ia_1", Some("SNIa"), 0.10),
        ("ia_2", Some("SNIa"), 0.12),
        ("ia_3", Some("SNIa"), 0.15),
        ("ii_1", Some("SNII"), 0.05),
        ("ii_2", Some("SNII"), 0.07),
        ("ii_3", Some("SNII"), 0.08),
    ])
}

/// Object "x" with three draws of class A and object "y" with two draws of
/// class B. Holding out either object leaves a single class to train on.
fn two_objects() -> Dataset {
    let mut samples = Vec::new();
    for d in 0..3 {
        samples.push(Sample {
            features: vec![0.1 * d as f64, 1.0 - 0.2 * d as f64],
            metadata: RowMetadata::new("x", Some("A"), vec![MetaValue::Number(0.2)]),
        });
    }
    for d in 0..2 {
        samples.push(Sample {
            features: vec![5.0 + 0.3 * d as f64, 4.0 + 0.1 * d as f64],
            metadata: RowMetadata::new("y", Some("B"), vec![MetaValue::Number(0.4)]),
        });
    }
    Dataset::from_samples(
        samples,
        vec!["amplitude".to_string(), "rise_time".to_string()],
        MetadataSchema::with_fields(&["redshift"]),
    )
    .unwrap()
}

fn unaggregated() -> ValidationOptions {
    ValidationOptions {
        parallel: false,
        aggregate: false,
    }
}

#[test]
fn held_out_predictions_match_a_model_fit_without_the_group() {
    let train = training_set();
    let mut pipeline = Pipeline::new(config()).unwrap();
    let table =
        validate_classifier(&mut pipeline, &train, None, &unaggregated(), &NullObserver).unwrap();
    assert_eq!(table.len(), train.len());

    let labels = train.require_labels().unwrap();
    let keep: Vec<usize> = (0..train.len())
        .filter(|&i| train.metadata[i].group != "ia_2")
        .collect();
    let held: Vec<usize> = (0..train.len())
        .filter(|&i| train.metadata[i].group == "ia_2")
        .collect();
    let keep_labels: Vec<String> = keep.iter().map(|&i| labels[i].clone()).collect();

    let mut manual = Pipeline::new(config()).unwrap();
    manual.fit(&train.x.select_rows(&keep), &keep_labels).unwrap();
    let expected = manual.predict_proba(&train.x.select_rows(&held)).unwrap();

    for (i, &row) in held.iter().enumerate() {
        for (a, b) in table.rows[row].probabilities.iter().zip(expected.row_slice(i)) {
            assert!((a - b).abs() < 1e-12, "row {}: {} vs {}", row, a, b);
        }
    }
}

#[test]
fn held_out_group_features_do_not_leak_into_its_own_prediction() {
    let original = training_set();
    let mut poisoned = original.clone();
    let rows = poisoned.rows_by_group()["ii_1"].clone();
    for r in rows {
        // ii_1 now sits among the SNIa draws
        for v in poisoned.x.row_slice_mut(r) {
            *v -= 4.0;
        }
    }

    let run = |train: &Dataset| {
        let mut pipeline = Pipeline::new(config()).unwrap();
        validate_classifier(&mut pipeline, train, Some(&original), &unaggregated(), &NullObserver)
            .unwrap()
    };
    let clean = run(&original);
    let shifted = run(&poisoned);

    for (a, b) in clean.rows.iter().zip(&shifted.rows) {
        if a.metadata.group == "ii_1" {
            assert_eq!(a.probabilities, b.probabilities);
        }
    }
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let train = training_set();
    let run = |parallel: bool| {
        let mut pipeline = Pipeline::new(config()).unwrap();
        let options = ValidationOptions {
            parallel,
            aggregate: true,
        };
        validate_classifier(&mut pipeline, &train, None, &options, &NullObserver).unwrap()
    };
    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.len(), 6);
    for (a, b) in sequential.rows.iter().zip(&parallel.rows) {
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.probabilities, b.probabilities);
    }
}

#[test]
fn unseen_test_groups_use_the_full_training_fit() {
    let train = training_set();
    let test = objects(&[("ia_9", Some("SNIa"), 0.2), ("ia_1", Some("SNIa"), 0.10)]);
    let mut pipeline = Pipeline::new(config()).unwrap();
    let table =
        validate_classifier(&mut pipeline, &train, Some(&test), &unaggregated(), &NullObserver)
            .unwrap();

    assert!(pipeline.is_fitted());
    let baseline = pipeline.predict_proba(&test.x).unwrap();
    for r in 0..4 {
        assert_eq!(table.rows[r].metadata.group, "ia_9");
        assert_eq!(table.rows[r].probabilities.as_slice(), baseline.row_slice(r));
    }
}

#[test]
fn validation_requires_labels() {
    let train = objects(&[
        ("ia_1", Some("SNIa"), 0.1),
        ("ii_1", Some("SNII"), 0.1),
        ("unknown", None, 0.3),
    ]);
    let mut pipeline = Pipeline::new(config()).unwrap();
    let err = validate_classifier(&mut pipeline, &train, None, &unaggregated(), &NullObserver)
        .unwrap_err();
    assert!(matches!(
        err,
        ClassifierError::MissingLabels { count: 4, .. }
    ));
}

// ---------------------------------------------------------------------------
// train / classify
// ---------------------------------------------------------------------------

#[test]
fn classify_aggregates_one_row_per_object() {
    let train = training_set();
    let mut pipeline = Pipeline::new(config()).unwrap();
    train_classifier(&mut pipeline, &train).unwrap();

    let test = objects(&[("ia_new", None, 0.3), ("ii_new", None, 0.01)]);
    let table = classify(&pipeline, &test, true).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.classes, vec!["SNII", "SNIa"]);
    let ia = &table.rows[0];
    assert_eq!(ia.metadata.group, "ia_new");
    assert!(ia.probabilities[1] > ia.probabilities[0]);
    for row in &table.rows {
        let total: f64 = row.probabilities.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    let per_draw = classify(&pipeline, &test, false).unwrap();
    assert_eq!(per_draw.len(), 8);
}

#[test]
fn training_rejects_unlabelled_rows() {
    let train = objects(&[("ia_1", Some("SNIa"), 0.1), ("x", None, 0.2)]);
    let mut pipeline = Pipeline::new(config()).unwrap();
    assert!(matches!(
        train_classifier(&mut pipeline, &train),
        Err(ClassifierError::MissingLabels { .. })
    ));
    assert!(!pipeline.is_fitted());
}

#[test]
fn two_objects_validate_to_one_row_each() {
    let train = two_objects();
    for classifier in [
        config().classifier,
        ClassifierType::mlp(),
        ClassifierType::gbdt(),
    ] {
        let name = classifier.name();
        let mut pipeline = Pipeline::new(PipelineConfig::new(
            classifier,
            SamplerType::Mvg {
                target: SamplingTarget::Balance,
            },
            Some(3),
        ))
        .unwrap();
        let table = validate_classifier(
            &mut pipeline,
            &train,
            None,
            &ValidationOptions::default(),
            &NullObserver,
        )
        .unwrap();

        assert_eq!(table.classes, vec!["A", "B"], "{}", name);
        assert_eq!(table.len(), 2, "{}", name);
        assert_eq!(table.rows[0].metadata.group, "x");
        assert_eq!(table.rows[0].metadata.label.as_deref(), Some("A"));
        assert_eq!(table.rows[1].metadata.group, "y");
        assert_eq!(table.rows[1].metadata.label.as_deref(), Some("B"));
        // each fold only ever saw the other object's class
        assert_eq!(table.rows[0].probabilities[0], 0.0, "{}", name);
        assert_eq!(table.rows[1].probabilities[1], 0.0, "{}", name);
    }
}

#[test]
fn two_objects_random_forest_votes_for_the_remaining_class() {
    let train = two_objects();
    let mut pipeline = Pipeline::new(config()).unwrap();
    let table = validate_classifier(
        &mut pipeline,
        &train,
        None,
        &ValidationOptions::default(),
        &NullObserver,
    )
    .unwrap();
    assert!((table.rows[0].probabilities[1] - 1.0).abs() < 1e-12);
    assert!((table.rows[1].probabilities[0] - 1.0).abs() < 1e-12);
    // the pipeline itself ends up fitted on both objects
    assert_eq!(pipeline.classes(), &["A".to_string(), "B".to_string()]);
}

#[test]
fn evaluation_columns_are_matched_to_training_order() {
    let train = training_set();
    let swapped = Dataset::new(
        train.x.select_columns(&[1, 0]),
        train.metadata.clone(),
        vec!["rise_time".to_string(), "amplitude".to_string()],
        train.schema.clone(),
    )
    .unwrap();

    let run = |eval: &Dataset| {
        let mut pipeline = Pipeline::new(config()).unwrap();
        validate_classifier(&mut pipeline, &train, Some(eval), &unaggregated(), &NullObserver)
            .unwrap()
    };
    assert_eq!(run(&swapped), run(&train));
}

#[test]
fn evaluation_without_a_training_feature_is_rejected() {
    let train = training_set();
    let renamed = Dataset::new(
        train.x.clone(),
        train.metadata.clone(),
        vec!["amplitude".to_string(), "peak_mag".to_string()],
        train.schema.clone(),
    )
    .unwrap();
    let mut pipeline = Pipeline::new(config()).unwrap();
    let result = validate_classifier(
        &mut pipeline,
        &train,
        Some(&renamed),
        &unaggregated(),
        &NullObserver,
    );
    assert!(matches!(result, Err(ClassifierError::Data(_))));
}
