//! Integration tests for probability aggregation and confusion matrices.

use superphot_classifiers::aggregation::aggregate_probabilities;
use superphot_classifiers::data_handling::{
    MetaValue, MetadataSchema, ProbabilityRow, ProbabilityTable, RowMetadata,
};
use superphot_classifiers::evaluation::{
    make_confusion_matrix, ConfusionMatrixOptions, Normalization,
};

fn row(group: &str, label: Option<&str>, probabilities: &[f64]) -> ProbabilityRow {
    ProbabilityRow {
        metadata: RowMetadata::new(group, label, vec![MetaValue::Number(0.1)]),
        probabilities: probabilities.to_vec(),
    }
}

fn table(classes: &[&str], rows: Vec<ProbabilityRow>) -> ProbabilityTable {
    ProbabilityTable::new(
        classes.iter().map(|c| c.to_string()).collect(),
        MetadataSchema::with_fields(&["redshift"]),
        rows,
    )
    .unwrap()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[test]
fn draws_average_per_object() {
    let t = table(
        &["A", "B"],
        vec![
            row("x", Some("A"), &[0.9, 0.1]),
            row("y", Some("B"), &[0.2, 0.8]),
            row("x", Some("A"), &[0.6, 0.4]),
            row("y", Some("B"), &[0.4, 0.6]),
            row("x", Some("A"), &[0.3, 0.7]),
        ],
    );
    let agg = aggregate_probabilities(&t);
    assert_eq!(agg.len(), 2);
    assert_eq!(agg.rows[0].metadata.group, "x");
    assert!((agg.rows[0].probabilities[0] - 0.6).abs() < 1e-12);
    assert!((agg.rows[0].probabilities[1] - 0.4).abs() < 1e-12);
    assert_eq!(agg.rows[1].metadata.group, "y");
    assert!((agg.rows[1].probabilities[0] - 0.3).abs() < 1e-12);
    assert!((agg.rows[1].probabilities[1] - 0.7).abs() < 1e-12);

    let again = aggregate_probabilities(&agg);
    assert_eq!(again.rows, agg.rows);
}

// ---------------------------------------------------------------------------
// Multiclass
// ---------------------------------------------------------------------------

#[test]
fn completeness_rows_from_results_table() {
    let t = table(
        &["A", "B"],
        vec![
            row("o1", Some("A"), &[0.8, 0.2]),
            row("o2", Some("A"), &[0.3, 0.7]),
            row("o3", Some("B"), &[0.1, 0.9]),
            row("o4", None, &[0.9, 0.1]),
        ],
    );
    let report = make_confusion_matrix(&t, &ConfusionMatrixOptions::default()).unwrap();
    assert_eq!(report.n_objects, 3);
    assert_eq!(report.normalized.row_slice(0), &[0.5, 0.5]);
    assert_eq!(report.normalized.row_slice(1), &[0.0, 1.0]);
    assert!(report.title().starts_with("Completeness (N=3, A=0.67"));

    let purity = make_confusion_matrix(
        &t,
        &ConfusionMatrixOptions {
            normalization: Normalization::Purity,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(purity.normalized.row_slice(0), &[1.0, 0.5]);
    assert_eq!(purity.normalized.row_slice(1), &[0.0, 0.5]);
}

#[test]
fn completeness_rows_sum_to_one_for_supported_classes() {
    let t = table(
        &["A", "B", "C"],
        vec![
            row("o1", Some("A"), &[0.5, 0.3, 0.2]),
            row("o2", Some("A"), &[0.2, 0.5, 0.3]),
            row("o3", Some("B"), &[0.1, 0.1, 0.8]),
            row("o4", Some("B"), &[0.1, 0.8, 0.1]),
            row("o5", Some("B"), &[0.1, 0.8, 0.1]),
        ],
    );
    let report = make_confusion_matrix(&t, &ConfusionMatrixOptions::default()).unwrap();
    for (i, r) in report.normalized.rows().enumerate() {
        if report.matrix.row_totals()[i] > 0 {
            assert!((r.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        } else {
            assert!(r.iter().all(|v| v.is_nan()));
        }
    }
}

#[test]
fn p_min_drops_unconfident_rows() {
    let t = table(
        &["A", "B"],
        vec![
            row("o1", Some("A"), &[0.95, 0.05]),
            row("o2", Some("A"), &[0.55, 0.45]),
            row("o3", Some("B"), &[0.2, 0.8]),
        ],
    );
    let options = ConfusionMatrixOptions {
        p_min: 0.7,
        ..Default::default()
    };
    let report = make_confusion_matrix(&t, &options).unwrap();
    assert_eq!(report.n_objects, 2);
    assert_eq!(report.matrix.total(), 2);
    assert_eq!(report.accuracy, 1.0);
}

// ---------------------------------------------------------------------------
// Binary
// ---------------------------------------------------------------------------

#[test]
fn binary_collapses_to_snia_and_ccsn() {
    let t = table(
        &["SLSNe", "SNII", "SNIa"],
        vec![
            row("o1", Some("SNIa"), &[0.1, 0.1, 0.8]),
            row("o2", Some("SNIa"), &[0.1, 0.6, 0.3]),
            row("o3", Some("SNII"), &[0.2, 0.7, 0.1]),
            row("o4", Some("SLSNe"), &[0.2, 0.2, 0.6]),
        ],
    );
    let options = ConfusionMatrixOptions {
        binary: true,
        ..Default::default()
    };
    let report = make_confusion_matrix(&t, &options).unwrap();
    assert_eq!(report.matrix.classes(), &["CCSN".to_string(), "SNIa".to_string()]);
    assert_eq!(report.matrix.counts().shape(), (2, 2));
    // rows: true CCSN, true SNIa; columns: predicted CCSN, predicted SNIa
    assert_eq!(report.matrix.count(0, 0), 1);
    assert_eq!(report.matrix.count(0, 1), 1);
    assert_eq!(report.matrix.count(1, 0), 1);
    assert_eq!(report.matrix.count(1, 1), 1);
}

#[test]
fn binary_drops_rows_between_the_confidence_bounds() {
    let t = table(
        &["SLSNe", "SNII", "SNIa"],
        vec![
            row("o1", Some("SNIa"), &[0.05, 0.05, 0.9]),
            row("o2", Some("SNII"), &[0.1, 0.4, 0.5]),
            row("o3", Some("SNIa"), &[0.1, 0.3, 0.6]),
            row("o4", Some("SLSNe"), &[0.6, 0.3, 0.1]),
        ],
    );
    let options = ConfusionMatrixOptions {
        binary: true,
        p_min: 0.7,
        ..Default::default()
    };
    let report = make_confusion_matrix(&t, &options).unwrap();
    // P(SNIa) = 0.5 and 0.6 lie inside (0.3, 0.7)
    assert_eq!(report.n_objects, 2);
    assert_eq!(report.matrix.total(), 2);
    assert_eq!(report.matrix.count(0, 0), 1);
    assert_eq!(report.matrix.count(1, 1), 1);
    assert_eq!(report.matrix.count(0, 1), 0);
    assert_eq!(report.matrix.count(1, 0), 0);
    assert!((report.accuracy - 1.0).abs() < 1e-12);
}

#[test]
fn binary_requires_an_snia_column() {
    let t = table(&["A", "B"], vec![row("o1", Some("A"), &[0.5, 0.5])]);
    let options = ConfusionMatrixOptions {
        binary: true,
        ..Default::default()
    };
    assert!(make_confusion_matrix(&t, &options).is_err());
}
