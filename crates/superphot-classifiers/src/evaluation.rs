//! Confusion matrices, completeness/purity normalisation and summary scores.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::data_handling::ProbabilityTable;
use crate::error::{ClassifierError, Result};
use crate::math::vector::argmax;
use crate::math::Array2;

pub const SNIA: &str = "SNIa";
pub const CCSN: &str = "CCSN";

/// Which marginal a confusion matrix is normalised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    /// Divide each row by the number of objects of that true class.
    Completeness,
    /// Divide each column by the number of objects given that prediction.
    Purity,
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalization::Completeness => write!(f, "Completeness"),
            Normalization::Purity => write!(f, "Purity"),
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completeness" => Ok(Normalization::Completeness),
            "purity" => Ok(Normalization::Purity),
            _ => Err(format!("Unknown normalization: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfusionMatrixOptions {
    /// Rows whose confidence does not exceed this are left out.
    pub p_min: f64,
    pub normalization: Normalization,
    /// Collapse to SNIa vs CCSN.
    pub binary: bool,
}

impl Default for ConfusionMatrixOptions {
    fn default() -> Self {
        Self {
            p_min: 0.0,
            normalization: Normalization::Completeness,
            binary: false,
        }
    }
}

/// Counts indexed by (true class, predicted class).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    classes: Vec<String>,
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Count label pairs over `classes`. Labels not in `classes` are appended
    /// in sorted order.
    pub fn from_labels(classes: &[String], truth: &[String], predicted: &[String]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(ClassifierError::Data(format!(
                "{} true labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }
        let mut classes = classes.to_vec();
        let extra: BTreeSet<&String> = truth
            .iter()
            .chain(predicted)
            .filter(|label| !classes.contains(label))
            .collect();
        classes.extend(extra.into_iter().cloned());

        let n = classes.len();
        let mut counts = Array2::zeros(n, n);
        for (t, p) in truth.iter().zip(predicted) {
            let ti = classes.iter().position(|c| c == t);
            let pi = classes.iter().position(|c| c == p);
            if let (Some(ti), Some(pi)) = (ti, pi) {
                counts[(ti, pi)] += 1;
            }
        }
        Ok(Self { classes, counts })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn count(&self, true_class: usize, predicted_class: usize) -> usize {
        self.counts[(true_class, predicted_class)]
    }

    pub fn total(&self) -> usize {
        self.counts.as_slice().iter().sum()
    }

    /// Objects per true class.
    pub fn row_totals(&self) -> Vec<usize> {
        self.counts.rows().map(|r| r.iter().sum()).collect()
    }

    /// Objects per predicted class.
    pub fn column_totals(&self) -> Vec<usize> {
        let n = self.classes.len();
        (0..n)
            .map(|j| (0..n).map(|i| self.counts[(i, j)]).sum())
            .collect()
    }

    /// Fractions per row or column. Empty rows/columns give NaN cells.
    pub fn normalized(&self, normalization: Normalization) -> Array2<f64> {
        let n = self.classes.len();
        let rows = self.row_totals();
        let cols = self.column_totals();
        let mut out = Array2::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let denom = match normalization {
                    Normalization::Completeness => rows[i],
                    Normalization::Purity => cols[j],
                };
                out[(i, j)] = if denom == 0 {
                    f64::NAN
                } else {
                    self.counts[(i, j)] as f64 / denom as f64
                };
            }
        }
        out
    }

    /// Fraction of objects on the diagonal. NaN when empty.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let correct: usize = (0..self.classes.len()).map(|i| self.counts[(i, i)]).sum();
        correct as f64 / total as f64
    }

    /// Unweighted mean F1 over classes that occur as a true or predicted
    /// label. NaN when empty.
    pub fn macro_f1(&self) -> f64 {
        let rows = self.row_totals();
        let cols = self.column_totals();
        let scores: Vec<f64> = (0..self.classes.len())
            .filter(|&i| rows[i] > 0 || cols[i] > 0)
            .map(|i| {
                let tp = self.counts[(i, i)];
                let denom = rows[i] + cols[i];
                if denom == 0 {
                    0.0
                } else {
                    2.0 * tp as f64 / denom as f64
                }
            })
            .collect();
        if scores.is_empty() {
            f64::NAN
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

/// A confusion matrix with its normalisation and summary scores.
#[derive(Debug, Clone)]
pub struct ConfusionReport {
    pub matrix: ConfusionMatrix,
    pub normalized: Array2<f64>,
    pub options: ConfusionMatrixOptions,
    /// Rows surviving the label and confidence filters.
    pub n_objects: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
}

impl ConfusionReport {
    pub fn title(&self) -> String {
        format!(
            "{} (N={}, A={:.2}, F1={:.2})",
            self.options.normalization, self.n_objects, self.accuracy, self.macro_f1
        )
    }
}

impl fmt::Display for ConfusionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title())?;
        let classes = self.matrix.classes();
        let width = classes.iter().map(|c| c.len()).max().unwrap_or(0).max(6);
        write!(f, "{:>width$}", "", width = width)?;
        for c in classes {
            write!(f, " {:>width$}", c, width = width)?;
        }
        writeln!(f)?;
        for (i, c) in classes.iter().enumerate() {
            write!(f, "{:>width$}", c, width = width)?;
            for j in 0..classes.len() {
                let cell = format!("{:.2}({})", self.normalized[(i, j)], self.matrix.count(i, j));
                write!(f, " {:>width$}", cell, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Build the confusion matrix of a results table.
///
/// Rows without a true label are ignored. In multiclass mode the prediction is
/// the most probable class and rows are kept when that probability exceeds
/// `p_min`. In binary mode true labels collapse to SNIa/CCSN, the prediction is
/// SNIa when P(SNIa) > 0.5 and rows are kept when P(SNIa) > p_min or
/// P(SNIa) < 1 - p_min.
pub fn make_confusion_matrix(
    table: &ProbabilityTable,
    options: &ConfusionMatrixOptions,
) -> Result<ConfusionReport> {
    let labelled: Vec<_> = table
        .rows
        .iter()
        .filter_map(|row| row.metadata.label.as_ref().map(|label| (label, row)))
        .collect();
    debug!(
        "{} of {} result rows carry a true label",
        labelled.len(),
        table.rows.len()
    );

    let mut truth = Vec::new();
    let mut predicted = Vec::new();
    let classes: Vec<String> = if options.binary {
        let snia = table.class_index(SNIA).ok_or_else(|| {
            ClassifierError::Data(format!(
                "binary confusion matrix needs a '{}' probability column",
                SNIA
            ))
        })?;
        for (label, row) in &labelled {
            let p = row.probabilities[snia];
            if p > options.p_min || p < 1.0 - options.p_min {
                let collapsed = if label.as_str() == SNIA { SNIA } else { CCSN };
                truth.push(collapsed.to_string());
                predicted.push(if p > 0.5 { SNIA } else { CCSN }.to_string());
            }
        }
        vec![CCSN.to_string(), SNIA.to_string()]
    } else {
        for (label, row) in &labelled {
            let Some(best) = argmax(&row.probabilities) else {
                continue;
            };
            if row.probabilities[best] > options.p_min {
                truth.push((*label).clone());
                predicted.push(table.classes[best].clone());
            }
        }
        table.classes.clone()
    };

    let matrix = ConfusionMatrix::from_labels(&classes, &truth, &predicted)?;
    let report = ConfusionReport {
        normalized: matrix.normalized(options.normalization),
        accuracy: matrix.accuracy(),
        macro_f1: matrix.macro_f1(),
        n_objects: truth.len(),
        options: *options,
        matrix,
    };
    info!("{}", report.title());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn completeness_and_purity() {
        let m = ConfusionMatrix::from_labels(
            &strings(&["A", "B"]),
            &strings(&["A", "A", "B"]),
            &strings(&["A", "B", "B"]),
        )
        .unwrap();
        let c = m.normalized(Normalization::Completeness);
        assert_eq!(c.as_slice(), &[0.5, 0.5, 0.0, 1.0]);
        let p = m.normalized(Normalization::Purity);
        assert_eq!(p.as_slice(), &[1.0, 0.5, 0.0, 0.5]);
        assert!((m.accuracy() - 2.0 / 3.0).abs() < 1e-12);
        // F1(A) = 2/3, F1(B) = 2/3
        assert!((m.macro_f1() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_marginals_are_nan() {
        let m = ConfusionMatrix::from_labels(
            &strings(&["A", "B", "C"]),
            &strings(&["A", "B"]),
            &strings(&["A", "A"]),
        )
        .unwrap();
        let p = m.normalized(Normalization::Purity);
        assert!(p[(0, 2)].is_nan());
        let c = m.normalized(Normalization::Completeness);
        assert!(c[(2, 0)].is_nan());
        // C has neither support nor predictions
        assert!((m.macro_f1() - (2.0 / 3.0 + 0.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_true_labels_are_appended_sorted() {
        let m = ConfusionMatrix::from_labels(
            &strings(&["B", "A"]),
            &strings(&["Z", "C"]),
            &strings(&["A", "B"]),
        )
        .unwrap();
        assert_eq!(m.classes(), strings(&["B", "A", "C", "Z"]).as_slice());
    }

    #[test]
    fn empty_input_gives_nan_scores() {
        let m = ConfusionMatrix::from_labels(&strings(&["A"]), &[], &[]).unwrap();
        assert!(m.accuracy().is_nan());
        assert!(m.macro_f1().is_nan());
    }
}
