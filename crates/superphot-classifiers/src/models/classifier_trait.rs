use crate::error::{ClassifierError, Result};
use crate::math::vector::argmax;
use crate::math::Array2;

/// Contract every leaf classifier fulfils inside a pipeline.
///
/// Labels are encoded as indices into the pipeline's sorted class list, so
/// `y[i] < n_classes`. `predict_proba` returns one row per sample and one
/// column per class, each row summing to 1.
pub trait ProbabilisticClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Index of the most probable class per sample (first on ties).
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .map(|row| argmax(row).unwrap_or(0))
            .collect())
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Shared input validation for `fit`.
pub(crate) fn check_training_input(x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ClassifierError::Data(
            "cannot fit a classifier on zero samples".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(ClassifierError::Data(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&label| label >= n_classes) {
        return Err(ClassifierError::Data(format!(
            "label index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// Normalise each row to sum to one. Rows with no mass become uniform.
pub(crate) fn normalize_rows(proba: &mut Array2<f64>) {
    let ncols = proba.ncols();
    for r in 0..proba.nrows() {
        let row = proba.row_slice_mut(r);
        let total: f64 = row.iter().sum();
        if total > 0.0 && total.is_finite() {
            row.iter_mut().for_each(|v| *v /= total);
        } else {
            row.iter_mut().for_each(|v| *v = 1.0 / ncols as f64);
        }
    }
}
