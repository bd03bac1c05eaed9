//! Feature standardisation.
//!
//! `StandardScaler` removes the per-feature mean and scales to unit variance.
//! It is fitted once on training features and then frozen; the same statistics
//! are applied at predict time.

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::math::linalg::column_means;
use crate::math::Array2;

/// Per-column mean/std standard scaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Columns with a smaller standard deviation are left unscaled.
    const MIN_STD: f64 = 1e-12;

    /// Fit on `x` where rows are samples and columns are features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let (nrows, ncols) = x.shape();
        if nrows == 0 || ncols == 0 {
            return Err(ClassifierError::Data(
                "cannot fit a scaler on an empty feature matrix".to_string(),
            ));
        }

        let mean = column_means(x);
        let mut var = vec![0.0; ncols];
        for row in x.rows() {
            for (c, v) in row.iter().enumerate() {
                let d = v - mean[c];
                var[c] += d * d;
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / nrows as f64).sqrt();
                if std.is_finite() && std >= Self::MIN_STD {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Standardise every row with the frozen statistics.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (nrows, ncols) = x.shape();
        if ncols != self.n_features() {
            return Err(ClassifierError::Data(format!(
                "scaler was fitted on {} features but got {}",
                self.n_features(),
                ncols
            )));
        }
        let mut out = Vec::with_capacity(nrows * ncols);
        for row in x.rows() {
            for (c, v) in row.iter().enumerate() {
                out.push((v - self.mean[c]) / self.scale[c]);
            }
        }
        Ok(Array2::from_shape_vec((nrows, ncols), out)?)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let transformed = scaler.transform(x)?;
        Ok((scaler, transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardises_columns() {
        let x = Array2::from_rows(&[vec![1.0, 5.0], vec![3.0, 5.0]], 2).unwrap();
        let (scaler, z) = StandardScaler::fit_transform(&x).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);
        assert_eq!(z.as_slice(), &[-1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn rejects_wrong_width() {
        let x = Array2::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        let scaler = StandardScaler::fit(&x).unwrap();
        let narrow = Array2::from_rows(&[vec![1.0]], 1).unwrap();
        assert!(matches!(
            scaler.transform(&narrow),
            Err(ClassifierError::Data(_))
        ));
    }
}
