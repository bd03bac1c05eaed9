//! Dense linear algebra for the Gaussian resampler: column means, sample
//! covariance and Cholesky factorisation with diagonal loading.

use crate::math::Array2;

/// Relative pivot tolerance used when deciding a matrix is not positive definite.
const PIVOT_RTOL: f64 = 1e-12;
/// Initial diagonal load, relative to the mean absolute diagonal.
const INITIAL_LOAD: f64 = 1e-10;
const MAX_LOAD_ATTEMPTS: usize = 20;

/// Result of a regularised Cholesky factorisation.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    /// Lower-triangular factor `L` with `L Lᵀ ≈ A + λI`.
    pub lower: Array2<f64>,
    /// Diagonal load λ that was added before factorising (0 when none was needed).
    pub regularization: f64,
    /// True when every loading attempt failed and a diagonal factor was used.
    pub diagonal_fallback: bool,
}

/// Per-column mean of the rows of `x`.
pub fn column_means(x: &Array2<f64>) -> Vec<f64> {
    let (nrows, ncols) = x.shape();
    let mut mean = vec![0.0; ncols];
    if nrows == 0 {
        return mean;
    }
    for row in x.rows() {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in mean.iter_mut() {
        *m /= nrows as f64;
    }
    mean
}

/// Sample covariance with an `n - 1` denominator. A single row yields a zero matrix.
pub fn covariance(x: &Array2<f64>, mean: &[f64]) -> Array2<f64> {
    let (nrows, ncols) = x.shape();
    let mut cov = Array2::zeros(ncols, ncols);
    if nrows < 2 {
        return cov;
    }
    let mut centered = vec![0.0; ncols];
    for row in x.rows() {
        for (c, (v, m)) in centered.iter_mut().zip(row.iter().zip(mean)) {
            *c = v - m;
        }
        for i in 0..ncols {
            for j in 0..=i {
                cov[(i, j)] += centered[i] * centered[j];
            }
        }
    }
    let denom = (nrows - 1) as f64;
    for i in 0..ncols {
        for j in 0..=i {
            let v = cov[(i, j)] / denom;
            cov[(i, j)] = v;
            cov[(j, i)] = v;
        }
    }
    cov
}

/// Plain Cholesky factorisation of `a + load·I`. Returns `None` when a pivot is
/// not comfortably positive.
pub fn cholesky(a: &Array2<f64>, load: f64) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }
    let max_diag = (0..n)
        .map(|i| (a[(i, i)] + load).abs())
        .fold(0.0_f64, f64::max);
    let tol = PIVOT_RTOL * max_diag;

    let mut l = Array2::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[(i, k)] * l[(j, k)];
            }
            if i == j {
                let pivot = a[(i, i)] + load - sum;
                if !pivot.is_finite() || pivot <= tol {
                    return None;
                }
                l[(i, j)] = pivot.sqrt();
            } else {
                l[(i, j)] = (a[(i, j)] - sum) / l[(j, j)];
            }
        }
    }
    Some(l)
}

/// Cholesky factorisation that tolerates singular or indefinite input.
///
/// The unloaded matrix is tried first. On failure a diagonal load starting at
/// `1e-10 * max(mean |diag|, 1)` is added and grown tenfold per attempt. After
/// the last attempt the factor falls back to `diag(sqrt(|a_ii| + λ))`.
pub fn regularized_cholesky(a: &Array2<f64>) -> CholeskyFactor {
    if let Some(lower) = cholesky(a, 0.0) {
        return CholeskyFactor {
            lower,
            regularization: 0.0,
            diagonal_fallback: false,
        };
    }

    let n = a.nrows();
    let mean_diag = if n == 0 {
        0.0
    } else {
        (0..n).map(|i| a[(i, i)].abs()).sum::<f64>() / n as f64
    };
    let mut load = INITIAL_LOAD * mean_diag.max(1.0);
    for _ in 0..MAX_LOAD_ATTEMPTS {
        if let Some(lower) = cholesky(a, load) {
            return CholeskyFactor {
                lower,
                regularization: load,
                diagonal_fallback: false,
            };
        }
        load *= 10.0;
    }

    let mut lower = Array2::zeros(n, n);
    for i in 0..n {
        let d = a[(i, i)].abs() + load;
        lower[(i, i)] = if d.is_finite() { d.sqrt() } else { 0.0 };
    }
    CholeskyFactor {
        lower,
        regularization: load,
        diagonal_fallback: true,
    }
}

/// Compute `mean + L z` for a lower-triangular `L`.
pub fn affine_lower(mean: &[f64], lower: &Array2<f64>, z: &[f64]) -> Vec<f64> {
    let n = mean.len();
    let mut out = mean.to_vec();
    for i in 0..n {
        let row = lower.row_slice(i);
        let mut acc = 0.0;
        for k in 0..=i {
            acc += row[k] * z[k];
        }
        out[i] += acc;
    }
    out
}
