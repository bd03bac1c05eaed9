use std::collections::BTreeMap;

use log::{debug, warn};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::{ClassifierError, Result};
use crate::math::linalg::{affine_lower, column_means, covariance, regularized_cholesky};
use crate::math::Array2;
use crate::resampling::{
    check_inputs, class_counts, class_indices, seeded_rng, ResampleResult, SamplingTarget,
};

/// Gaussian fitted to the rows of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub mean: Vec<f64>,
    pub covariance: Array2<f64>,
    /// Lower Cholesky factor of `covariance + regularization·I`.
    pub factor: Array2<f64>,
    pub regularization: f64,
    /// Number of original rows the distribution was estimated from.
    pub n_source: usize,
}

impl ClassDistribution {
    fn estimate(class: &str, x: &Array2<f64>) -> Self {
        let mean = column_means(x);
        let covariance = covariance(x, &mean);
        let chol = regularized_cholesky(&covariance);
        if chol.diagonal_fallback {
            warn!(
                "Covariance of class '{}' could not be factorised; using a diagonal factor (load {:.3e})",
                class, chol.regularization
            );
        } else if chol.regularization > 0.0 {
            warn!(
                "Covariance of class '{}' is singular; added diagonal load {:.3e}",
                class, chol.regularization
            );
        }
        ClassDistribution {
            mean,
            covariance,
            factor: chol.lower,
            regularization: chol.regularization,
            n_source: x.nrows(),
        }
    }

    fn draw_into(&self, n: usize, rng: &mut StdRng, normal: &Normal, out: &mut Vec<f64>) {
        let dim = self.mean.len();
        let mut z = vec![0.0; dim];
        for _ in 0..n {
            for v in z.iter_mut() {
                *v = normal.sample(rng);
            }
            out.extend(affine_lower(&self.mean, &self.factor, &z));
        }
    }
}

/// Class label → fitted Gaussian. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDistributionSet {
    classes: BTreeMap<String, ClassDistribution>,
}

impl FittedDistributionSet {
    pub fn get(&self, class: &str) -> Option<&ClassDistribution> {
        self.classes.get(class)
    }

    /// Fitted classes in sorted order.
    pub fn classes(&self) -> impl Iterator<Item = &String> {
        self.classes.keys()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Diagonal load applied per class.
    pub fn regularization(&self) -> BTreeMap<String, f64> {
        self.classes
            .iter()
            .map(|(class, dist)| (class.clone(), dist.regularization))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BalancerState {
    Unfitted,
    Fitted(FittedDistributionSet),
}

/// Over-samples classes by drawing from a multivariate normal fitted to each
/// class.
///
/// The fitted distributions are kept so that [`more_samples`] can generate
/// additional synthetic data after `fit_resample`.
///
/// [`more_samples`]: MultivariateGaussianBalancer::more_samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultivariateGaussianBalancer {
    target: SamplingTarget,
    random_state: Option<u64>,
    state: BalancerState,
    #[serde(skip)]
    rng: Option<StdRng>,
}

impl MultivariateGaussianBalancer {
    pub fn new(target: SamplingTarget, random_state: Option<u64>) -> Self {
        Self {
            target,
            random_state,
            state: BalancerState::Unfitted,
            rng: None,
        }
    }

    pub fn target(&self) -> &SamplingTarget {
        &self.target
    }

    pub fn state(&self) -> &BalancerState {
        &self.state
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, BalancerState::Fitted(_))
    }

    pub fn distributions(&self) -> Option<&FittedDistributionSet> {
        match &self.state {
            BalancerState::Fitted(set) => Some(set),
            BalancerState::Unfitted => None,
        }
    }

    fn standard_normal() -> Result<Normal> {
        Normal::new(0.0, 1.0).map_err(|e| ClassifierError::Config(e.to_string()))
    }

    /// Fit one Gaussian per targeted class and append synthetic rows until every
    /// class reaches its target. Replaces any previously fitted distributions.
    pub fn fit_resample(&mut self, x: &Array2<f64>, y: &[String]) -> Result<ResampleResult> {
        check_inputs(x, y)?;
        let counts = class_counts(y);
        let targets = self.target.resolve(&counts)?;
        let indices = class_indices(y);
        let normal = Self::standard_normal()?;
        let mut rng = seeded_rng(self.random_state);

        let mut classes = BTreeMap::new();
        let mut synthetic = Vec::new();
        let mut synthetic_y = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (class, &target) in &targets {
            let rows = &indices[class];
            let dist = ClassDistribution::estimate(class, &x.select_rows(rows));
            let n_samples = target.saturating_sub(rows.len());
            if n_samples > 0 {
                dist.draw_into(n_samples, &mut rng, &normal, &mut synthetic);
                synthetic_y.extend(std::iter::repeat(class.clone()).take(n_samples));
            }
            debug!(
                "Class '{}': {} original rows, {} synthetic rows",
                class,
                rows.len(),
                n_samples
            );
            n_synthetic.insert(class.clone(), n_samples);
            classes.insert(class.clone(), dist);
        }

        let mut out_x = x.clone();
        out_x.append_rows(&Array2::from_shape_vec(
            (synthetic_y.len(), x.ncols()),
            synthetic,
        )?)?;
        let mut out_y = y.to_vec();
        out_y.extend(synthetic_y);

        self.state = BalancerState::Fitted(FittedDistributionSet { classes });
        self.rng = Some(rng);

        Ok(ResampleResult {
            x: out_x,
            y: out_y,
            n_synthetic,
        })
    }

    /// Draw `n` samples from every fitted class, in sorted class order.
    ///
    /// Continues the random stream of the last `fit_resample`. A balancer that
    /// was deserialized starts a fresh stream from its `random_state`.
    pub fn more_samples(&mut self, n: usize) -> Result<(Array2<f64>, Vec<String>)> {
        let set = match &self.state {
            BalancerState::Fitted(set) => set,
            BalancerState::Unfitted => {
                return Err(ClassifierError::Unfitted("MultivariateGaussianBalancer"))
            }
        };
        let normal = Self::standard_normal()?;
        let random_state = self.random_state;
        let rng = self.rng.get_or_insert_with(|| seeded_rng(random_state));

        let ncols = set
            .classes
            .values()
            .next()
            .map(|d| d.mean.len())
            .unwrap_or(0);
        let mut data = Vec::with_capacity(n * set.len() * ncols);
        let mut labels = Vec::with_capacity(n * set.len());
        for (class, dist) in &set.classes {
            dist.draw_into(n, rng, &normal, &mut data);
            labels.extend(std::iter::repeat(class.clone()).take(n));
        }
        let x = Array2::from_shape_vec((labels.len(), ncols), data)?;
        Ok((x, labels))
    }
}
