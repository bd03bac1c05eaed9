//! Class-balancing resamplers.
//!
//! Two strategies are available: a multivariate Gaussian balancer, which fits
//! one Gaussian per class and can keep drawing from it after fitting, and
//! SMOTE, which interpolates between same-class neighbours. Both append
//! synthetic rows after the original rows and never drop samples.

mod multivariate_gaussian;
mod smote;

pub use multivariate_gaussian::{
    BalancerState, ClassDistribution, FittedDistributionSet, MultivariateGaussianBalancer,
};
pub use smote::Smote;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::SamplerType;
use crate::error::{ClassifierError, Result};
use crate::math::Array2;

/// How many rows each class should have after resampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplingTarget {
    /// Top every class up to the majority class count.
    Balance,
    /// Top every class up to `k` rows, the majority class included.
    SamplesPerClass(usize),
    /// Explicit totals for the named classes. Other classes are left alone.
    Counts(BTreeMap<String, usize>),
}

impl SamplingTarget {
    /// Resolve the target total for every class that takes part in resampling.
    ///
    /// Targets below the current count are raised to it: classes are never
    /// down-sampled.
    pub fn resolve(&self, counts: &BTreeMap<String, usize>) -> Result<BTreeMap<String, usize>> {
        match self {
            SamplingTarget::Balance => {
                let majority = counts.values().copied().max().unwrap_or(0);
                Ok(counts
                    .iter()
                    .map(|(class, &n)| (class.clone(), n.max(majority)))
                    .collect())
            }
            SamplingTarget::SamplesPerClass(k) => Ok(counts
                .iter()
                .map(|(class, &n)| (class.clone(), n.max(*k)))
                .collect()),
            SamplingTarget::Counts(targets) => {
                let mut resolved = BTreeMap::new();
                for (class, &target) in targets {
                    let n = counts.get(class).copied().ok_or_else(|| {
                        ClassifierError::Data(format!(
                            "sampling target names class '{}' which has no samples",
                            class
                        ))
                    })?;
                    resolved.insert(class.clone(), n.max(target));
                }
                Ok(resolved)
            }
        }
    }
}

/// Output of a resampling step: originals first, then synthetic rows.
#[derive(Debug, Clone)]
pub struct ResampleResult {
    pub x: Array2<f64>,
    pub y: Vec<String>,
    /// Synthetic rows generated per class.
    pub n_synthetic: BTreeMap<String, usize>,
}

impl ResampleResult {
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.values().sum()
    }
}

/// Number of rows per class label.
pub fn class_counts(y: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for label in y {
        *counts.entry(label.clone()).or_insert(0) += 1;
    }
    counts
}

/// Row indices per class label.
pub fn class_indices(y: &[String]) -> BTreeMap<String, Vec<usize>> {
    let mut indices: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, label) in y.iter().enumerate() {
        indices.entry(label.clone()).or_default().push(i);
    }
    indices
}

pub(crate) fn seeded_rng(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub(crate) fn check_inputs(x: &Array2<f64>, y: &[String]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ClassifierError::Data(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }
    if y.is_empty() {
        return Err(ClassifierError::Data(
            "cannot resample an empty dataset".to_string(),
        ));
    }
    Ok(())
}

/// Resampling step of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Sampler {
    MultivariateGaussian(MultivariateGaussianBalancer),
    Smote(Smote),
}

impl Sampler {
    pub fn from_config(config: &SamplerType, random_state: Option<u64>) -> Self {
        match config {
            SamplerType::Mvg { target } => Sampler::MultivariateGaussian(
                MultivariateGaussianBalancer::new(target.clone(), random_state),
            ),
            SamplerType::Smote { k_neighbors } => {
                Sampler::Smote(Smote::new(*k_neighbors, random_state))
            }
        }
    }

    pub fn fit_resample(&mut self, x: &Array2<f64>, y: &[String]) -> Result<ResampleResult> {
        match self {
            Sampler::MultivariateGaussian(balancer) => balancer.fit_resample(x, y),
            Sampler::Smote(smote) => smote.fit_resample(x, y),
        }
    }

    /// Draw `n` further samples per fitted class. Only the Gaussian balancer
    /// supports this.
    pub fn more_samples(&mut self, n: usize) -> Result<(Array2<f64>, Vec<String>)> {
        match self {
            Sampler::MultivariateGaussian(balancer) => balancer.more_samples(n),
            Sampler::Smote(_) => Err(ClassifierError::Config(
                "the smote sampler cannot draw additional samples".to_string(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sampler::MultivariateGaussian(_) => "mvg",
            Sampler::Smote(_) => "smote",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(c, n)| (c.to_string(), *n)).collect()
    }

    #[test]
    fn balance_tops_up_to_majority() {
        let resolved = SamplingTarget::Balance
            .resolve(&counts(&[("A", 10), ("B", 3)]))
            .unwrap();
        assert_eq!(resolved, counts(&[("A", 10), ("B", 10)]));
    }

    #[test]
    fn samples_per_class_never_trims() {
        let resolved = SamplingTarget::SamplesPerClass(5)
            .resolve(&counts(&[("A", 10), ("B", 3)]))
            .unwrap();
        assert_eq!(resolved, counts(&[("A", 10), ("B", 5)]));
    }

    #[test]
    fn explicit_counts_only_cover_named_classes() {
        let target = SamplingTarget::Counts(counts(&[("B", 6)]));
        let resolved = target.resolve(&counts(&[("A", 10), ("B", 3)])).unwrap();
        assert_eq!(resolved, counts(&[("B", 6)]));

        let missing = SamplingTarget::Counts(counts(&[("C", 6)]));
        assert!(missing.resolve(&counts(&[("A", 10)])).is_err());
    }

    #[test]
    fn smote_has_no_more_samples() {
        let mut sampler = Sampler::from_config(&SamplerType::Smote { k_neighbors: 5 }, Some(1));
        assert!(matches!(
            sampler.more_samples(3),
            Err(ClassifierError::Config(_))
        ));
    }
}
