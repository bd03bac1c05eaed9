use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::math::Array2;
use crate::resampling::{
    check_inputs, class_counts, class_indices, seeded_rng, ResampleResult, SamplingTarget,
};

/// SMOTE over-sampling: every class is topped up to the majority count by
/// interpolating between a random member and one of its nearest same-class
/// neighbours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    k_neighbors: usize,
    random_state: Option<u64>,
}

impl Smote {
    pub fn new(k_neighbors: usize, random_state: Option<u64>) -> Self {
        Self {
            k_neighbors: k_neighbors.max(1),
            random_state,
        }
    }

    fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b).map(|(ai, bi)| (ai - bi).powi(2)).sum()
    }

    /// Positions (within `members`) of the `k` nearest members to `members[pos]`,
    /// excluding `pos` itself.
    fn neighbours(x: &Array2<f64>, members: &[usize], pos: usize, k: usize) -> Vec<usize> {
        let point = x.row_slice(members[pos]);
        let mut dists: Vec<(f64, usize)> = members
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(i, &row)| (Self::squared_distance(point, x.row_slice(row)), i))
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        dists.truncate(k);
        dists.into_iter().map(|(_, i)| i).collect()
    }

    pub fn fit_resample(&mut self, x: &Array2<f64>, y: &[String]) -> Result<ResampleResult> {
        check_inputs(x, y)?;
        let counts = class_counts(y);
        let targets = SamplingTarget::Balance.resolve(&counts)?;
        let indices = class_indices(y);
        let mut rng = seeded_rng(self.random_state);

        let mut synthetic = Vec::new();
        let mut synthetic_y = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (class, &target) in &targets {
            let members = &indices[class];
            let n_samples = target.saturating_sub(members.len());
            n_synthetic.insert(class.clone(), n_samples);
            if n_samples == 0 {
                continue;
            }
            if members.len() < 2 {
                return Err(ClassifierError::Data(format!(
                    "SMOTE needs at least 2 samples of class '{}' to interpolate, found {}",
                    class,
                    members.len()
                )));
            }
            let k = self.k_neighbors.min(members.len() - 1);
            let mut neighbour_cache: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for _ in 0..n_samples {
                let pos = rng.gen_range(0..members.len());
                let neighbours = neighbour_cache
                    .entry(pos)
                    .or_insert_with(|| Self::neighbours(x, members, pos, k));
                let other = neighbours[rng.gen_range(0..neighbours.len())];
                let gap: f64 = rng.gen();
                let a = x.row_slice(members[pos]);
                let b = x.row_slice(members[other]);
                synthetic.extend(a.iter().zip(b).map(|(&p, &q)| p + gap * (q - p)));
                synthetic_y.push(class.clone());
            }
            debug!("SMOTE generated {} rows for class '{}'", n_samples, class);
        }

        let mut out_x = x.clone();
        out_x.append_rows(&Array2::from_shape_vec(
            (synthetic_y.len(), x.ncols()),
            synthetic,
        )?)?;
        let mut out_y = y.to_vec();
        out_y.extend(synthetic_y);

        Ok(ResampleResult {
            x: out_x,
            y: out_y,
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balances_to_majority_within_class_hull() {
        let x = Array2::from_rows(
            &[
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![10.0, 10.0],
                vec![11.0, 10.0],
            ],
            2,
        )
        .unwrap();
        let y: Vec<String> = ["A", "A", "A", "A", "B", "B"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let out = Smote::new(5, Some(2)).fit_resample(&x, &y).unwrap();
        let counts = class_counts(&out.y);
        assert_eq!(counts["A"], 4);
        assert_eq!(counts["B"], 4);
        for r in 6..out.x.nrows() {
            let row = out.x.row_slice(r);
            assert!(row[0] >= 10.0 && row[0] <= 11.0);
            assert_eq!(row[1], 10.0);
        }
    }

    #[test]
    fn single_member_minority_is_an_error() {
        let x = Array2::from_rows(&[vec![0.0], vec![1.0], vec![5.0]], 1).unwrap();
        let y: Vec<String> = ["A", "A", "B"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            Smote::new(5, Some(0)).fit_resample(&x, &y),
            Err(ClassifierError::Data(_))
        ));
    }
}
