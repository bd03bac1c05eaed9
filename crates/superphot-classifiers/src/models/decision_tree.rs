//! CART classification tree used by the random forest.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::Criterion;
use crate::math::Array2;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Split parameters shared by every tree of a forest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub max_features: Option<usize>,
}

/// A fitted tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn impurity(criterion: Criterion, counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    match criterion {
        Criterion::Gini => 1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
        Criterion::Entropy => -counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                p * p.log2()
            })
            .sum::<f64>(),
    }
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `rows` (repeats allowed).
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        rows: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let min_leaf = params.min_samples_leaf.max(1);
        let mut nodes = vec![Node::Leaf {
            distribution: Vec::new(),
        }];
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        let mut stack = vec![(0usize, rows, 0usize)];

        while let Some((node, rows, depth)) = stack.pop() {
            let mut counts = vec![0usize; n_classes];
            for &r in &rows {
                counts[y[r]] += 1;
            }
            let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            let depth_reached = params.max_depth.map_or(false, |d| depth >= d);

            let split = if pure || depth_reached || rows.len() < 2 * min_leaf {
                None
            } else {
                features.shuffle(rng);
                Self::best_split(x, y, n_classes, &rows, &features, params, min_leaf)
            };

            match split {
                Some(best) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .into_iter()
                        .partition(|&r| x[(r, best.feature)] <= best.threshold);
                    let left = nodes.len();
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes.push(Node::Leaf {
                        distribution: Vec::new(),
                    });
                    nodes[node] = Node::Split {
                        feature: best.feature,
                        threshold: best.threshold,
                        left,
                        right: left + 1,
                    };
                    stack.push((left, left_rows, depth + 1));
                    stack.push((left + 1, right_rows, depth + 1));
                }
                None => {
                    let n = rows.len().max(1) as f64;
                    nodes[node] = Node::Leaf {
                        distribution: counts.iter().map(|&c| c as f64 / n).collect(),
                    };
                }
            }
        }

        Self { nodes, n_classes }
    }

    /// Scan features in the given order until `max_features` non-constant ones
    /// have been evaluated and a valid split exists.
    fn best_split(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
        min_leaf: usize,
    ) -> Option<BestSplit> {
        let max_features = params.max_features.unwrap_or(features.len()).max(1);
        let total = rows.len();
        let mut best: Option<BestSplit> = None;
        let mut evaluated = 0;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(total);

        for &feature in features {
            if evaluated >= max_features && best.is_some() {
                break;
            }
            sorted.clear();
            sorted.extend(rows.iter().map(|&r| (x[(r, feature)], y[r])));
            sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
            if sorted[0].0 == sorted[total - 1].0 {
                continue;
            }
            evaluated += 1;

            let mut left = vec![0usize; n_classes];
            let mut right = vec![0usize; n_classes];
            for &(_, label) in &sorted {
                right[label] += 1;
            }
            for i in 0..total - 1 {
                let label = sorted[i].1;
                left[label] += 1;
                right[label] -= 1;
                let n_left = i + 1;
                let n_right = total - n_left;
                if n_left < min_leaf || n_right < min_leaf || sorted[i].0 == sorted[i + 1].0 {
                    continue;
                }
                let weighted = (n_left as f64 * impurity(params.criterion, &left, n_left)
                    + n_right as f64 * impurity(params.criterion, &right, n_right))
                    / total as f64;
                if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                    let (lo, hi) = (sorted[i].0, sorted[i + 1].0);
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity: weighted,
                    });
                }
            }
        }
        best
    }

    /// Class distribution of the leaf `sample` falls into.
    pub fn leaf_distribution(&self, sample: &[f64]) -> &[f64] {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}
