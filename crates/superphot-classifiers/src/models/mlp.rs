//! Multilayer perceptron classifier: ReLU hidden layers, softmax output,
//! cross-entropy loss, mini-batch Adam with an L2 penalty and optional early
//! stopping on a held-out validation split.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierType;
use crate::error::{ClassifierError, Result};
use crate::math::vector::argmax;
use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, ProbabilisticClassifier};
use crate::resampling::seeded_rng;

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Layer {
    /// `n_in × n_out`
    weights: Array2<f64>,
    biases: Vec<f64>,
}

impl Layer {
    fn zeros_like(&self) -> Self {
        Layer {
            weights: Array2::zeros(self.weights.nrows(), self.weights.ncols()),
            biases: vec![0.0; self.biases.len()],
        }
    }

    fn clear(&mut self) {
        self.weights.as_mut_slice().iter_mut().for_each(|v| *v = 0.0);
        self.biases.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpClassifier {
    hidden_layer_sizes: Vec<usize>,
    alpha: f64,
    learning_rate: f64,
    max_iter: usize,
    batch_size: usize,
    early_stopping: bool,
    validation_fraction: f64,
    n_iter_no_change: usize,
    tol: f64,
    random_state: Option<u64>,
    layers: Vec<Layer>,
    n_features: usize,
    n_classes: usize,
    n_iter: usize,
}

struct Adam {
    m: Vec<Layer>,
    v: Vec<Layer>,
    t: i32,
}

impl Adam {
    fn new(layers: &[Layer]) -> Self {
        Adam {
            m: layers.iter().map(Layer::zeros_like).collect(),
            v: layers.iter().map(Layer::zeros_like).collect(),
            t: 0,
        }
    }

    fn step(&mut self, layers: &mut [Layer], grads: &[Layer], learning_rate: f64) {
        self.t += 1;
        let lr = learning_rate * (1.0 - BETA_2.powi(self.t)).sqrt() / (1.0 - BETA_1.powi(self.t));
        let state = self.m.iter_mut().zip(self.v.iter_mut());
        for ((layer, grad), (m, v)) in layers.iter_mut().zip(grads).zip(state) {
            let pairs = [
                (
                    layer.weights.as_mut_slice(),
                    grad.weights.as_slice(),
                    m.weights.as_mut_slice(),
                    v.weights.as_mut_slice(),
                ),
                (
                    layer.biases.as_mut_slice(),
                    grad.biases.as_slice(),
                    m.biases.as_mut_slice(),
                    v.biases.as_mut_slice(),
                ),
            ];
            for (params, grad, m, v) in pairs {
                for k in 0..params.len() {
                    m[k] = BETA_1 * m[k] + (1.0 - BETA_1) * grad[k];
                    v[k] = BETA_2 * v[k] + (1.0 - BETA_2) * grad[k] * grad[k];
                    params[k] -= lr * m[k] / (v[k].sqrt() + ADAM_EPS);
                }
            }
        }
    }
}

fn softmax(z: &mut [f64]) {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for v in z.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    for v in z.iter_mut() {
        *v /= total;
    }
}

/// Activations of every layer, input first.
fn forward(layers: &[Layer], sample: &[f64]) -> Vec<Vec<f64>> {
    let mut acts = Vec::with_capacity(layers.len() + 1);
    acts.push(sample.to_vec());
    for (i, layer) in layers.iter().enumerate() {
        let mut z = layer.biases.clone();
        for (k, &a) in acts[i].iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            for (zj, w) in z.iter_mut().zip(layer.weights.row_slice(k)) {
                *zj += a * w;
            }
        }
        if i + 1 == layers.len() {
            softmax(&mut z);
        } else {
            z.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        acts.push(z);
    }
    acts
}

/// Accumulate the cross-entropy gradient of one sample into `grads`.
fn backprop(layers: &[Layer], acts: &[Vec<f64>], label: usize, grads: &mut [Layer]) {
    let mut delta = acts[layers.len()].clone();
    delta[label] -= 1.0;
    for i in (0..layers.len()).rev() {
        let input = &acts[i];
        for (g, d) in grads[i].biases.iter_mut().zip(&delta) {
            *g += d;
        }
        for (k, &a) in input.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            for (g, d) in grads[i].weights.row_slice_mut(k).iter_mut().zip(&delta) {
                *g += a * d;
            }
        }
        if i > 0 {
            delta = input
                .iter()
                .enumerate()
                .map(|(k, &a)| {
                    if a > 0.0 {
                        layers[i]
                            .weights
                            .row_slice(k)
                            .iter()
                            .zip(&delta)
                            .map(|(w, d)| w * d)
                            .sum()
                    } else {
                        0.0
                    }
                })
                .collect();
        }
    }
}

impl MlpClassifier {
    pub fn from_config(config: &ClassifierType, random_state: Option<u64>) -> Result<Self> {
        match config {
            ClassifierType::Mlp {
                hidden_layer_sizes,
                alpha,
                learning_rate,
                max_iter,
                batch_size,
                early_stopping,
                validation_fraction,
                n_iter_no_change,
                tol,
            } => {
                if !(0.0..1.0).contains(validation_fraction) {
                    return Err(ClassifierError::Config(format!(
                        "validation_fraction must be in [0, 1), got {}",
                        validation_fraction
                    )));
                }
                if *learning_rate <= 0.0 {
                    return Err(ClassifierError::Config(format!(
                        "learning_rate must be positive, got {}",
                        learning_rate
                    )));
                }
                Ok(MlpClassifier {
                    hidden_layer_sizes: hidden_layer_sizes.clone(),
                    alpha: *alpha,
                    learning_rate: *learning_rate,
                    max_iter: *max_iter,
                    batch_size: (*batch_size).max(1),
                    early_stopping: *early_stopping,
                    validation_fraction: *validation_fraction,
                    n_iter_no_change: (*n_iter_no_change).max(1),
                    tol: *tol,
                    random_state,
                    layers: Vec::new(),
                    n_features: 0,
                    n_classes: 0,
                    n_iter: 0,
                })
            }
            other => Err(ClassifierError::Config(format!(
                "expected mlp parameters, got {}",
                other.name()
            ))),
        }
    }

    /// Epochs run by the last `fit`.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn initialize(&mut self, rng: &mut StdRng) {
        let mut sizes = vec![self.n_features];
        sizes.extend(self.hidden_layer_sizes.iter().copied().filter(|&s| s > 0));
        sizes.push(self.n_classes);

        self.layers = sizes
            .windows(2)
            .map(|w| {
                let (n_in, n_out) = (w[0], w[1]);
                let bound = (6.0 / (n_in + n_out) as f64).sqrt();
                let mut layer = Layer {
                    weights: Array2::zeros(n_in, n_out),
                    biases: vec![0.0; n_out],
                };
                for v in layer.weights.as_mut_slice() {
                    *v = rng.gen_range(-bound..bound);
                }
                for v in layer.biases.iter_mut() {
                    *v = rng.gen_range(-bound..bound);
                }
                layer
            })
            .collect();
    }

    fn accuracy(&self, x: &Array2<f64>, y: &[usize], rows: &[usize]) -> f64 {
        let correct = rows
            .iter()
            .filter(|&&r| {
                let acts = forward(&self.layers, x.row_slice(r));
                argmax(&acts[self.layers.len()]) == Some(y[r])
            })
            .count();
        correct as f64 / rows.len() as f64
    }
}

impl ProbabilisticClassifier for MlpClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_training_input(x, y, n_classes)?;
        self.n_features = x.ncols();
        self.n_classes = n_classes;
        let mut rng = seeded_rng(self.random_state);
        self.initialize(&mut rng);

        let n_samples = x.nrows();
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let n_val = if self.early_stopping && n_samples >= 2 {
            ((self.validation_fraction * n_samples as f64) as usize).clamp(1, n_samples - 1)
        } else {
            0
        };
        let validation: Vec<usize> = if n_val > 0 {
            indices.shuffle(&mut rng);
            indices.split_off(n_samples - n_val)
        } else {
            Vec::new()
        };
        let mut train = indices;

        let mut adam = Adam::new(&self.layers);
        let mut grads: Vec<Layer> = self.layers.iter().map(Layer::zeros_like).collect();
        let mut best_layers = self.layers.clone();
        let mut best_score = f64::NEG_INFINITY;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        self.n_iter = 0;

        for epoch in 0..self.max_iter {
            train.shuffle(&mut rng);
            let mut loss = 0.0;
            for batch in train.chunks(self.batch_size) {
                grads.iter_mut().for_each(Layer::clear);
                for &r in batch {
                    let acts = forward(&self.layers, x.row_slice(r));
                    loss -= acts[self.layers.len()][y[r]].max(1e-10).ln();
                    backprop(&self.layers, &acts, y[r], &mut grads);
                }
                let n = batch.len() as f64;
                for (g, layer) in grads.iter_mut().zip(&self.layers) {
                    for (gw, w) in g
                        .weights
                        .as_mut_slice()
                        .iter_mut()
                        .zip(layer.weights.as_slice())
                    {
                        *gw = (*gw + self.alpha * w) / n;
                    }
                    g.biases.iter_mut().for_each(|gb| *gb /= n);
                }
                adam.step(&mut self.layers, &grads, self.learning_rate);
            }
            loss /= train.len() as f64;
            self.n_iter = epoch + 1;

            if n_val > 0 {
                let score = self.accuracy(x, y, &validation);
                if score > best_score + self.tol {
                    no_improvement = 0;
                } else {
                    no_improvement += 1;
                }
                if score > best_score {
                    best_score = score;
                    best_layers = self.layers.clone();
                }
            } else if loss < best_loss - self.tol {
                best_loss = loss;
                no_improvement = 0;
            } else {
                best_loss = best_loss.min(loss);
                no_improvement += 1;
            }
            if no_improvement >= self.n_iter_no_change {
                debug!("MLP converged after {} epochs (loss {:.4})", epoch + 1, loss);
                break;
            }
        }

        if n_val > 0 {
            self.layers = best_layers;
        }
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.layers.is_empty() {
            return Err(ClassifierError::Unfitted("MlpClassifier"));
        }
        if x.ncols() != self.n_features {
            return Err(ClassifierError::Data(format!(
                "mlp was fitted on {} features but got {}",
                self.n_features,
                x.ncols()
            )));
        }
        let mut data = Vec::with_capacity(x.nrows() * self.n_classes);
        for sample in x.rows() {
            let mut acts = forward(&self.layers, sample);
            data.append(&mut acts[self.layers.len()]);
        }
        Ok(Array2::from_shape_vec((x.nrows(), self.n_classes), data)?)
    }

    fn name(&self) -> &str {
        "mlp"
    }
}
