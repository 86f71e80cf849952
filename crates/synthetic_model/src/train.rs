use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use thiserror::Error;

use crate::network::{DenseLayer, DenseNetwork};

const BATCH_SIZE: usize = 32;
const LOSS_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub epochs: usize,
    pub samples: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    pub seed: Option<u64>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            samples: 1000,
            validation_split: 0.2,
            learning_rate: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("training needs at least one epoch")]
    NoEpochs,
    #[error("{samples} samples leave nothing to train on after a {split} validation split")]
    NoTrainingSamples { samples: usize, split: f64 },
    #[error("loss became non-finite in epoch {epoch}")]
    Diverged { epoch: usize },
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub epochs: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
}

impl EpochReport {
    /// Share of epochs completed, floored so only the final epoch reads 100.
    pub fn percent(&self) -> u8 {
        ((self.epoch + 1) * 100 / self.epochs.max(1)).min(100) as u8
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Box-Muller.
pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    // `1 - u` keeps the log argument in (0, 1].
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub fn synthetic_dataset<R: Rng>(samples: usize, input_len: usize, rng: &mut R) -> Dataset {
    let x = (0..samples)
        .map(|_| (0..input_len).map(|_| standard_normal(rng)).collect())
        .collect();
    let y = (0..samples).map(|_| rng.random::<f64>()).collect();
    Dataset { x, y }
}

pub fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn binary_cross_entropy(p: f64, y: f64) -> f64 {
    let p = p.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

fn output_of(activations: &[Vec<f64>]) -> f64 {
    activations
        .last()
        .and_then(|out| out.first().copied())
        .unwrap_or(f64::NAN)
}

pub fn mean_loss(network: &DenseNetwork, x: &[Vec<f64>], y: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let total: f64 = x
        .iter()
        .zip(y)
        .map(|(row, &label)| binary_cross_entropy(output_of(&network.forward_all(row)), label))
        .sum();
    total / x.len() as f64
}

struct Gradients {
    weights: Vec<Vec<f64>>,
    bias: Vec<Vec<f64>>,
}

impl Gradients {
    fn zeros(layers: &[DenseLayer]) -> Self {
        Self {
            weights: layers.iter().map(|l| vec![0.0; l.weights.len()]).collect(),
            bias: layers.iter().map(|l| vec![0.0; l.bias.len()]).collect(),
        }
    }
}

fn accumulate(network: &DenseNetwork, x: &[f64], y: f64, grads: &mut Gradients) -> f64 {
    let activations = network.forward_all(x);
    let p = output_of(&activations);
    // Sigmoid output with cross-entropy loss: dL/dz = p - y.
    let mut delta = vec![p - y];

    for idx in (0..network.layers.len()).rev() {
        let layer = &network.layers[idx];
        let input = &activations[idx];
        for o in 0..layer.outputs {
            grads.bias[idx][o] += delta[o];
            let base = o * layer.inputs;
            for i in 0..layer.inputs {
                grads.weights[idx][base + i] += delta[o] * input[i];
            }
        }
        if idx == 0 {
            break;
        }
        let mut next = vec![0.0; layer.inputs];
        for (i, slot) in next.iter_mut().enumerate() {
            // Relu derivative on the previous layer's activation.
            if input[i] <= 0.0 {
                continue;
            }
            *slot = (0..layer.outputs)
                .map(|o| layer.weights[o * layer.inputs + i] * delta[o])
                .sum();
        }
        delta = next;
    }
    binary_cross_entropy(p, y)
}

fn apply(network: &mut DenseNetwork, grads: &Gradients, scale: f64) {
    for (idx, layer) in network.layers.iter_mut().enumerate() {
        for (w, g) in layer.weights.iter_mut().zip(&grads.weights[idx]) {
            *w -= scale * g;
        }
        for (b, g) in layer.bias.iter_mut().zip(&grads.bias[idx]) {
            *b -= scale * g;
        }
    }
}

pub fn fit(
    sizes: &[usize],
    options: &TrainOptions,
    rng: &mut StdRng,
    mut on_epoch: impl FnMut(EpochReport),
) -> Result<DenseNetwork, FitError> {
    if options.epochs == 0 {
        return Err(FitError::NoEpochs);
    }
    let split = options.validation_split.clamp(0.0, 1.0);
    let held_out = (options.samples as f64 * split).floor() as usize;
    let train_len = options.samples.saturating_sub(held_out);
    if train_len == 0 {
        return Err(FitError::NoTrainingSamples {
            samples: options.samples,
            split,
        });
    }

    let mut network = DenseNetwork::init(sizes, rng);
    network.validate().map_err(FitError::InvalidNetwork)?;
    let data = synthetic_dataset(options.samples, network.input_len(), rng);
    let (train_x, val_x) = data.x.split_at(train_len);
    let (train_y, val_y) = data.y.split_at(train_len);

    let mut indices: Vec<usize> = (0..train_len).collect();
    for epoch in 0..options.epochs {
        indices.shuffle(rng);
        let mut epoch_loss = 0.0;
        for batch in indices.chunks(BATCH_SIZE) {
            let mut grads = Gradients::zeros(&network.layers);
            for &idx in batch {
                epoch_loss += accumulate(&network, &train_x[idx], train_y[idx], &mut grads);
            }
            apply(&mut network, &grads, options.learning_rate / batch.len() as f64);
        }
        let train_loss = epoch_loss / train_len as f64;
        if !train_loss.is_finite() {
            return Err(FitError::Diverged { epoch });
        }
        let validation_loss = (!val_x.is_empty()).then(|| mean_loss(&network, val_x, val_y));
        on_epoch(EpochReport {
            epoch,
            epochs: options.epochs,
            train_loss,
            validation_loss,
        });
    }
    Ok(network)
}

#[cfg(test)]
#[path = "tests/train_tests.rs"]
mod tests;
