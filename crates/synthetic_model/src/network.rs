use rand::Rng;
use serde::{Deserialize, Serialize};
use shared::domain::Category;

/// Fully connected layer. `weights` is row-major, one row per output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub inputs: usize,
    pub outputs: usize,
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    pub fn init<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| (rng.random::<f64>() * 2.0 - 1.0) * limit)
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            bias: vec![0.0; outputs],
        }
    }

    fn affine(&self, input: &[f64], out: &mut Vec<f64>) {
        out.clear();
        for o in 0..self.outputs {
            let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
            let sum = row
                .iter()
                .zip(input)
                .fold(self.bias[o], |acc, (w, x)| acc + w * x);
            out.push(sum);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub layers: Vec<DenseLayer>,
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn layer_sizes(category: Category) -> &'static [usize] {
    match category {
        Category::Heart => &[8, 16, 8, 1],
        Category::Diabetes => &[5, 12, 6, 1],
        Category::Liver => &[6, 12, 6, 1],
    }
}

impl DenseNetwork {
    pub fn init<R: Rng>(sizes: &[usize], rng: &mut R) -> Self {
        let layers = sizes
            .windows(2)
            .map(|pair| DenseLayer::init(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    pub fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.inputs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("network has no layers".to_string());
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.inputs * layer.outputs {
                return Err(format!("layer {idx} weights length mismatch"));
            }
            if layer.bias.len() != layer.outputs {
                return Err(format!("layer {idx} bias length mismatch"));
            }
        }
        for (idx, pair) in self.layers.windows(2).enumerate() {
            if pair[0].outputs != pair[1].inputs {
                return Err(format!("layer {idx} output does not feed layer {}", idx + 1));
            }
        }
        if self.layers.last().map(|layer| layer.outputs) != Some(1) {
            return Err("output layer must have a single unit".to_string());
        }
        Ok(())
    }

    pub(crate) fn forward_all(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        let last = self.layers.len().saturating_sub(1);
        for (idx, layer) in self.layers.iter().enumerate() {
            let mut out = Vec::with_capacity(layer.outputs);
            layer.affine(&activations[idx], &mut out);
            if idx == last {
                out.iter_mut().for_each(|v| *v = sigmoid(*v));
            } else {
                out.iter_mut().for_each(|v| *v = v.max(0.0));
            }
            activations.push(out);
        }
        activations
    }

    pub fn predict(&self, input: &[f64]) -> Option<f64> {
        if input.len() != self.input_len() {
            return None;
        }
        self.forward_all(input)
            .last()
            .and_then(|out| out.first().copied())
    }
}

#[cfg(test)]
#[path = "tests/network_tests.rs"]
mod tests;
