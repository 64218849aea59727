use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Fully connected layer. Forward passes are stateless: the values needed
/// for backprop are returned in a [`LayerTrace`] so several worker threads
/// can run the same layer at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub size: usize,
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction,
}

/// Values recorded during a forward pass.
#[derive(Debug, Clone)]
pub struct LayerTrace {
    /// Pre-activation values `z = xW + b`.
    pub pre: Vec<f64>,
    /// Activations `a = σ(z)`.
    pub out: Vec<f64>,
}

/// Gradient of the loss with respect to one layer's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerGrads {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl LayerGrads {
    pub fn zeros_like(layer: &Layer) -> LayerGrads {
        LayerGrads {
            weights: Matrix::zeros(layer.weights.rows, layer.weights.cols),
            biases: Matrix::zeros(layer.biases.rows, layer.biases.cols),
        }
    }

    pub fn add_scaled(&mut self, other: &LayerGrads, scale: f64) {
        self.weights.add_scaled(&other.weights, scale);
        self.biases.add_scaled(&other.biases, scale);
    }

    pub fn scale_mut(&mut self, factor: f64) {
        self.weights.scale_mut(factor);
        self.biases.scale_mut(factor);
    }
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        Layer {
            size,
            weights: Matrix::xavier(input_size, size, rng),
            biases: Matrix::zeros(1, size),
            activator: activation,
        }
    }

    pub fn forward(&self, input: &[f64]) -> LayerTrace {
        debug_assert_eq!(input.len(), self.weights.rows);
        let mut pre = self.biases.data[0].clone();
        for (x, w_row) in input.iter().zip(self.weights.data.iter()) {
            if *x == 0.0 {
                continue;
            }
            for (z, w) in pre.iter_mut().zip(w_row.iter()) {
                *z += x * w;
            }
        }
        let out = pre.iter().map(|&z| self.activator.function(z)).collect();
        LayerTrace { pre, out }
    }

    /// Accumulates parameter gradients into `grads` and returns ∂L/∂input.
    ///
    /// `delta_out` is ∂L/∂a for this layer (error in activation space) and
    /// `input` is the vector the traced forward pass was fed.
    pub fn backward(
        &self,
        delta_out: &[f64],
        input: &[f64],
        trace: &LayerTrace,
        grads: &mut LayerGrads,
    ) -> Vec<f64> {
        // δ = error ⊙ σ'(z)
        let delta: Vec<f64> = delta_out.iter().zip(trace.pre.iter())
            .map(|(d, &z)| d * self.activator.derivative(z))
            .collect();

        for (gb, d) in grads.biases.data[0].iter_mut().zip(delta.iter()) {
            *gb += d;
        }

        let mut delta_in = vec![0.0; input.len()];
        for (i, x) in input.iter().enumerate() {
            let w_row = &self.weights.data[i];
            let g_row = &mut grads.weights.data[i];
            let mut acc = 0.0;
            for j in 0..delta.len() {
                g_row[j] += x * delta[j];
                acc += w_row[j] * delta[j];
            }
            delta_in[i] = acc;
        }
        delta_in
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, grads: &LayerGrads, lr: f64) {
        self.weights.add_scaled(&grads.weights, -lr);
        self.biases.add_scaled(&grads.biases, -lr);
    }

    /// Rescales each neuron's incoming weight vector so its L2 norm is at
    /// most `max_norm`. Biases are left alone.
    pub fn clip_max_norm(&mut self, max_norm: f64) {
        for j in 0..self.weights.cols {
            let norm = self.weights.column_norm(j);
            if norm > max_norm {
                let factor = max_norm / norm;
                for row in self.weights.data.iter_mut() {
                    row[j] *= factor;
                }
            }
        }
    }
}
