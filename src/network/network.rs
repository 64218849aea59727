use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::layers::dense::{Layer, LayerGrads, LayerTrace};
use crate::network::spec::ModelSpec;

/// Feed-forward network mapping one atom's feature vector to its energy
/// contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomNet {
    pub layers: Vec<Layer>,
}

impl AtomNet {
    /// Builds the hidden layers from `spec` plus a single identity output.
    pub fn new<R: Rng + ?Sized>(input_size: usize, spec: &ModelSpec, rng: &mut R) -> AtomNet {
        let mut layers = Vec::with_capacity(spec.hidden.len() + 1);
        let mut fan_in = input_size;
        for l in &spec.hidden {
            layers.push(Layer::new(l.size, fan_in, l.activation.clone(), rng));
            fan_in = l.size;
        }
        layers.push(Layer::new(1, fan_in, ActivationFunction::Identity, rng));
        AtomNet { layers }
    }

    pub fn energy(&self, features: &[f64]) -> f64 {
        let mut current = features.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current).out;
        }
        current[0]
    }

    /// Forward pass keeping every layer's trace for backprop.
    pub fn forward_traced(&self, features: &[f64]) -> Vec<LayerTrace> {
        let mut traces: Vec<LayerTrace> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let trace = match traces.last() {
                Some(prev) => layer.forward(&prev.out),
                None => layer.forward(features),
            };
            traces.push(trace);
        }
        traces
    }

    /// Backprop of `d_energy` (∂L/∂E_atom) through a traced pass.
    pub fn backward(
        &self,
        features: &[f64],
        traces: &[LayerTrace],
        d_energy: f64,
        grads: &mut [LayerGrads],
    ) {
        let mut delta = vec![d_energy];
        for i in (0..self.layers.len()).rev() {
            let input: &[f64] = if i == 0 { features } else { &traces[i - 1].out };
            delta = self.layers[i].backward(&delta, input, &traces[i], &mut grads[i]);
        }
    }

    pub fn zero_grads(&self) -> Vec<LayerGrads> {
        self.layers.iter().map(LayerGrads::zeros_like).collect()
    }

    pub fn clip_max_norm(&mut self, max_norm: f64) {
        for layer in &mut self.layers {
            layer.clip_max_norm(max_norm);
        }
    }
}
