use serde::{Deserialize, Serialize};

use crate::network::model::{AniModel, ModelGrads};

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Number of steps taken so far.
    pub t: u64,
    m: Option<ModelGrads>,
    v: Option<ModelGrads>,
}

impl Default for Adam {
    fn default() -> Self {
        Adam { beta1: 0.9, beta2: 0.999, epsilon: 1e-8, t: 0, m: None, v: None }
    }
}

impl Adam {
    pub fn new() -> Adam {
        Adam::default()
    }

    pub fn step(&mut self, model: &mut AniModel, grads: &ModelGrads, lr: f64) {
        let m = self.m.get_or_insert_with(|| model.zero_grads());
        let v = self.v.get_or_insert_with(|| model.zero_grads());
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powf(self.t as f64);
        let bc2 = 1.0 - self.beta2.powf(self.t as f64);
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);

        let layers = model.nets.iter_mut().flat_map(|n| n.layers.iter_mut());
        let moments = m.nets.iter_mut().flatten().zip(v.nets.iter_mut().flatten());
        for ((layer, g), (lm, lv)) in layers.zip(grads.nets.iter().flatten()).zip(moments) {
            let params = [
                (&mut layer.weights, &g.weights, &mut lm.weights, &mut lv.weights),
                (&mut layer.biases, &g.biases, &mut lm.biases, &mut lv.biases),
            ];
            for (p, g, m, v) in params {
                for r in 0..p.rows {
                    for c in 0..p.cols {
                        let grad = g.data[r][c];
                        let mr = b1 * m.data[r][c] + (1.0 - b1) * grad;
                        let vr = b2 * v.data[r][c] + (1.0 - b2) * grad * grad;
                        m.data[r][c] = mr;
                        v.data[r][c] = vr;
                        p.data[r][c] -= lr * (mr / bc1) / ((vr / bc2).sqrt() + eps);
                    }
                }
            }
        }
    }
}
