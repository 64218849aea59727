use serde::{Deserialize, Serialize};

use crate::network::model::{AniModel, ModelGrads};

/// Plain gradient descent. The learning rate is supplied per step by the
/// training state rather than stored here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sgd;

impl Sgd {
    pub fn new() -> Sgd {
        Sgd
    }

    /// Applies one update to every layer of every atomic network.
    pub fn step(&self, model: &mut AniModel, grads: &ModelGrads, lr: f64) {
        for (net, net_grads) in model.nets.iter_mut().zip(grads.nets.iter()) {
            for (layer, g) in net.layers.iter_mut().zip(net_grads.iter()) {
                layer.apply_gradients(g, lr);
            }
        }
    }
}
