pub mod adam;
pub mod sgd;

use serde::{Deserialize, Serialize};

use crate::network::model::{AniModel, ModelGrads};

pub use adam::Adam;
pub use sgd::Sgd;

/// Which optimizer a trainer builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

/// Optimizer plus its state, serialized into checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    pub fn new(kind: OptimizerKind) -> Optimizer {
        match kind {
            OptimizerKind::Sgd => Optimizer::Sgd(Sgd::new()),
            OptimizerKind::Adam => Optimizer::Adam(Adam::new()),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Optimizer::Sgd(_) => OptimizerKind::Sgd,
            Optimizer::Adam(_) => OptimizerKind::Adam,
        }
    }

    pub fn step(&mut self, model: &mut AniModel, grads: &ModelGrads, lr: f64) {
        match self {
            Optimizer::Sgd(sgd) => sgd.step(model, grads, lr),
            Optimizer::Adam(adam) => adam.step(model, grads, lr),
        }
    }
}
