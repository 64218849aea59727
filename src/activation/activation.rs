use serde::{Serialize, Deserialize};

/// Element-wise activations used by the atomic networks.
///
/// `Gaussian` (`exp(-x²)`) is the activation of the original ANI-1 potential;
/// `Celu` is the smoother choice of later ANI variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Gaussian,
    Celu { alpha: f64 },
    Tanh,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Gaussian => (-x * x).exp(),
            ActivationFunction::Celu { alpha } => {
                if x > 0.0 { x } else { alpha * ((x / alpha).exp() - 1.0) }
            }
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Gaussian => -2.0 * x * (-x * x).exp(),
            ActivationFunction::Celu { alpha } => {
                if x > 0.0 { 1.0 } else { (x / alpha).exp() }
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::Identity => 1.0,
        }
    }
}
