use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};

/// One hidden layer of an atomic network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub activation: ActivationFunction,
}

/// Architecture shared by every per-element atomic network.
///
/// The input width comes from the featurizer and a single linear output
/// neuron (the atomic energy) is always appended after `hidden`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub hidden: Vec<LayerSpec>,
}

impl Default for ModelSpec {
    /// The ANI-1 layout: 128-128-64 Gaussian hidden layers.
    fn default() -> Self {
        let layer = |size| LayerSpec { size, activation: ActivationFunction::Gaussian };
        ModelSpec {
            name: "ani1".to_string(),
            hidden: vec![layer(128), layer(128), layer(64)],
        }
    }
}

impl ModelSpec {
    pub fn validate(&self) -> Result<()> {
        if self.hidden.iter().any(|l| l.size == 0) {
            return Err(Error::InvalidConfig(format!(
                "model `{}` has a hidden layer of size 0",
                self.name
            )));
        }
        Ok(())
    }

    /// Deserializes a `ModelSpec` from a JSON file.
    pub fn load_json(path: &Path) -> Result<ModelSpec> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let spec: ModelSpec = serde_json::from_reader(reader).map_err(|e| Error::json(path, e))?;
        spec.validate()?;
        Ok(spec)
    }
}
