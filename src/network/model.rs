use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::data::dataset::Molecule;
use crate::data::element::Element;
use crate::layers::dense::LayerGrads;
use crate::network::network::AtomNet;
use crate::network::spec::ModelSpec;

/// ANI-style potential: one [`AtomNet`] per element, molecular energy is the
/// sum of the atomic contributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AniModel {
    pub spec: ModelSpec,
    pub feature_size: usize,
    /// Indexed by [`Element::index`].
    pub nets: Vec<AtomNet>,
}

/// Gradients for every layer of every atomic network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGrads {
    pub nets: Vec<Vec<LayerGrads>>,
}

impl ModelGrads {
    pub fn add_scaled(&mut self, other: &ModelGrads, scale: f64) {
        for (mine, theirs) in self.nets.iter_mut().zip(other.nets.iter()) {
            for (a, b) in mine.iter_mut().zip(theirs.iter()) {
                a.add_scaled(b, scale);
            }
        }
    }

    pub fn scale_mut(&mut self, factor: f64) {
        self.nets.iter_mut().flatten().for_each(|g| g.scale_mut(factor));
    }
}

impl AniModel {
    pub fn new<R: Rng + ?Sized>(spec: ModelSpec, feature_size: usize, rng: &mut R) -> AniModel {
        let nets = Element::ALL.iter()
            .map(|_| AtomNet::new(feature_size, &spec, rng))
            .collect();
        AniModel { spec, feature_size, nets }
    }

    pub fn net(&self, element: Element) -> &AtomNet {
        &self.nets[element.index()]
    }

    /// Predicted energy (Hartree, offsets removed).
    pub fn energy(&self, mol: &Molecule) -> f64 {
        mol.species.iter().zip(mol.features.iter())
            .map(|(&e, f)| self.net(e).energy(f))
            .sum()
    }

    pub fn zero_grads(&self) -> ModelGrads {
        ModelGrads {
            nets: self.nets.iter().map(AtomNet::zero_grads).collect(),
        }
    }

    /// Adds the gradient of `(E_pred - E_ref)²` for `mol` into `grads` and
    /// returns that squared error.
    pub fn accumulate_gradients(&self, mol: &Molecule, grads: &mut ModelGrads) -> f64 {
        let traces: Vec<_> = mol.species.iter().zip(mol.features.iter())
            .map(|(&e, f)| self.net(e).forward_traced(f))
            .collect();
        let predicted: f64 = traces.iter()
            .map(|t| t.last().map(|l| l.out[0]).unwrap_or(0.0))
            .sum();
        let err = predicted - mol.energy;
        let d_energy = 2.0 * err;

        for ((&e, f), t) in mol.species.iter().zip(mol.features.iter()).zip(traces.iter()) {
            self.net(e).backward(f, t, d_energy, &mut grads.nets[e.index()]);
        }
        err * err
    }

    pub fn clip_max_norm(&mut self, max_norm: f64) {
        for net in &mut self.nets {
            net.clip_max_norm(max_norm);
        }
    }

    /// Largest absolute difference between any two corresponding parameters.
    pub fn max_param_diff(&self, other: &AniModel) -> f64 {
        self.nets.iter().zip(other.nets.iter())
            .flat_map(|(a, b)| a.layers.iter().zip(b.layers.iter()))
            .map(|(la, lb)| {
                la.weights.max_abs_diff(&lb.weights).max(la.biases.max_abs_diff(&lb.biases))
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::LayerSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_model() -> AniModel {
        let spec = ModelSpec {
            name: "tiny".into(),
            hidden: vec![LayerSpec { size: 4, activation: ActivationFunction::Celu { alpha: 0.1 } }],
        };
        AniModel::new(spec, 3, &mut StdRng::seed_from_u64(5))
    }

    fn water() -> Molecule {
        Molecule {
            name: Some("water".into()),
            species: vec![Element::O, Element::H, Element::H],
            features: vec![vec![0.2, 0.1, 0.0], vec![0.5, 0.0, 0.3], vec![0.4, 0.1, 0.3]],
            energy: 0.25,
        }
    }

    #[test]
    fn energy_is_sum_of_atomic_contributions() {
        let model = tiny_model();
        let mol = water();
        let by_hand: f64 = mol.species.iter().zip(mol.features.iter())
            .map(|(&e, f)| model.net(e).energy(f))
            .sum();
        assert!((model.energy(&mol) - by_hand).abs() < 1e-12);
    }

    #[test]
    fn gradient_matches_finite_difference_on_shared_hydrogen_net() {
        let model = tiny_model();
        let mol = water();
        let mut grads = model.zero_grads();
        let sq = model.accumulate_gradients(&mol, &mut grads);
        assert!((sq - (model.energy(&mol) - mol.energy).powi(2)).abs() < 1e-12);

        let h = 1e-6;
        let hi = Element::H.index();
        let loss = |m: &AniModel| (m.energy(&mol) - mol.energy).powi(2);
        let mut plus = model.clone();
        plus.nets[hi].layers[0].weights.data[1][2] += h;
        let mut minus = model.clone();
        minus.nets[hi].layers[0].weights.data[1][2] -= h;
        let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
        assert!((numeric - grads.nets[hi][0].weights.data[1][2]).abs() < 1e-6);

        // Carbon does not appear in water.
        let ci = Element::C.index();
        assert!(grads.nets[ci].iter().all(|g| g.weights.data.iter().flatten().all(|&x| x == 0.0)));
    }
}
