use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::element::Element;

/// One featurized molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub name: Option<String>,
    pub species: Vec<Element>,
    /// One feature vector (AEV) per atom, in the same order as `species`.
    pub features: Vec<Vec<f64>>,
    /// Reference energy in Hartree with the per-element offsets removed.
    pub energy: f64,
}

/// Immutable, cheaply clonable collection of molecules.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    molecules: Arc<[Molecule]>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, molecules: Vec<Molecule>) -> Dataset {
        Dataset {
            name: name.into(),
            molecules: molecules.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.molecules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molecules.is_empty()
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn get(&self, idx: usize) -> Option<&Molecule> {
        self.molecules.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Molecule> {
        self.molecules.iter()
    }

    /// Reference energies in dataset order.
    pub fn energies(&self) -> Vec<f64> {
        self.molecules.iter().map(|m| m.energy).collect()
    }
}

/// Conformer-to-molecule mapping for a rotamer dataset: each inner list holds
/// the dataset indices of one molecule's conformers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalGroup {
    pub groups: Vec<Vec<usize>>,
}

impl EvalGroup {
    pub fn new(groups: Vec<Vec<usize>>) -> EvalGroup {
        EvalGroup { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// First member index that does not address one of `len` molecules.
    pub fn out_of_bounds(&self, len: usize) -> Option<usize> {
        self.groups.iter().flatten().copied().find(|&i| i >= len)
    }
}
