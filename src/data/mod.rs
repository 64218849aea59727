pub mod calibration;
pub mod dataset;
pub mod element;
pub mod loader;
pub mod self_energy;
pub mod units;

pub use dataset::{Dataset, EvalGroup, Molecule};
pub use element::Element;
pub use loader::{DataLoader, MoleculeRecord};
pub use self_energy::SelfEnergies;
pub use units::HARTREE_TO_KCAL_PER_MOL;
