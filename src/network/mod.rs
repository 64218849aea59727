pub mod model;
pub mod network;
pub mod spec;

pub use model::{AniModel, ModelGrads};
pub use network::AtomNet;
pub use spec::{LayerSpec, ModelSpec};
