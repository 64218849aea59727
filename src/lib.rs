pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod featurize;
pub mod data;
pub mod loss;
pub mod optim;
pub mod trainer;
pub mod train;
pub mod config;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use network::{AniModel, LayerSpec, ModelSpec};
pub use data::{DataLoader, Dataset, Element, EvalGroup, Molecule, HARTREE_TO_KCAL_PER_MOL};
pub use featurize::FeaturizerParams;
pub use optim::OptimizerKind;
pub use trainer::{AniTrainer, ClipPolicy, DeviceSet, EpochOptions, EpochResult, Trainer, TrainerConfig};
pub use train::{EpochStats, EvalReport, EvalSet, LoopConfig, TrainingData, TrainingLoop, TrainingState, TrainingSummary};
pub use error::{Error, Result};
