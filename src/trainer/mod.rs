//! The trainer seam: everything the convergence loop needs from a model.
//!
//! [`AniTrainer`] is the in-process implementation; tests drive the loop
//! with scripted implementations of [`Trainer`].

pub mod ani_trainer;
pub mod checkpoint;
pub mod device;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, EvalGroup};
use crate::data::units::rmse_kcal;
use crate::error::Result;
use crate::train::state::TrainingState;

pub use ani_trainer::{AniTrainer, TrainerConfig};
pub use device::DeviceSet;

/// When parameter max-norm clipping is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipPolicy {
    /// Once before every training pass, issued by the loop.
    #[default]
    PerEpoch,
    /// After every gradient step, inside the trainer.
    PerBatch,
}

/// Options for one pass over the training set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    pub clip: ClipPolicy,
}

/// Output of one training pass.
#[derive(Debug, Clone, Default)]
pub struct EpochResult {
    /// Per-molecule squared errors in Hartree², measured before each batch's
    /// update was applied.
    pub squared_errors: Vec<f64>,
}

impl EpochResult {
    pub fn rmse_kcal(&self) -> f64 {
        rmse_kcal(&self.squared_errors)
    }
}

/// Request/response contract between the convergence loop and a model.
///
/// All calls block until complete. Errors are not retried by the caller.
pub trait Trainer {
    /// Replaces all parameters with a fresh random initialization and
    /// snapshots them as the current best.
    fn initialize(&mut self) -> Result<()>;

    /// Whether `dir` holds something [`Trainer::load`] can restore.
    fn has_checkpoint(&self, dir: &Path) -> bool {
        dir.exists()
    }

    /// Restores parameters, best snapshot and optimizer state from `dir`.
    fn load(&mut self, dir: &Path) -> Result<TrainingState>;

    /// Persists parameters, best snapshot, optimizer state and `state`.
    fn save(&self, dir: &Path, state: &TrainingState) -> Result<()>;

    /// Copies the current parameters into the best snapshot.
    fn save_best_params(&mut self);

    /// Overwrites the current parameters with the best snapshot.
    fn load_best_params(&mut self);

    fn apply_max_norm(&mut self);

    fn train_epoch(
        &mut self,
        data: &Dataset,
        opts: &EpochOptions,
        state: &TrainingState,
    ) -> Result<EpochResult>;

    /// Absolute energy RMSE in kcal/mol.
    fn eval_abs_rmse(&self, data: &Dataset) -> Result<f64>;

    /// Group-relative energy RMSE in kcal/mol.
    fn eval_eh_rmse(&self, data: &Dataset, groups: &EvalGroup) -> Result<f64>;
}
