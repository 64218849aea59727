use std::path::Path;
use std::thread::{self, ScopedJoinHandle};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::{Dataset, EvalGroup, Molecule};
use crate::data::units::rmse_kcal;
use crate::error::{Error, Result};
use crate::loss::group::relative_squared_errors;
use crate::loss::mse::MseLoss;
use crate::network::model::{AniModel, ModelGrads};
use crate::network::spec::ModelSpec;
use crate::optim::{Optimizer, OptimizerKind};
use crate::train::state::TrainingState;
use crate::trainer::checkpoint;
use crate::trainer::device::DeviceSet;
use crate::trainer::{ClipPolicy, EpochOptions, EpochResult, Trainer};

/// Hyperparameters of an [`AniTrainer`].
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub model: ModelSpec,
    pub optimizer: OptimizerKind,
    /// Upper bound on each neuron's incoming weight norm.
    pub max_norm: f64,
    /// Seeds parameter initialization and epoch shuffling.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            model: ModelSpec::default(),
            optimizer: OptimizerKind::Adam,
            max_norm: 3.0,
            seed: 0,
        }
    }
}

/// Data-parallel trainer for an [`AniModel`].
///
/// Every batch is split into one shard per device; shards compute summed
/// gradients on scoped worker threads, the sums are combined, averaged over
/// the batch and applied once.
pub struct AniTrainer {
    config: TrainerConfig,
    devices: DeviceSet,
    feature_size: usize,
    model: AniModel,
    best: AniModel,
    optimizer: Optimizer,
    rng: StdRng,
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

impl AniTrainer {
    pub fn new(config: TrainerConfig, feature_size: usize, devices: DeviceSet) -> Result<AniTrainer> {
        config.model.validate()?;
        if !(config.max_norm > 0.0) {
            return Err(Error::InvalidConfig(format!("max norm must be positive, got {}", config.max_norm)));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let model = AniModel::new(config.model.clone(), feature_size, &mut rng);
        info!(
            "trainer: model `{}`, {} features, {} devices, {:?}",
            config.model.name,
            feature_size,
            devices.count(),
            config.optimizer
        );
        Ok(AniTrainer {
            best: model.clone(),
            optimizer: Optimizer::new(config.optimizer),
            model,
            config,
            devices,
            feature_size,
            rng,
        })
    }

    pub fn model(&self) -> &AniModel {
        &self.model
    }

    pub fn best_model(&self) -> &AniModel {
        &self.best
    }

    pub fn devices(&self) -> DeviceSet {
        self.devices
    }

    /// Predicted energies (Hartree, offsets removed) in dataset order.
    pub fn predict(&self, data: &Dataset) -> Vec<f64> {
        let model = &self.model;
        let predict_shard = |shard: &[Molecule]| -> Vec<f64> {
            shard.iter().map(|m| model.energy(m)).collect()
        };
        if self.devices.count() == 1 {
            return predict_shard(data.molecules());
        }
        thread::scope(|s| {
            let handles: Vec<_> = self.devices.shard(data.molecules())
                .map(|shard| s.spawn(move || predict_shard(shard)))
                .collect();
            handles.into_iter().flat_map(join).collect()
        })
    }

    /// Summed gradients and per-molecule squared errors over `indices`.
    fn batch_gradients(&self, molecules: &[Molecule], indices: &[usize]) -> (ModelGrads, Vec<f64>) {
        let model = &self.model;
        let shard_gradients = |shard: &[usize]| {
            let mut grads = model.zero_grads();
            let errors: Vec<f64> = shard.iter()
                .map(|&i| model.accumulate_gradients(&molecules[i], &mut grads))
                .collect();
            (grads, errors)
        };
        if self.devices.count() == 1 {
            return shard_gradients(indices);
        }

        let partials: Vec<(ModelGrads, Vec<f64>)> = thread::scope(|s| {
            let handles: Vec<_> = self.devices.shard(indices)
                .map(|shard| s.spawn(move || shard_gradients(shard)))
                .collect();
            handles.into_iter().map(join).collect()
        });

        let mut partials = partials.into_iter();
        let (mut total, mut errors) = match partials.next() {
            Some(first) => first,
            None => return (model.zero_grads(), Vec::new()),
        };
        for (grads, errs) in partials {
            total.add_scaled(&grads, 1.0);
            errors.extend(errs);
        }
        (total, errors)
    }

    fn require_non_empty(data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(Error::EmptyDataset(data.name().to_string()));
        }
        Ok(())
    }
}

impl Trainer for AniTrainer {
    fn initialize(&mut self) -> Result<()> {
        self.model = AniModel::new(self.config.model.clone(), self.feature_size, &mut self.rng);
        self.best = self.model.clone();
        self.optimizer = Optimizer::new(self.config.optimizer);
        Ok(())
    }

    fn has_checkpoint(&self, dir: &Path) -> bool {
        checkpoint::exists(dir)
    }

    fn load(&mut self, dir: &Path) -> Result<TrainingState> {
        let ckpt = checkpoint::load(dir)?;
        if ckpt.model.feature_size != self.feature_size {
            return Err(Error::Checkpoint(format!(
                "checkpoint expects {} features, data has {}",
                ckpt.model.feature_size, self.feature_size
            )));
        }
        if ckpt.model.spec != self.config.model {
            warn!(
                "checkpoint architecture `{}` differs from configured `{}`; using the checkpoint",
                ckpt.model.spec.name, self.config.model.name
            );
        }
        if ckpt.optimizer.kind() != self.config.optimizer {
            warn!("checkpoint optimizer {:?} overrides configured {:?}", ckpt.optimizer.kind(), self.config.optimizer);
        }
        self.model = ckpt.model;
        self.best = ckpt.best_model;
        self.optimizer = ckpt.optimizer;
        Ok(ckpt.state)
    }

    fn save(&self, dir: &Path, state: &TrainingState) -> Result<()> {
        checkpoint::save(dir, state, &self.model, &self.best, &self.optimizer)
    }

    fn save_best_params(&mut self) {
        self.best = self.model.clone();
    }

    fn load_best_params(&mut self) {
        self.model = self.best.clone();
    }

    fn apply_max_norm(&mut self) {
        self.model.clip_max_norm(self.config.max_norm);
    }

    fn train_epoch(
        &mut self,
        data: &Dataset,
        opts: &EpochOptions,
        state: &TrainingState,
    ) -> Result<EpochResult> {
        AniTrainer::require_non_empty(data)?;
        let mut order: Vec<usize> = (0..data.len()).collect();
        if opts.shuffle {
            order.shuffle(&mut self.rng);
        }

        let mut squared_errors = Vec::with_capacity(order.len());
        for batch in order.chunks(opts.batch_size.max(1)) {
            let (mut grads, errors) = self.batch_gradients(data.molecules(), batch);
            grads.scale_mut(1.0 / batch.len() as f64);
            self.optimizer.step(&mut self.model, &grads, state.learning_rate);
            if opts.clip == ClipPolicy::PerBatch {
                self.apply_max_norm();
            }
            squared_errors.extend(errors);
        }
        Ok(EpochResult { squared_errors })
    }

    fn eval_abs_rmse(&self, data: &Dataset) -> Result<f64> {
        AniTrainer::require_non_empty(data)?;
        let predicted = self.predict(data);
        Ok(rmse_kcal(&MseLoss::squared_errors(&predicted, &data.energies())))
    }

    fn eval_eh_rmse(&self, data: &Dataset, groups: &EvalGroup) -> Result<f64> {
        AniTrainer::require_non_empty(data)?;
        if let Some(i) = groups.out_of_bounds(data.len()) {
            return Err(Error::InvalidConfig(format!(
                "group member {i} is outside `{}` ({} molecules)",
                data.name(),
                data.len()
            )));
        }
        let predicted = self.predict(data);
        Ok(rmse_kcal(&relative_squared_errors(&predicted, &data.energies(), groups)))
    }
}
