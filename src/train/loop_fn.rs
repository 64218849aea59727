use std::time::Instant;

use log::{info, warn};

use crate::data::dataset::Dataset;
use crate::error::Result;
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_config::LoopConfig;
use crate::train::report::{evaluate_sets, format_reports, log_reports, EvalReport, EvalSet};
use crate::train::state::TrainingState;
use crate::trainer::{ClipPolicy, EpochOptions, Trainer};

/// Datasets a training run reads. None of them change during training.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub train: Dataset,
    /// Held-out set that decides convergence.
    pub test: Dataset,
    /// Reported on improvement when present.
    pub gdb11: Option<Dataset>,
    pub eval_sets: Vec<EvalSet>,
}

/// Final state of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub state: TrainingState,
    /// Learning-rate decays performed by this run.
    pub decays: u64,
    /// Epochs performed by this run.
    pub epochs: u64,
}

/// Cross-validation convergence controller.
///
/// Trains epoch after epoch while tracking the best held-out test RMSE. Each
/// improvement snapshots the parameters; after `max_local_epochs` epochs
/// without one, the learning rate is decayed and the snapshot restored. The
/// run ends once the learning rate is at or below `lr_floor`.
pub struct TrainingLoop<'a, T: Trainer + ?Sized> {
    trainer: &'a mut T,
    data: &'a TrainingData,
    config: &'a LoopConfig,
    state: TrainingState,
    startup_reports: Vec<EvalReport>,
    decays: u64,
    epochs: u64,
}

impl<'a, T: Trainer + ?Sized> TrainingLoop<'a, T> {
    /// Restores from the checkpoint directory when it holds a checkpoint,
    /// otherwise initializes fresh parameters; then runs the startup
    /// evaluation sweep.
    ///
    /// A restored run keeps the best score saved with its best snapshot. A
    /// fresh run scores its initial parameters, which are also its snapshot.
    pub fn start(trainer: &'a mut T, data: &'a TrainingData, config: &'a LoopConfig) -> Result<Self> {
        config.validate()?;

        let restored = match config.checkpoint_dir.as_deref() {
            Some(dir) if trainer.has_checkpoint(dir) => {
                info!("Restoring existing model from {}", dir.display());
                Some(trainer.load(dir)?)
            }
            Some(dir) => {
                if dir.exists() {
                    warn!("{} holds no checkpoint, starting fresh", dir.display());
                }
                None
            }
            None => None,
        };

        let state = match restored {
            Some(state) => state,
            None => {
                trainer.initialize()?;
                let mut state = TrainingState::new(config.initial_learning_rate);
                state.best_test_score = trainer.eval_abs_rmse(&data.test)?;
                state
            }
        };
        info!(
            "best test abs rmse: {:.4} kcal/mol, lr {:.0e}, {} decays to go",
            state.best_test_score,
            state.learning_rate,
            config.expected_decays(state.learning_rate)
        );

        info!("Evaluating Rotamer Errors:");
        let startup_reports = evaluate_sets(&*trainer, &data.eval_sets)?;
        log_reports(&startup_reports);

        Ok(TrainingLoop { trainer, data, config, state, startup_reports, decays: 0, epochs: 0 })
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Evaluation sweep taken before the first epoch.
    pub fn startup_reports(&self) -> &[EvalReport] {
        &self.startup_reports
    }

    pub fn trainer(&self) -> &T {
        &*self.trainer
    }

    pub fn decays(&self) -> u64 {
        self.decays
    }

    pub fn is_finished(&self) -> bool {
        !(self.state.learning_rate > self.config.lr_floor)
    }

    /// True once the patience window is exhausted.
    pub fn should_decay(&self) -> bool {
        self.state.local_epoch_count >= self.config.max_local_epochs
    }

    /// One full epoch: clip, train, test, track the best, checkpoint.
    pub fn run_epoch(&mut self) -> Result<EpochStats> {
        if self.config.clip_policy == ClipPolicy::PerEpoch {
            self.trainer.apply_max_norm();
        }

        let opts = EpochOptions {
            batch_size: self.config.batch_size,
            shuffle: self.config.shuffle,
            clip: self.config.clip_policy,
        };
        let started = Instant::now();
        let result = self.trainer.train_epoch(&self.data.train, &opts, &self.state)?;
        let elapsed = started.elapsed();

        let train_rmse = result.rmse_kcal();
        let test_rmse = self.trainer.eval_abs_rmse(&self.data.test)?;
        let before = self.state.clone();

        let improved = test_rmse < self.state.best_test_score;
        let (gdb11_rmse, eval) = if improved {
            self.trainer.save_best_params();
            let gdb11_rmse = match &self.data.gdb11 {
                Some(gdb11) => Some(self.trainer.eval_abs_rmse(gdb11)?),
                None => None,
            };
            let eval = evaluate_sets(&*self.trainer, &self.data.eval_sets)?;
            self.state.record_improvement(test_rmse);
            (gdb11_rmse, eval)
        } else {
            self.state.record_stagnation();
            (None, Vec::new())
        };

        if let Some(dir) = &self.config.checkpoint_dir {
            self.trainer.save(dir, &self.state)?;
        }
        self.epochs += 1;

        info!(
            "{} tpe: {:.2}s, g-epoch {} l-epoch {} lr {:.0e} train/test abs rmse: {:.2} kcal/mol, {:.2} kcal/mol{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            elapsed.as_secs_f64(),
            before.global_epoch_count,
            before.local_epoch_count,
            before.learning_rate,
            train_rmse,
            test_rmse,
            format_reports(gdb11_rmse, &eval),
        );

        let stats = EpochStats {
            global_epoch: before.global_epoch_count,
            local_epoch: before.local_epoch_count,
            learning_rate: before.learning_rate,
            train_rmse,
            test_rmse,
            improved,
            gdb11_rmse,
            eval,
            elapsed_ms: elapsed.as_millis() as u64,
        };
        if let Some(tx) = &self.config.progress_tx {
            // Progress is advisory; a gone receiver does not stop training.
            let _ = tx.send(stats.clone());
        }
        Ok(stats)
    }

    /// Decays the learning rate and rolls back to the best parameters.
    pub fn decay(&mut self) {
        let previous = self.state.learning_rate;
        self.state.decay(self.config.decay_factor);
        self.trainer.load_best_params();
        self.decays += 1;
        info!(
            "==========Decreasing learning rate {:.0e} -> {:.0e}==========",
            previous, self.state.learning_rate
        );
    }

    /// Runs until the learning rate reaches the floor.
    pub fn run(mut self) -> Result<TrainingSummary> {
        info!("------------Starting Training--------------");
        while !self.is_finished() {
            while !self.should_decay() {
                self.run_epoch()?;
            }
            self.decay();
        }
        info!(
            "training finished after {} epochs and {} decays, best test rmse {:.4} kcal/mol",
            self.epochs, self.decays, self.state.best_test_score
        );
        Ok(TrainingSummary { state: self.state, decays: self.decays, epochs: self.epochs })
    }
}
