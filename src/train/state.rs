use serde::{Deserialize, Serialize};

/// Convergence bookkeeping of a training run.
///
/// Owned by the training loop and passed by reference to the trainer and
/// into checkpoints. `learning_rate` only ever decreases and
/// `global_epoch_count` only ever increases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub global_epoch_count: u64,
    /// Epochs since the last improvement or learning-rate decay.
    pub local_epoch_count: u64,
    pub learning_rate: f64,
    /// Best held-out test RMSE (kcal/mol) since training started.
    pub best_test_score: f64,
}

impl TrainingState {
    pub fn new(learning_rate: f64) -> TrainingState {
        TrainingState {
            global_epoch_count: 0,
            local_epoch_count: 0,
            learning_rate,
            best_test_score: f64::MAX,
        }
    }

    /// Records a new best score and restarts the patience window.
    pub fn record_improvement(&mut self, test_score: f64) {
        self.best_test_score = test_score;
        self.global_epoch_count += 1;
        self.local_epoch_count = 0;
    }

    pub fn record_stagnation(&mut self) {
        self.global_epoch_count += 1;
        self.local_epoch_count += 1;
    }

    /// Multiplies the learning rate by `factor` and restarts the patience window.
    pub fn decay(&mut self, factor: f64) {
        self.learning_rate *= factor;
        self.local_epoch_count = 0;
    }
}
