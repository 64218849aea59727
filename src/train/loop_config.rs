use std::path::PathBuf;
use std::sync::mpsc;

use crate::error::{Error, Result};
use crate::train::epoch_stats::EpochStats;
use crate::trainer::ClipPolicy;

/// Configuration for a [`TrainingLoop`](crate::train::TrainingLoop) run.
///
/// # Fields
/// - `max_local_epochs`     : patience: non-improving epochs before a decay
/// - `lr_floor`             : training stops once the rate is at or below this
/// - `decay_factor`         : multiplier applied on every decay, in (0, 1)
/// - `initial_learning_rate`: rate used when no checkpoint is restored
/// - `batch_size`           : molecules per gradient step
/// - `clip_policy`          : when parameter max-norm clipping runs
/// - `checkpoint_dir`       : restored from if it exists, saved to every epoch
/// - `progress_tx`          : optional channel; one `EpochStats` is sent per
///                             completed epoch. A dropped receiver is ignored.
pub struct LoopConfig {
    pub max_local_epochs: u64,
    pub lr_floor: f64,
    pub decay_factor: f64,
    pub initial_learning_rate: f64,
    pub batch_size: usize,
    pub shuffle: bool,
    pub clip_policy: ClipPolicy,
    pub checkpoint_dir: Option<PathBuf>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            max_local_epochs: 100,
            // Looser than the 1e-9 target to absorb drift from repeated halving.
            lr_floor: 5e-10,
            decay_factor: 0.5,
            initial_learning_rate: 1e-3,
            batch_size: 1024,
            shuffle: true,
            clip_policy: ClipPolicy::PerEpoch,
            checkpoint_dir: None,
            progress_tx: None,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "decay factor must be in (0, 1), got {}",
                self.decay_factor
            )));
        }
        if self.max_local_epochs == 0 {
            return Err(Error::InvalidConfig("patience must be at least 1 epoch".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }
        for (name, rate) in [("initial learning rate", self.initial_learning_rate), ("lr floor", self.lr_floor)] {
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(Error::InvalidConfig(format!("{name} must be positive and finite, got {rate}")));
            }
        }
        Ok(())
    }

    /// Number of decays needed to take `learning_rate` to the floor.
    pub fn expected_decays(&self, learning_rate: f64) -> u64 {
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) || !learning_rate.is_finite() {
            return 0;
        }
        let mut lr = learning_rate;
        let mut n = 0;
        while lr > self.lr_floor {
            lr *= self.decay_factor;
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_rates_are_rejected() {
        for config in [
            LoopConfig { initial_learning_rate: f64::INFINITY, ..LoopConfig::default() },
            LoopConfig { initial_learning_rate: f64::NAN, ..LoopConfig::default() },
            LoopConfig { lr_floor: f64::INFINITY, ..LoopConfig::default() },
            LoopConfig { decay_factor: f64::NAN, ..LoopConfig::default() },
        ] {
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
        assert!(LoopConfig::default().validate().is_ok());
    }

    #[test]
    fn expected_decays_is_finite_for_any_start() {
        let config = LoopConfig::default();
        assert_eq!(config.expected_decays(1e-3), 21);
        assert_eq!(config.expected_decays(f64::INFINITY), 0);
        assert_eq!(config.expected_decays(1e-12), 0);
    }
}
