use serde::{Serialize, Deserialize};

use crate::train::report::EvalReport;

/// Per-epoch statistics emitted by the training loop.
///
/// When a `progress_tx` channel is configured in `LoopConfig`, the loop sends
/// one `EpochStats` value at the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// Global epoch count before this epoch was recorded.
    pub global_epoch: u64,
    /// Local epoch count before this epoch was recorded.
    pub local_epoch: u64,
    pub learning_rate: f64,
    /// Training RMSE in kcal/mol.
    pub train_rmse: f64,
    /// Held-out test RMSE in kcal/mol.
    pub test_rmse: f64,
    /// Whether this epoch set a new best test score.
    pub improved: bool,
    /// GDB11 RMSE, only evaluated on improvement.
    pub gdb11_rmse: Option<f64>,
    /// Rotamer reports, only evaluated on improvement.
    pub eval: Vec<EvalReport>,
    /// Wall-clock duration of the training pass in milliseconds.
    pub elapsed_ms: u64,
}
