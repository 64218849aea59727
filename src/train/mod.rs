pub mod epoch_stats;
pub mod loop_config;
pub mod loop_fn;
pub mod report;
pub mod state;

pub use epoch_stats::EpochStats;
pub use loop_config::LoopConfig;
pub use loop_fn::{TrainingData, TrainingLoop, TrainingSummary};
pub use report::{EvalReport, EvalSet};
pub use state::TrainingState;
