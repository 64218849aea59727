pub mod aev;

pub use aev::{featurize, FeaturizerParams};
