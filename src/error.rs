use std::path::PathBuf;

/// Errors raised by dataset loading, the trainer and the training loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no compute devices available to this process")]
    NoDevices,

    #[error("{requested} devices requested but only {available} detected")]
    TooManyDevices { requested: usize, available: usize },

    #[error("unsupported element symbol `{0}`")]
    UnknownElement(String),

    #[error("calibration file {path}, line {line}: {reason}")]
    Calibration {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("malformed molecule record in {path}: {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("dataset `{0}` is empty")]
    EmptyDataset(String),

    #[error("self-energy fit is singular: {0}")]
    SingularFit(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("checkpoint mismatch: {0}")]
    Checkpoint(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json { path: path.into(), source }
    }
}
