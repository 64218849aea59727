use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::model::AniModel;
use crate::optim::Optimizer;
use crate::train::state::TrainingState;

pub const CHECKPOINT_FILE: &str = "checkpoint.json";

/// Everything needed to resume a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub state: TrainingState,
    pub model: AniModel,
    pub best_model: AniModel,
    pub optimizer: Optimizer,
}

#[derive(Serialize)]
struct CheckpointRef<'a> {
    state: &'a TrainingState,
    model: &'a AniModel,
    best_model: &'a AniModel,
    optimizer: &'a Optimizer,
}

/// Writes `dir/checkpoint.json` via a temporary file and a rename, so a
/// crash mid-write leaves the previous checkpoint intact.
pub fn save(
    dir: &Path,
    state: &TrainingState,
    model: &AniModel,
    best_model: &AniModel,
    optimizer: &Optimizer,
) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(CHECKPOINT_FILE);
    let tmp = dir.join(format!("{CHECKPOINT_FILE}.tmp"));

    let file = fs::File::create(&tmp).map_err(|e| Error::io(&tmp, e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, &CheckpointRef { state, model, best_model, optimizer })
        .map_err(|e| Error::json(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| Error::io(&path, e))?;

    debug!("checkpoint written to {}", path.display());
    Ok(())
}

/// A directory left behind by an interrupted first save has no checkpoint.
pub fn exists(dir: &Path) -> bool {
    dir.join(CHECKPOINT_FILE).is_file()
}

pub fn load(dir: &Path) -> Result<Checkpoint> {
    let path = dir.join(CHECKPOINT_FILE);
    let file = fs::File::open(&path).map_err(|e| Error::io(&path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::json(&path, e))
}
