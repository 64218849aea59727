use std::path::{Path, PathBuf};

/// Input locations derived from the training data root.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainPaths {
    pub root: PathBuf,
    pub calibration_train: PathBuf,
    pub calibration_test: PathBuf,
    pub rotamer_train: PathBuf,
    pub rotamer_test: PathBuf,
    pub charged_rotamer_test: PathBuf,
    pub ccsdt_rotamer_test: PathBuf,
}

impl TrainPaths {
    pub fn new(train_dir: &Path) -> TrainPaths {
        TrainPaths {
            root: train_dir.to_path_buf(),
            calibration_train: train_dir.join("results_QM_M06-2X.txt"),
            calibration_test: train_dir.join("gdb_11_cal.txt"),
            rotamer_train: train_dir.join("rotamers").join("train"),
            rotamer_test: train_dir.join("rotamers").join("test"),
            charged_rotamer_test: train_dir.join("charged_rotamers_2"),
            ccsdt_rotamer_test: train_dir.join("ccsdt_dataset"),
        }
    }
}

/// Checkpoint directory under the work directory.
pub fn save_dir(work_dir: &Path) -> PathBuf {
    work_dir.join("save")
}

/// Expands a leading `~` to `$HOME`. Other paths are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_the_train_dir() {
        let p = TrainPaths::new(Path::new("/data/ani"));
        assert_eq!(p.calibration_train, Path::new("/data/ani/results_QM_M06-2X.txt"));
        assert_eq!(p.rotamer_test, Path::new("/data/ani/rotamers/test"));
        assert_eq!(p.ccsdt_rotamer_test, Path::new("/data/ani/ccsdt_dataset"));
        assert_eq!(save_dir(Path::new("/work")), Path::new("/work/save"));
    }

    #[test]
    fn tilde_only_expands_as_a_leading_component() {
        assert_eq!(expand_tilde(Path::new("/abs/~x")), Path::new("/abs/~x"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_tilde(Path::new("~/work")), PathBuf::from(home).join("work"));
        }
    }
}
