use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::calibration::Calibration;
use crate::data::dataset::{Dataset, EvalGroup, Molecule};
use crate::data::element::Element;
use crate::data::self_energy::SelfEnergies;
use crate::error::{Error, Result};
use crate::featurize::aev::{featurize, FeaturizerParams};

/// On-disk molecule: a JSON array of these per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub species: Vec<Element>,
    /// Cartesian coordinates in Å.
    pub coordinates: Vec<[f64; 3]>,
    /// Total energy in Hartree.
    pub energy: f64,
}

/// Reads the chemistry datasets, applies calibration and self-energy
/// subtraction, and featurizes every atom.
#[derive(Debug, Clone)]
pub struct DataLoader {
    use_fitted: bool,
    featurizer: FeaturizerParams,
    self_energies: SelfEnergies,
    test_fraction: f64,
    seed: u64,
}

impl DataLoader {
    /// `use_fitted` selects least-squares fitted offsets (computed by
    /// [`DataLoader::load_gdb8`]) instead of isolated-atom energies.
    pub fn new(use_fitted: bool) -> DataLoader {
        DataLoader {
            use_fitted,
            featurizer: FeaturizerParams::default(),
            self_energies: SelfEnergies::self_interaction(),
            test_fraction: 0.2,
            seed: 0,
        }
    }

    pub fn with_featurizer(mut self, params: FeaturizerParams) -> DataLoader {
        self.featurizer = params;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> DataLoader {
        self.seed = seed;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> DataLoader {
        self.test_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn feature_size(&self) -> usize {
        self.featurizer.feature_size()
    }

    pub fn self_energies(&self) -> &SelfEnergies {
        &self.self_energies
    }

    /// Loads `ani_gdb_s01.json` … `ani_gdb_s08.json` from `train_dir` and
    /// splits them into `(train, test)`. Records from `ff_train_dir` are
    /// appended to the train split.
    pub fn load_gdb8(
        &mut self,
        train_dir: &Path,
        calibration_file: &Path,
        ff_train_dir: Option<&Path>,
    ) -> Result<(Dataset, Dataset)> {
        let calibration = load_calibration(calibration_file)?;

        let mut records = Vec::new();
        for n in 1..=8 {
            let path = train_dir.join(format!("ani_gdb_s0{n}.json"));
            if !path.exists() {
                warn!("{} not found, skipping", path.display());
                continue;
            }
            records.extend(read_records(&path)?);
        }
        if records.is_empty() {
            return Err(Error::EmptyDataset("gdb8".into()));
        }
        apply_calibration(&mut records, &calibration);

        records.shuffle(&mut StdRng::seed_from_u64(self.seed));
        let n_test = ((records.len() as f64) * self.test_fraction).round() as usize;
        let mut train_records = records.split_off(n_test.min(records.len()));
        let test_records = records;

        if let Some(dir) = ff_train_dir {
            let before = train_records.len();
            for path in json_files(dir)? {
                train_records.extend(read_records(&path)?);
            }
            info!("added {} forcefield records from {}", train_records.len() - before, dir.display());
        }

        if self.use_fitted {
            self.self_energies = SelfEnergies::fit(
                train_records.iter().map(|r| (r.species.as_slice(), r.energy)),
            )?;
            info!("fitted self energies: {:?}", self.self_energies.offsets);
        }

        let train = Dataset::new("gdb8 train", self.build(&train_records));
        let test = Dataset::new("gdb8 test", self.build(&test_records));
        info!("gdb8: {} train / {} test molecules", train.len(), test.len());
        Ok((train, test))
    }

    /// Loads every JSON file under `train_dir/gdb11`.
    pub fn load_gdb11(&self, train_dir: &Path, calibration_file: &Path) -> Result<Dataset> {
        let calibration = load_calibration(calibration_file)?;
        let mut records = Vec::new();
        for path in json_files(&train_dir.join("gdb11"))? {
            records.extend(read_records(&path)?);
        }
        if records.is_empty() {
            return Err(Error::EmptyDataset("gdb11".into()));
        }
        apply_calibration(&mut records, &calibration);
        let ds = Dataset::new("gdb11", self.build(&records));
        info!("gdb11: {} molecules", ds.len());
        Ok(ds)
    }

    /// Loads a rotamer directory; each JSON file is one molecule's set of
    /// conformers and becomes one group.
    pub fn load_ff(&self, dir: &Path) -> Result<(Dataset, EvalGroup)> {
        let mut records = Vec::new();
        let mut groups = Vec::new();
        for path in json_files(dir)? {
            let file_records = read_records(&path)?;
            if file_records.is_empty() {
                debug!("{} holds no conformers", path.display());
                continue;
            }
            let start = records.len();
            groups.push((start..start + file_records.len()).collect());
            records.extend(file_records);
        }
        let name = dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        if records.is_empty() {
            return Err(Error::EmptyDataset(name));
        }
        let ds = Dataset::new(name, self.build(&records));
        info!("{}: {} conformers in {} groups", ds.name(), ds.len(), groups.len());
        Ok((ds, EvalGroup::new(groups)))
    }

    fn build(&self, records: &[MoleculeRecord]) -> Vec<Molecule> {
        records.iter()
            .map(|r| Molecule {
                name: r.name.clone(),
                features: featurize(&self.featurizer, &r.species, &r.coordinates),
                energy: r.energy - self.self_energies.of(&r.species),
                species: r.species.clone(),
            })
            .collect()
    }
}

fn load_calibration(path: &Path) -> Result<Calibration> {
    if path.exists() {
        let cal = Calibration::load(path)?;
        info!("loaded {} calibrated energies from {}", cal.len(), path.display());
        Ok(cal)
    } else {
        warn!("calibration file {} not found, using raw energies", path.display());
        Ok(Calibration::default())
    }
}

fn apply_calibration(records: &mut [MoleculeRecord], calibration: &Calibration) {
    if calibration.is_empty() {
        return;
    }
    for r in records.iter_mut() {
        if let Some(e) = r.name.as_deref().and_then(|n| calibration.get(n)) {
            r.energy = e;
        }
    }
}

fn read_records(path: &Path) -> Result<Vec<MoleculeRecord>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let reader = std::io::BufReader::new(file);
    let records: Vec<MoleculeRecord> = serde_json::from_reader(reader).map_err(|e| Error::json(path, e))?;
    for (i, r) in records.iter().enumerate() {
        if r.species.len() != r.coordinates.len() {
            return Err(Error::MalformedRecord {
                path: path.to_path_buf(),
                reason: format!(
                    "record {i} has {} species but {} coordinates",
                    r.species.len(),
                    r.coordinates.len()
                ),
            });
        }
    }
    Ok(records)
}

/// `*.json` files directly under `dir`, sorted by name.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use Element::*;

    fn record(name: &str, species: Vec<Element>, energy: f64) -> MoleculeRecord {
        let coordinates = (0..species.len()).map(|i| [0.9 * i as f64, 0.1 * i as f64, 0.0]).collect();
        MoleculeRecord { name: Some(name.into()), species, coordinates, energy }
    }

    fn write(path: &Path, records: &[MoleculeRecord]) {
        fs::write(path, serde_json::to_string(records).unwrap()).unwrap();
    }

    fn small_loader(fitted: bool) -> DataLoader {
        let params = FeaturizerParams {
            radial_shifts: vec![0.8, 1.6],
            angle_shifts: vec![1.0],
            angular_radial_shifts: vec![1.0],
            ..FeaturizerParams::default()
        };
        DataLoader::new(fitted).with_featurizer(params).with_seed(1)
    }

    #[test]
    fn gdb8_split_calibrates_and_subtracts_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let recs: Vec<_> = (0..10)
            .map(|i| record(&format!("m{i}"), vec![C, H, H, H, H], -40.0 - i as f64 * 0.01))
            .collect();
        write(&dir.path().join("ani_gdb_s01.json"), &recs[..6]);
        write(&dir.path().join("ani_gdb_s02.json"), &recs[6..]);
        let cal = dir.path().join("cal.txt");
        fs::write(&cal, "m3 -41.0\n").unwrap();

        let mut loader = small_loader(false);
        let (train, test) = loader.load_gdb8(dir.path(), &cal, None).unwrap();
        assert_eq!((train.len(), test.len()), (8, 2));

        let offset = SelfEnergies::self_interaction().of(&[C, H, H, H, H]);
        let m3 = train.iter().chain(test.iter())
            .find(|m| m.name.as_deref() == Some("m3"))
            .unwrap();
        assert!((m3.energy - (-41.0 - offset)).abs() < 1e-12);
        assert_eq!(m3.features.len(), 5);
        assert_eq!(m3.features[0].len(), loader.feature_size());
    }

    #[test]
    fn ffdata_joins_train_split_and_fitting_uses_it() {
        let dir = tempfile::tempdir().unwrap();
        let truth = [-0.5, -38.0, -54.5, -75.0];
        let energy = |s: &[Element]| s.iter().map(|e| truth[e.index()]).sum::<f64>();
        let shapes = [
            vec![C, H, H, H, H],
            vec![H, H, O],
            vec![N, H, H, H],
            vec![C, O, O],
            vec![C, C, H, H, H, H],
        ];
        let recs: Vec<_> = shapes.iter().enumerate()
            .map(|(i, s)| record(&format!("g{i}"), s.clone(), energy(s)))
            .collect();
        write(&dir.path().join("ani_gdb_s01.json"), &recs);

        let ff = dir.path().join("ff");
        fs::create_dir(&ff).unwrap();
        write(&ff.join("a.json"), &[record("ff0", vec![H, H], energy(&[H, H]))]);

        let mut loader = small_loader(true).with_test_fraction(0.0);
        let (train, test) = loader.load_gdb8(dir.path(), &dir.path().join("missing.txt"), Some(&ff)).unwrap();
        assert_eq!((train.len(), test.len()), (6, 0));
        for (a, b) in loader.self_energies().offsets.iter().zip(truth.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
        assert!(train.iter().all(|m| m.energy.abs() < 1e-8));
    }

    #[test]
    fn ff_files_become_groups() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("b.json"), &[record("b0", vec![O, H, H], -76.0)]);
        write(
            &dir.path().join("a.json"),
            &[record("a0", vec![C, H, H, H, H], -40.0), record("a1", vec![C, H, H, H, H], -40.1)],
        );
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (ds, groups) = small_loader(false).load_ff(dir.path()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(groups.groups, vec![vec![0, 1], vec![2]]);
        assert_eq!(ds.get(0).unwrap().name.as_deref(), Some("a0"));
    }

    #[test]
    fn missing_gdb8_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = small_loader(false)
            .load_gdb8(dir.path(), &dir.path().join("cal.txt"), None)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }

    #[test]
    fn mismatched_coordinates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = record("x", vec![H, H], -1.0);
        bad.coordinates.pop();
        write(&dir.path().join("x.json"), &[bad]);
        let err = small_loader(false).load_ff(dir.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }
}
