use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Recalibrated reference energies keyed by molecule name.
///
/// File format: one `name energy_hartree` pair per line, `#` comments and
/// blank lines ignored.
#[derive(Debug, Clone, Default)]
pub struct Calibration {
    energies: HashMap<String, f64>,
}

impl Calibration {
    pub fn load(path: &Path) -> Result<Calibration> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Calibration::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Calibration> {
        let mut energies = HashMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let bad = |reason: &str| Error::Calibration {
                path: path.to_path_buf(),
                line: lineno + 1,
                reason: reason.to_string(),
            };
            let mut parts = line.split_whitespace();
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(bad("expected `name energy`"));
            };
            let energy: f64 = value.parse().map_err(|_| bad("energy is not a number"))?;
            energies.insert(name.to_string(), energy);
        }
        Ok(Calibration { energies })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.energies.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }
}
