use serde::{Deserialize, Serialize};

use crate::data::element::Element;
use crate::error::{Error, Result};

/// Per-element energy offsets subtracted from total energies before
/// training, so the networks only learn the interaction part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfEnergies {
    /// Hartree, indexed by [`Element::index`].
    pub offsets: [f64; Element::COUNT],
}

impl SelfEnergies {
    /// Isolated-atom energies at the ANI-1 reference level of theory.
    pub fn self_interaction() -> SelfEnergies {
        SelfEnergies {
            offsets: [-0.500607632585, -37.8302333826, -54.5680045287, -75.0362229210],
        }
    }

    pub fn of(&self, species: &[Element]) -> f64 {
        species.iter().map(|e| self.offsets[e.index()]).sum()
    }

    /// Least-squares fit of `energy ≈ Σ offset[species]` over `samples`.
    ///
    /// Elements that never occur keep their self-interaction value.
    pub fn fit<'a, I>(samples: I) -> Result<SelfEnergies>
    where
        I: IntoIterator<Item = (&'a [Element], f64)>,
    {
        const K: usize = Element::COUNT;
        let mut ata = [[0.0f64; K]; K];
        let mut aty = [0.0f64; K];
        let mut seen = [false; K];
        let mut n = 0usize;

        for (species, energy) in samples {
            let mut counts = [0.0f64; K];
            for e in species {
                counts[e.index()] += 1.0;
                seen[e.index()] = true;
            }
            for a in 0..K {
                aty[a] += counts[a] * energy;
                for b in 0..K {
                    ata[a][b] += counts[a] * counts[b];
                }
            }
            n += 1;
        }
        if n == 0 {
            return Err(Error::SingularFit("no samples".into()));
        }

        let present: Vec<usize> = (0..K).filter(|&k| seen[k]).collect();
        let m = present.len();
        let mut aug: Vec<Vec<f64>> = present.iter()
            .map(|&a| {
                let mut row: Vec<f64> = present.iter().map(|&b| ata[a][b]).collect();
                row.push(aty[a]);
                row
            })
            .collect();

        // Gaussian elimination with partial pivoting.
        for col in 0..m {
            let pivot = (col..m)
                .max_by(|&x, &y| aug[x][col].abs().total_cmp(&aug[y][col].abs()))
                .unwrap_or(col);
            if aug[pivot][col].abs() < 1e-10 {
                return Err(Error::SingularFit(format!(
                    "element composition does not determine {}",
                    Element::ALL[present[col]]
                )));
            }
            aug.swap(col, pivot);
            for row in (col + 1)..m {
                let f = aug[row][col] / aug[col][col];
                for c in col..=m {
                    aug[row][c] -= f * aug[col][c];
                }
            }
        }
        let mut x = vec![0.0; m];
        for row in (0..m).rev() {
            let tail: f64 = ((row + 1)..m).map(|c| aug[row][c] * x[c]).sum();
            x[row] = (aug[row][m] - tail) / aug[row][row];
        }

        let mut fitted = SelfEnergies::self_interaction();
        for (slot, value) in present.iter().zip(x) {
            fitted.offsets[*slot] = value;
        }
        Ok(fitted)
    }
}
