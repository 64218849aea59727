//! ANI-1 atomic environment vectors.
//!
//! Each atom's feature vector is laid out as
//! `[radial terms per neighbour species][angular terms per species pair]`,
//! with species in [`Element::ALL`] order and pairs `(a, b)` with `a <= b`.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::data::element::Element;

const PAIR_COUNT: usize = Element::COUNT * (Element::COUNT + 1) / 2;

/// Symmetry-function parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturizerParams {
    /// Radial cutoff (Å).
    pub radial_cutoff: f64,
    /// Angular cutoff (Å).
    pub angular_cutoff: f64,
    pub radial_eta: f64,
    pub angular_eta: f64,
    pub zeta: f64,
    /// Radial shell centres (Å).
    pub radial_shifts: Vec<f64>,
    /// Angle centres (rad).
    pub angle_shifts: Vec<f64>,
    /// Radial shell centres of the angular terms (Å).
    pub angular_radial_shifts: Vec<f64>,
}

impl Default for FeaturizerParams {
    fn default() -> Self {
        let radial_cutoff = 4.6;
        let radial_step = (radial_cutoff - 0.5) / 16.0;
        FeaturizerParams {
            radial_cutoff,
            angular_cutoff: 3.1,
            radial_eta: 16.0,
            angular_eta: 6.0,
            zeta: 32.0,
            radial_shifts: (0..16).map(|k| 0.5 + k as f64 * radial_step).collect(),
            angle_shifts: (0..8).map(|k| PI / 16.0 + k as f64 * PI / 8.0).collect(),
            angular_radial_shifts: (0..4).map(|k| 0.5 + k as f64 * 0.65).collect(),
        }
    }
}

impl FeaturizerParams {
    pub fn radial_size(&self) -> usize {
        Element::COUNT * self.radial_shifts.len()
    }

    pub fn angular_size(&self) -> usize {
        PAIR_COUNT * self.angle_shifts.len() * self.angular_radial_shifts.len()
    }

    /// Width of one atom's feature vector (384 with the defaults).
    pub fn feature_size(&self) -> usize {
        self.radial_size() + self.angular_size()
    }
}

/// Cosine cutoff: `0.5 cos(pi r / rc) + 0.5` inside the cutoff, 0 beyond.
pub fn cutoff(r: f64, rc: f64) -> f64 {
    if r > rc {
        0.0
    } else {
        0.5 * (PI * r / rc).cos() + 0.5
    }
}

fn pair_index(a: usize, b: usize) -> usize {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    a * Element::COUNT - a * a.saturating_sub(1) / 2 + (b - a)
}

fn distance(p: &[f64; 3], q: &[f64; 3]) -> f64 {
    ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2)).sqrt()
}

fn sub(p: &[f64; 3], q: &[f64; 3]) -> [f64; 3] {
    [p[0] - q[0], p[1] - q[1], p[2] - q[2]]
}

/// Computes one feature vector per atom.
pub fn featurize(params: &FeaturizerParams, species: &[Element], coords: &[[f64; 3]]) -> Vec<Vec<f64>> {
    debug_assert_eq!(species.len(), coords.len());
    let n = species.len();
    let n_rs = params.radial_shifts.len();
    let n_theta = params.angle_shifts.len();
    let n_rsa = params.angular_radial_shifts.len();
    let radial_size = params.radial_size();
    let angular_norm = 2f64.powf(1.0 - params.zeta);

    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = distance(&coords[i], &coords[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut feat = vec![0.0; params.feature_size()];

        for j in 0..n {
            if j == i || dist[i][j] > params.radial_cutoff {
                continue;
            }
            let r = dist[i][j];
            let fc = cutoff(r, params.radial_cutoff);
            let base = species[j].index() * n_rs;
            for (k, rs) in params.radial_shifts.iter().enumerate() {
                feat[base + k] += (-params.radial_eta * (r - rs).powi(2)).exp() * fc;
            }
        }

        for j in 0..n {
            if j == i || dist[i][j] > params.angular_cutoff {
                continue;
            }
            for k in (j + 1)..n {
                if k == i || dist[i][k] > params.angular_cutoff {
                    continue;
                }
                let (rij, rik) = (dist[i][j], dist[i][k]);
                if rij == 0.0 || rik == 0.0 {
                    continue;
                }
                let vj = sub(&coords[j], &coords[i]);
                let vk = sub(&coords[k], &coords[i]);
                let cos = ((vj[0] * vk[0] + vj[1] * vk[1] + vj[2] * vk[2]) / (rij * rik)).clamp(-1.0, 1.0);
                // Shrink slightly so acos stays differentiable at colinear triples.
                let theta = (0.95 * cos).acos();
                let fc = cutoff(rij, params.angular_cutoff) * cutoff(rik, params.angular_cutoff);
                let r_mean = 0.5 * (rij + rik);
                let base = radial_size
                    + pair_index(species[j].index(), species[k].index()) * n_theta * n_rsa;

                for (t, ts) in params.angle_shifts.iter().enumerate() {
                    let ang = (1.0 + (theta - ts).cos()).powf(params.zeta);
                    for (s, rs) in params.angular_radial_shifts.iter().enumerate() {
                        let rad = (-params.angular_eta * (r_mean - rs).powi(2)).exp();
                        feat[base + t * n_rsa + s] += angular_norm * ang * rad * fc;
                    }
                }
            }
        }

        out.push(feat);
    }
    out
}
