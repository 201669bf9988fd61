use smallvec::{SmallVec, smallvec};

use crate::foundation::core::Axis;

/// Half-widths a separable pass may use: 3, 6 or 9 distinct taps.
pub const SEPARABLE_HALF_WIDTHS: [u32; 3] = [2, 5, 8];

const FOOTPRINT6_WIDE: [f32; 3] = [0.5, 1.5, 2.5];
const FOOTPRINT6_NARROW: [f32; 2] = [0.5, 1.5];
const FOOTPRINT9_GRID: [f32; 3] = [0.0, 1.0, 2.0];

/// Shape of the tap set a kernel samples.
///
/// Patterns are described by their *distinct* taps in the non-negative quadrant (or half-axis);
/// the full sample set is recovered by mirroring, see [`KernelWeights::expand`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapPattern {
    /// Integer offsets `-half_width..=half_width` along a single axis.
    Separable { half_width: u32 },
    /// Half-integer grid `{0.5,1.5,2.5} × {0.5,1.5}`, three columns along `wide`.
    Footprint6 { wide: Axis },
    /// Integer grid `{0,1,2} × {0,1,2}`.
    Footprint9,
}

impl TapPattern {
    /// Smallest separable pattern whose reach covers `3σ` for `radius`, capped at 9 taps.
    pub fn separable_for_radius(radius: f32) -> Self {
        let reach = (1.5 * radius.max(0.0)).ceil();
        let half_width = SEPARABLE_HALF_WIDTHS
            .iter()
            .copied()
            .find(|&hw| hw as f32 >= reach)
            .unwrap_or(SEPARABLE_HALF_WIDTHS[SEPARABLE_HALF_WIDTHS.len() - 1]);
        Self::Separable { half_width }
    }

    /// Number of distinct taps.
    pub fn len(self) -> usize {
        match self {
            Self::Separable { half_width } => half_width as usize + 1,
            Self::Footprint6 { .. } => 6,
            Self::Footprint9 => 9,
        }
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Distinct tap offsets `(x, y)` in source pixels, non-negative.
    pub fn offsets(self) -> SmallVec<[[f32; 2]; 9]> {
        match self {
            Self::Separable { half_width } => (0..=half_width).map(|i| [i as f32, 0.0]).collect(),
            Self::Footprint6 { wide } => {
                let mut out = SmallVec::new();
                for &n in &FOOTPRINT6_NARROW {
                    for &w in &FOOTPRINT6_WIDE {
                        out.push(match wide {
                            Axis::Horizontal => [w, n],
                            Axis::Vertical => [n, w],
                        });
                    }
                }
                out
            }
            Self::Footprint9 => {
                let mut out = SmallVec::new();
                for &y in &FOOTPRINT9_GRID {
                    for &x in &FOOTPRINT9_GRID {
                        out.push([x, y]);
                    }
                }
                out
            }
        }
    }

    /// How many mirrored samples each distinct tap stands for.
    pub fn multiplicities(self) -> SmallVec<[u32; 9]> {
        self.offsets()
            .iter()
            .map(|&[x, y]| {
                let mx = if x == 0.0 { 1 } else { 2 };
                let my = if y == 0.0 { 1 } else { 2 };
                mx * my
            })
            .collect()
    }
}

/// One signed sample of an expanded kernel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tap {
    pub dx: f32,
    pub dy: f32,
    pub weight: f32,
}

/// Normalized weights for the distinct taps of a [`TapPattern`].
#[derive(Clone, Debug, PartialEq)]
pub struct KernelWeights {
    pattern: TapPattern,
    weights: SmallVec<[f32; 9]>,
}

impl KernelWeights {
    pub fn pattern(&self) -> TapPattern {
        self.pattern
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// `Σ weight · multiplicity`, which is 1 for a normalized kernel.
    pub fn weighted_sum(&self) -> f64 {
        self.weights
            .iter()
            .zip(self.pattern.multiplicities())
            .map(|(&w, m)| f64::from(w) * f64::from(m))
            .sum()
    }

    /// Mirror the distinct taps into the full sample list.
    ///
    /// Separable taps are laid out along x; backends rotate them for vertical passes.
    pub fn expand(&self) -> Vec<Tap> {
        let mut out = Vec::new();
        for (&[x, y], &weight) in self.pattern.offsets().iter().zip(&self.weights) {
            let xs = mirrored(x);
            for dy in mirrored(y) {
                for &dx in &xs {
                    out.push(Tap { dx, dy, weight });
                }
            }
        }
        out
    }
}

fn mirrored(v: f32) -> SmallVec<[f32; 2]> {
    if v == 0.0 { smallvec![0.0] } else { smallvec![-v, v] }
}

/// Unnormalized 2D Gaussian density for a blur radius (`σ = radius / 2`).
pub fn gaussian_density(x: f64, y: f64, radius: f64) -> f64 {
    let sigma = radius * 0.5;
    let two_sigma_sq = 2.0 * sigma * sigma;
    (-(x * x + y * y) / two_sigma_sq).exp() / (std::f64::consts::PI * two_sigma_sq)
}

/// Gaussian weights for `pattern` at `effective_radius`.
///
/// `effective_radius` must be `> 0`; rejecting other values is the scheduler's job. The density
/// prefactor cancels under normalization, so exponents are evaluated relative to the nearest tap,
/// which keeps tiny radii from underflowing every tap to zero.
pub fn weights(effective_radius: f32, pattern: TapPattern) -> KernelWeights {
    debug_assert!(effective_radius > 0.0);
    let sigma = f64::from(effective_radius) * 0.5;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let offsets = pattern.offsets();
    let exponents: SmallVec<[f64; 9]> = offsets
        .iter()
        .map(|&[x, y]| {
            let (x, y) = (f64::from(x), f64::from(y));
            -(x * x + y * y) / two_sigma_sq
        })
        .collect();
    let max_exp = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let raw: SmallVec<[f64; 9]> = exponents.iter().map(|e| (e - max_exp).exp()).collect();
    let total: f64 = raw
        .iter()
        .zip(pattern.multiplicities())
        .map(|(w, m)| w * f64::from(m))
        .sum();

    KernelWeights {
        pattern,
        weights: raw.iter().map(|w| (w / total) as f32).collect(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/kernel/weights.rs"]
mod tests;
