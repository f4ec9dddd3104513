//! Inter-onset interval (IOI) probability table.
//!
//! An IOI factor is the length of a generated pulse relative to the base
//! step: `0.5` is a subdivision into two, `0.666667` a triplet, `2.0` a pulse
//! spanning two steps. Each factor carries a probability weight; the
//! generator draws from this table whenever complexity asks for a pulse
//! other than the plain step.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of entries in the IOI table.
pub const NUM_IOIS: usize = 26;

/// The fixed set of IOI factors, longest first.
pub const IOI_FACTORS: [f32; NUM_IOIS] = [
    4.0, 3.2, 3.0, 2.666667, 2.285714, 2.0, 1.6, 1.5, 1.333333, 1.142857, 1.0, 0.8, 0.75,
    0.666667, 0.571429, 0.5, 0.4, 0.375, 0.333333, 0.285714, 0.25, 0.2, 0.1875, 0.166667,
    0.142857, 0.125,
];

/// One `{factor, probability}` pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct IoiEntry {
    pub factor: f32,
    pub probability: f32,
}

/// Probability weights for every IOI factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IoiTable {
    entries: [IoiEntry; NUM_IOIS],
}

impl Default for IoiTable {
    fn default() -> Self {
        Self::new()
    }
}

impl IoiTable {
    /// Only the plain step (factor 1) is enabled.
    pub fn new() -> Self {
        let mut entries = [IoiEntry {
            factor: 0.0,
            probability: 0.0,
        }; NUM_IOIS];
        for (entry, &factor) in entries.iter_mut().zip(IOI_FACTORS.iter()) {
            entry.factor = factor;
            entry.probability = if factor == 1.0 { 1.0 } else { 0.0 };
        }
        Self { entries }
    }

    /// Set the probability of the factor nearest to `factor`.
    pub fn set_probability(&mut self, factor: f32, probability: f32) {
        let index = Self::nearest_index(factor);
        self.entries[index].probability = probability.clamp(0.0, 1.0);
    }

    /// Probability of the factor nearest to `factor`.
    pub fn probability(&self, factor: f32) -> f32 {
        self.entries[Self::nearest_index(factor)].probability
    }

    /// All entries, longest factor first.
    pub fn entries(&self) -> &[IoiEntry; NUM_IOIS] {
        &self.entries
    }

    fn nearest_index(factor: f32) -> usize {
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, &candidate) in IOI_FACTORS.iter().enumerate() {
            let distance = (candidate - factor).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        best
    }

    /// Draw a factor weighted by the entry probabilities.
    ///
    /// Falls back to `1.0` when every probability is zero.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        let total: f32 = self.entries.iter().map(|e| e.probability).sum();
        if total <= 0.0 {
            return 1.0;
        }

        let mut target = rng.random::<f32>() * total;
        for entry in &self.entries {
            if entry.probability <= 0.0 {
                continue;
            }
            if target < entry.probability {
                return entry.factor as f64;
            }
            target -= entry.probability;
        }

        // float rounding left us past the end; take the last enabled entry
        self.entries
            .iter()
            .rev()
            .find(|e| e.probability > 0.0)
            .map(|e| e.factor as f64)
            .unwrap_or(1.0)
    }
}
