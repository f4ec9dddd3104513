//! Metric weight ("indispensability") tables.
//!
//! Each pulse of a cycle of `n` steps gets an integer weight describing how
//! important it is to the perception of the meter. Weights are a permutation
//! of `0..n`, with the downbeat always at `n - 1`.
//!
//! The cycle is stratified by the prime factors of `n` in ascending order.
//! A pulse lives on the coarsest level whose grid contains it. Coarser levels
//! always outrank finer ones; inside a level, the pulse that leads most
//! directly into a stronger coarser pulse wins. For binary meters this is
//! exactly Barlow's indispensability (`8 -> [7, 0, 4, 2, 6, 1, 5, 3]`).

use std::sync::OnceLock;

use crate::{clamp_num_beats, MAX_STEPS};

/// Weight table for one cycle length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricWeights {
    weights: [u8; MAX_STEPS],
    len: usize,
}

impl MetricWeights {
    /// Number of steps covered by this table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a table covers at least one step.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The weights in step order.
    pub fn as_slice(&self) -> &[u8] {
        &self.weights[..self.len]
    }

    /// Weight of a step, wrapping the index around the cycle.
    pub fn weight(&self, step: usize) -> u8 {
        self.weights[step % self.len]
    }

    /// Weight of a step mapped into `(0, 1]`.
    ///
    /// The weakest step maps to `1 / n` rather than zero so that every
    /// step keeps a non-zero chance of sounding.
    pub fn normalized(&self, step: usize) -> f32 {
        (self.weight(step) as f32 + 1.0) / self.len as f32
    }

    /// Interior steps whose weight exceeds both neighbours.
    pub fn local_maxima(&self) -> impl Iterator<Item = usize> + '_ {
        let w = self.as_slice();
        (1..self.len.saturating_sub(1)).filter(move |&i| w[i] > w[i - 1] && w[i] > w[i + 1])
    }
}

/// Get the weight table for `n_beats` steps.
///
/// Lengths outside `1..=32` are clamped. All tables are built on first use
/// and shared afterwards, so this never allocates after warm-up.
pub fn weights(n_beats: usize) -> &'static MetricWeights {
    static TABLES: OnceLock<Vec<MetricWeights>> = OnceLock::new();
    let tables = TABLES.get_or_init(|| (1..=MAX_STEPS).map(compute).collect());
    &tables[clamp_num_beats(n_beats) - 1]
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while n > 1 {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    factors
}

fn compute(n: usize) -> MetricWeights {
    let mut weights = [0u8; MAX_STEPS];

    // strides[k] is the grid spacing of level k; level 0 is the downbeat only
    let mut strides = vec![n];
    for factor in prime_factors(n) {
        let last = strides[strides.len() - 1];
        strides.push(last / factor);
    }

    let mut next = n - 1;
    weights[0] = next as u8;

    for pair in strides.windows(2) {
        let (coarse, fine) = (pair[0], pair[1]);
        // (pulse, sub-steps until the next coarser pulse, weight of that pulse)
        let mut level: Vec<(usize, usize, u8)> = (0..n)
            .filter(|p| p % fine == 0 && p % coarse != 0)
            .map(|p| {
                let distance = (coarse - p % coarse) / fine;
                let target = (p + distance * fine) % n;
                (p, distance, weights[target])
            })
            .collect();
        level.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)));

        for (pulse, _, _) in level {
            next -= 1;
            weights[pulse] = next as u8;
        }
    }

    MetricWeights { weights, len: n }
}
