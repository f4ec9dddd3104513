//! Per-voice step patterns.

use rand::Rng;

use crate::timing::positive_mod;
use crate::{clamp_num_beats, DEFAULT_NUM_BEATS, MAX_STEPS};

/// Gap to the next pulse, in steps, needed before a fill may be inserted.
const FILL_MIN_GAP: f64 = 1.0 - 1e-9;

/// A fixed-capacity step pattern for one voice.
///
/// Only the first `num_beats` steps are played. Steps beyond that are kept
/// untouched so that growing the cycle again brings them back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoicePattern {
    steps: [bool; MAX_STEPS],
    n_beats: usize,
    fill_probability: f32,
}

impl Default for VoicePattern {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_BEATS)
    }
}

impl VoicePattern {
    /// An empty pattern of `n_beats` steps (clamped to `1..=32`).
    pub fn new(n_beats: usize) -> Self {
        Self {
            steps: [false; MAX_STEPS],
            n_beats: clamp_num_beats(n_beats),
            fill_probability: 0.0,
        }
    }

    /// A pattern whose length is the length of `steps`.
    pub fn from_steps(steps: &[bool]) -> Self {
        let mut pattern = Self::new(steps.len());
        for (i, &on) in steps.iter().take(MAX_STEPS).enumerate() {
            pattern.steps[i] = on;
        }
        pattern
    }

    pub fn num_beats(&self) -> usize {
        self.n_beats
    }

    /// Change the active length without clearing any step.
    pub fn set_num_beats(&mut self, n_beats: usize) {
        self.n_beats = clamp_num_beats(n_beats);
    }

    pub fn fill_probability(&self) -> f32 {
        self.fill_probability
    }

    pub fn set_fill_probability(&mut self, probability: f32) {
        self.fill_probability = probability.clamp(0.0, 1.0);
    }

    /// Set one step. Indices past the capacity are ignored.
    pub fn set_beat(&mut self, index: usize, value: bool) {
        if let Some(step) = self.steps.get_mut(index) {
            *step = value;
        }
    }

    /// Stored value of a step, including steps past the active length.
    pub fn step(&self, index: usize) -> bool {
        self.steps.get(index).copied().unwrap_or(false)
    }

    /// The active steps.
    pub fn pattern(&self) -> &[bool] {
        &self.steps[..self.n_beats]
    }

    /// The active steps packed into an integer, step 0 in bit 0.
    pub fn pattern_as_integer(&self) -> u32 {
        self.pattern()
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .fold(0, |bits, (i, _)| bits | (1u32 << i))
    }

    /// Overwrite the active steps from a packed integer.
    pub fn set_pattern_from_integer(&mut self, bits: u32) {
        for i in 0..self.n_beats {
            self.steps[i] = bits & (1u32 << i) != 0;
        }
    }

    /// Number of active steps that are on.
    pub fn active_count(&self) -> usize {
        self.pattern().iter().filter(|&&on| on).count()
    }

    /// Whether the step under `beat` is on.
    pub fn is_on_at(&self, beat: f64) -> bool {
        let index = positive_mod(beat.floor(), self.n_beats as f64) as usize;
        self.steps[index.min(self.n_beats - 1)]
    }

    /// Decide whether this voice sounds at `beat`.
    ///
    /// The stored step wins. Otherwise a fill may fire with the fill
    /// probability, but only when the next pulse is at least a step away.
    /// The RNG is only consulted when a fill is possible.
    pub fn trigger_beat(&self, beat: f64, beats_to_next_pulse: f64, rng: &mut impl Rng) -> bool {
        if self.is_on_at(beat) {
            return true;
        }
        if self.fill_probability <= 0.0 || beats_to_next_pulse < FILL_MIN_GAP {
            return false;
        }
        rng.random::<f32>() < self.fill_probability
    }
}
