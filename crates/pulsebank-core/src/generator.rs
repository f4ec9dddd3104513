//! Indispensability-driven rhythm generator.
//!
//! The generator turns a continuous step position into a stream of
//! *pulses*. A pulse normally spans one step, but with probability
//! `complexity` its length is drawn from the [`IoiTable`] instead, which
//! yields subdivisions, tuplets and held pulses. Every pulse decides once,
//! at its start, whether it fires and how loud:
//!
//! - fire probability is `complexity * w`, where `w` is the normalized
//!   metric weight of the step the pulse starts on,
//! - an independent rest draw with probability `rests` silences it,
//! - velocity grows with `w`.
//!
//! The scheduler watches [`GeneratorOutput::phase`] to detect pulse starts.

use rand::Rng;

use crate::indispensability::{self, MetricWeights};
use crate::ioi::IoiTable;
use crate::timing::positive_mod;
use crate::{clamp_num_beats, DEFAULT_NUM_BEATS};

/// Quietest velocity the generator produces for a firing pulse.
const MIN_VELOCITY: f32 = 0.25;

/// Result of evaluating the generator at one position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeneratorOutput {
    /// Position inside the current pulse, in `[0, 1)`.
    pub phase: f64,
    /// Velocity of the current pulse, in `[0, 1]`.
    pub velocity: f32,
    /// Length of the current pulse in steps.
    pub gate: f64,
    /// Whether the current pulse sounds.
    pub will_fire: bool,
    /// Steps from the evaluated position to the next pulse.
    pub beats_to_next_pulse: f64,
}

#[derive(Clone, Copy, Debug)]
struct Pulse {
    start: f64,
    length: f64,
    will_fire: bool,
    velocity: f32,
}

impl Pulse {
    fn end(&self) -> f64 {
        self.start + self.length
    }

    fn contains(&self, beat: f64) -> bool {
        beat >= self.start && beat < self.end()
    }
}

/// Generator state: controls, weight table, current pulse and last phase.
#[derive(Clone, Debug)]
pub struct RhythmGenerator {
    complexity: f32,
    rests: f32,
    n_beats: usize,
    weights: &'static MetricWeights,
    ioi: IoiTable,
    pulse: Option<Pulse>,
    last_phase: f64,
}

impl Default for RhythmGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RhythmGenerator {
    /// A generator over the default cycle length with all controls at zero.
    pub fn new() -> Self {
        Self {
            complexity: 0.0,
            rests: 0.0,
            n_beats: DEFAULT_NUM_BEATS,
            weights: indispensability::weights(DEFAULT_NUM_BEATS),
            ioi: IoiTable::new(),
            pulse: None,
            last_phase: 1.0,
        }
    }

    pub fn complexity(&self) -> f32 {
        self.complexity
    }

    pub fn set_complexity(&mut self, complexity: f32) {
        self.complexity = complexity.clamp(0.0, 1.0);
    }

    pub fn rests(&self) -> f32 {
        self.rests
    }

    pub fn set_rests(&mut self, rests: f32) {
        self.rests = rests.clamp(0.0, 1.0);
    }

    pub fn num_beats(&self) -> usize {
        self.n_beats
    }

    /// Change the cycle length and switch to its weight table.
    ///
    /// The current pulse is dropped so the next evaluation starts fresh.
    pub fn set_num_beats(&mut self, n_beats: usize) {
        let n_beats = clamp_num_beats(n_beats);
        if n_beats != self.n_beats {
            self.n_beats = n_beats;
            self.weights = indispensability::weights(n_beats);
            self.pulse = None;
        }
    }

    /// Weight table of the current cycle length.
    pub fn weights(&self) -> &'static MetricWeights {
        self.weights
    }

    pub fn ioi(&self) -> &IoiTable {
        &self.ioi
    }

    pub fn ioi_mut(&mut self) -> &mut IoiTable {
        &mut self.ioi
    }

    /// Phase reported by the previous evaluation.
    pub fn last_phase(&self) -> f64 {
        self.last_phase
    }

    /// Evaluate the generator at a step position inside the cycle.
    ///
    /// Random draws happen only when a new pulse begins, so evaluating
    /// every sample of a pulse costs one set of draws.
    pub fn evaluate(&mut self, beat: f64, rng: &mut impl Rng) -> GeneratorOutput {
        let beat = positive_mod(beat, self.n_beats as f64);

        let pulse = match self.pulse {
            Some(pulse) if pulse.contains(beat) => pulse,
            previous => {
                let pulse = self.start_pulse(beat, previous, rng);
                self.pulse = Some(pulse);
                pulse
            }
        };

        let phase = ((beat - pulse.start) / pulse.length).clamp(0.0, 1.0 - f64::EPSILON);
        self.last_phase = phase;

        GeneratorOutput {
            phase,
            velocity: pulse.velocity,
            gate: pulse.length,
            will_fire: pulse.will_fire,
            beats_to_next_pulse: pulse.end() - beat,
        }
    }

    fn start_pulse(&self, beat: f64, previous: Option<Pulse>, rng: &mut impl Rng) -> Pulse {
        // continue the pulse grid when moving forward by less than a step,
        // otherwise (rewind, loop, first call) snap to the step
        let start = match previous {
            Some(p) if beat >= p.end() && beat < p.end() + 1.0 => p.end(),
            _ => beat.floor(),
        };

        let cycle = self.n_beats as f64;
        let factor = if self.complexity > 0.0 && rng.random::<f32>() < self.complexity {
            self.ioi.sample(rng)
        } else {
            1.0
        };
        let length = factor.min(cycle - start).max(f64::EPSILON);

        let step = start.floor() as usize % self.n_beats;
        let weight = self.weights.normalized(step);

        let fires = rng.random::<f32>() < self.complexity * weight;
        let rested = rng.random::<f32>() < self.rests;

        Pulse {
            start,
            length,
            will_fire: fires && !rested,
            velocity: (MIN_VELOCITY + (1.0 - MIN_VELOCITY) * weight).clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generator(n_beats: usize, complexity: f32, rests: f32) -> RhythmGenerator {
        let mut generator = RhythmGenerator::new();
        generator.set_num_beats(n_beats);
        generator.set_complexity(complexity);
        generator.set_rests(rests);
        generator
    }

    #[test]
    fn test_phase_resets_at_each_step() {
        let mut generator = generator(8, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);

        let a = generator.evaluate(2.25, &mut rng);
        let b = generator.evaluate(2.75, &mut rng);
        assert!((a.phase - 0.25).abs() < 1e-12);
        assert!((b.phase - 0.75).abs() < 1e-12);
        assert!(b.phase > a.phase);

        let c = generator.evaluate(3.1, &mut rng);
        assert!(c.phase < b.phase * 0.5);
        assert!((c.beats_to_next_pulse - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_zero_complexity_never_fires() {
        let mut generator = generator(8, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        for step in 0..64 {
            assert!(!generator.evaluate(step as f64, &mut rng).will_fire);
        }
    }

    #[test]
    fn test_downbeat_always_fires_at_full_complexity() {
        let mut generator = generator(8, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..32 {
            // jump back so every call starts a new pulse on the downbeat
            generator.evaluate(4.0, &mut rng);
            let out = generator.evaluate(0.0, &mut rng);
            assert!(out.will_fire);
            assert!((out.velocity - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_full_rests_silence_everything() {
        let mut generator = generator(8, 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(9);
        for step in 0..64 {
            assert!(!generator.evaluate(step as f64 % 8.0, &mut rng).will_fire);
        }
    }

    #[test]
    fn test_strong_steps_are_louder() {
        let mut generator = generator(8, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(11);
        let downbeat = generator.evaluate(0.0, &mut rng).velocity;
        let weakest = generator.evaluate(1.0, &mut rng).velocity;
        assert!(downbeat > weakest);
        assert!(weakest >= MIN_VELOCITY);
    }

    #[test]
    fn test_subdivided_pulses_follow_the_ioi_table() {
        let mut generator = generator(8, 1.0, 0.0);
        generator.ioi_mut().set_probability(1.0, 0.0);
        generator.ioi_mut().set_probability(0.5, 1.0);
        let mut rng = StdRng::seed_from_u64(13);

        let first = generator.evaluate(0.0, &mut rng);
        assert!((first.gate - 0.5).abs() < 1e-12);
        assert!((first.beats_to_next_pulse - 0.5).abs() < 1e-12);

        // the second half of the step is a new pulse
        let second = generator.evaluate(0.5, &mut rng);
        assert!(second.phase < 1e-12);
    }

    #[test]
    fn test_pulses_never_cross_the_cycle_end() {
        let mut generator = generator(4, 1.0, 0.0);
        generator.ioi_mut().set_probability(1.0, 0.0);
        generator.ioi_mut().set_probability(4.0, 1.0);
        let mut rng = StdRng::seed_from_u64(17);

        generator.evaluate(3.0, &mut rng);
        let out = generator.evaluate(3.5, &mut rng);
        assert!((out.gate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_changing_length_switches_weight_table() {
        let mut generator = RhythmGenerator::new();
        generator.set_num_beats(6);
        assert_eq!(generator.weights().len(), 6);
        generator.set_num_beats(0);
        assert_eq!(generator.num_beats(), 1);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let run = |seed| {
            let mut generator = generator(8, 0.7, 0.2);
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32)
                .map(|i| generator.evaluate(i as f64 * 0.5, &mut rng).will_fire)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
