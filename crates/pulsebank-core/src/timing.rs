//! Timing primitives for mapping host transport time onto sequencer steps.
//!
//! This module provides the fundamental timing types used by the scheduler:
//!
//! - [`TransportSnapshot`] - Host transport state for one audio block
//! - [`RhythmicDivision`] - Note value of one sequencer step
//! - [`BlockClock`] - Per-sample beat positions within a block
//! - [`Swing`] - Non-linear warp of each 2-step cell
//! - [`positive_mod`] - Floor modulo that stays positive during rewinds

use serde::{Deserialize, Serialize};

/// Host transport state, read once per audio block.
///
/// `bpm` and `time_in_samples` are optional because hosts do not always
/// report them; a block without either produces no events.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    pub bpm: Option<f64>,
    pub time_in_samples: Option<i64>,
    pub sample_rate: f64,
}

impl TransportSnapshot {
    /// A playing transport at the given tempo and position.
    pub fn playing(bpm: f64, time_in_samples: i64, sample_rate: f64) -> Self {
        Self {
            is_playing: true,
            bpm: Some(bpm),
            time_in_samples: Some(time_in_samples),
            sample_rate,
        }
    }

    /// A stopped transport.
    pub fn stopped(sample_rate: f64) -> Self {
        Self {
            is_playing: false,
            bpm: None,
            time_in_samples: None,
            sample_rate,
        }
    }

    /// Tempo and position, if the block should produce output.
    pub fn position(&self) -> Option<(f64, i64)> {
        if !self.is_playing || self.sample_rate <= 0.0 {
            return None;
        }
        match (self.bpm, self.time_in_samples) {
            (Some(bpm), Some(time)) if bpm > 0.0 => Some((bpm, time)),
            _ => None,
        }
    }
}

/// Note value of one sequencer step.
///
/// The numeric codes (1 = half note .. 6 = 64th note) are what hosts and
/// snapshots store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmicDivision {
    Half = 1,
    Quarter = 2,
    Eighth = 3,
    Sixteenth = 4,
    ThirtySecond = 5,
    SixtyFourth = 6,
}

impl Default for RhythmicDivision {
    fn default() -> Self {
        Self::Eighth
    }
}

impl RhythmicDivision {
    /// Build from a numeric code, clamping into `1..=6`.
    pub fn from_code(code: i32) -> Self {
        match code {
            i32::MIN..=1 => Self::Half,
            2 => Self::Quarter,
            3 => Self::Eighth,
            4 => Self::Sixteenth,
            5 => Self::ThirtySecond,
            _ => Self::SixtyFourth,
        }
    }

    /// The numeric code of this division.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Steps per quarter note: `2^(code - 2)`.
    pub fn beat_div_factor(self) -> f64 {
        2f64.powi(self.code() - 2)
    }
}

impl std::fmt::Display for RhythmicDivision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Half => "1/2",
            Self::Quarter => "1/4",
            Self::Eighth => "1/8",
            Self::Sixteenth => "1/16",
            Self::ThirtySecond => "1/32",
            Self::SixtyFourth => "1/64",
        };
        f.write_str(name)
    }
}

/// Floor modulo: the result is always in `[0, modulus)`.
#[inline]
pub fn positive_mod(value: f64, modulus: f64) -> f64 {
    let r = value % modulus;
    let r = if r < 0.0 { r + modulus } else { r };
    // -tiny % m + m can round up to m itself
    if r >= modulus {
        0.0
    } else {
        r
    }
}

/// Swing warp applied within each 2-step cell.
///
/// The exponent is `1 + s²` for positive swing and `1 - 0.5·s²` for
/// negative swing. Zero swing leaves positions untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Swing {
    exponent: f64,
}

impl Swing {
    /// Build from a swing amount in `[-1, 1]` (clamped).
    pub fn new(amount: f32) -> Self {
        let s = amount.clamp(-1.0, 1.0) as f64;
        let exponent = if s >= 0.0 {
            1.0 + s * s
        } else {
            1.0 - 0.5 * s * s
        };
        Self { exponent }
    }

    /// Exponent applied to the position inside each cell.
    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Whether this swing changes positions at all.
    pub fn is_active(&self) -> bool {
        self.exponent != 1.0
    }

    /// Warp a beat position: `(floor(b/2) + frac(b/2)^e) * 2`.
    pub fn apply(&self, beat: f64) -> f64 {
        let half = beat * 0.5;
        let cell = half.floor();
        (cell + (half - cell).powf(self.exponent)) * 2.0
    }
}

/// Beat positions for the samples of one block.
///
/// Positions are in steps of the active division, measured from the start
/// of the host timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockClock {
    host_position: f64,
    increment: f64,
}

impl BlockClock {
    /// Derive the clock from tempo, host position and division.
    pub fn new(bpm: f64, time_in_samples: i64, sample_rate: f64, division: RhythmicDivision) -> Self {
        let factor = division.beat_div_factor();
        let samples_per_minute = sample_rate * 60.0;
        Self {
            host_position: (bpm * factor * time_in_samples as f64) / samples_per_minute,
            increment: (bpm * factor) / samples_per_minute,
        }
    }

    /// Position of the first sample of the block.
    pub fn host_position(&self) -> f64 {
        self.host_position
    }

    /// Advance per sample, in steps.
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Unwarped position of sample `index` in the block.
    #[inline]
    pub fn beat_at(&self, index: usize) -> f64 {
        self.host_position + index as f64 * self.increment
    }
}
