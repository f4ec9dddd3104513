//! Pulsebank Core - a generative drum sequencer driven by metric weights.
//!
//! This crate provides the engine behind pulsebank:
//!
//! - **Indispensability** - Metric weight tables for cycles of 1-32 steps
//! - **Generator** - Probabilistic pulse stream shaped by complexity and rests
//! - **Patterns** - Sixteen voice step patterns per bank slot, with fills
//! - **Banks** - Sixteen stored slots and the deferred bank-switch state machine
//! - **Mutation** - Reverse, rotate, palindrome, double, Markov and cell shuffle
//! - **Sequencer** - Sample-accurate transport scheduler with swing
//! - **Runtime** - Control/realtime split over a bounded channel
//!
//! # Architecture
//!
//! The realtime side owns a [`Sequencer`] and turns each audio block into
//! [`TriggerEvent`]s. The control side resolves [`ControlRequest`]s into
//! complete [`LiveUpdate`]s and hands them over through a bounded
//! `crossbeam-channel`; the realtime side drains that channel at the start
//! of every block and never blocks. Observers read the current step and the
//! live bank through the shared [`Monitor`].
//!
//! For single-threaded hosts and tests, [`Engine`] drives both sides
//! directly.

pub mod bank;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod generator;
pub mod indispensability;
pub mod ioi;
pub mod mutation;
pub mod pattern;
pub mod runtime;
pub mod sequencer;
pub mod state;
pub mod timing;

/// Number of voices in every slot.
pub const NUM_VOICES: usize = 16;

/// Number of pattern bank slots.
pub const NUM_BANKS: usize = 16;

/// Step capacity of a voice pattern.
pub const MAX_STEPS: usize = 32;

/// Cycle length of a fresh slot.
pub const DEFAULT_NUM_BEATS: usize = 8;

/// Clamp a cycle length into `1..=32`.
#[inline]
pub fn clamp_num_beats(n_beats: usize) -> usize {
    n_beats.clamp(1, MAX_STEPS)
}

// Re-export main types for convenience
pub use bank::{BankSlot, BankSwitchRequest, BankSwitchState, PatternBank, SlotSnapshot};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use events::{NoteKind, TriggerEvent, BASE_NOTE};
pub use generator::{GeneratorOutput, RhythmGenerator};
pub use indispensability::MetricWeights;
pub use ioi::{IoiEntry, IoiTable};
pub use mutation::Mutation;
pub use pattern::VoicePattern;
pub use runtime::{Controller, Monitor, RealtimeSequencer};
pub use sequencer::Sequencer;
pub use state::{ControlRequest, EngineSnapshot, LiveUpdate};
pub use timing::{BlockClock, RhythmicDivision, Swing, TransportSnapshot};
