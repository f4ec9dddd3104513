//! Control messages.
//!
//! A [`ControlRequest`] is resolved on the control side into a
//! [`LiveUpdate`]. Updates are `Copy` and carry no heap data, so handing
//! them to the realtime thread never allocates or frees there. Mutations are
//! computed on the control side and travel as a complete replacement slot.
//! Moves of the bank parameter travel as [`LiveUpdate::SelectBank`] so both
//! sides switch at the same point in the update stream.

use rand::Rng;

use crate::bank::{BankSlot, BankSwitchRequest, PatternBank};
use crate::mutation::Mutation;
use crate::timing::RhythmicDivision;
use crate::MAX_STEPS;

/// A change requested by a user or host.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlRequest {
    // === Step editing ===
    /// Set one step of one voice in a bank slot.
    SetStep {
        bank: usize,
        voice: usize,
        step: usize,
        on: bool,
    },

    /// Overwrite the first steps of a voice in the live slot.
    SetPattern { voice: usize, steps: Vec<bool> },

    // === Slot settings ===
    /// Set the cycle length of the live slot.
    SetNumBeats(usize),

    /// Set the division of the live slot.
    SetDivision(RhythmicDivision),

    /// Set the probability of one IOI factor.
    SetIoiProbability { factor: f32, probability: f32 },

    // === Banks ===
    /// Queue a bank switch for the next block.
    SwitchBank(BankSwitchRequest),

    // === Variations ===
    /// Apply a variation to the live slot.
    Mutate(Mutation),
}

/// A resolved change, applied by the realtime side at block start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LiveUpdate {
    SetStep {
        bank: usize,
        voice: usize,
        step: usize,
        on: bool,
    },
    SetPattern {
        voice: usize,
        steps: [bool; MAX_STEPS],
        len: usize,
    },
    SetNumBeats(usize),
    SetDivision(RhythmicDivision),
    SetIoiProbability {
        factor: f32,
        probability: f32,
    },
    SwitchBank(BankSwitchRequest),
    /// The bank parameter moved to `index`. Queued by the control side in
    /// place of following the parameter on each side separately.
    SelectBank {
        index: usize,
        keep_edits: bool,
        restart: bool,
    },
    /// Write a whole slot, and the live copy when it is the live slot.
    ReplaceSlot {
        index: usize,
        slot: BankSlot,
    },
}

impl ControlRequest {
    /// Resolve against the control side's view of the bank.
    ///
    /// Random variations draw from `rng` here, never on the realtime side.
    pub fn resolve(self, bank: &PatternBank, rng: &mut impl Rng) -> LiveUpdate {
        match self {
            ControlRequest::SetStep {
                bank,
                voice,
                step,
                on,
            } => LiveUpdate::SetStep {
                bank,
                voice,
                step,
                on,
            },
            ControlRequest::SetPattern { voice, steps } => {
                let mut fixed = [false; MAX_STEPS];
                let len = steps.len().min(MAX_STEPS);
                fixed[..len].copy_from_slice(&steps[..len]);
                LiveUpdate::SetPattern {
                    voice,
                    steps: fixed,
                    len,
                }
            }
            ControlRequest::SetNumBeats(n) => LiveUpdate::SetNumBeats(n),
            ControlRequest::SetDivision(division) => LiveUpdate::SetDivision(division),
            ControlRequest::SetIoiProbability {
                factor,
                probability,
            } => LiveUpdate::SetIoiProbability {
                factor,
                probability,
            },
            ControlRequest::SwitchBank(request) => LiveUpdate::SwitchBank(request),
            ControlRequest::Mutate(mutation) => {
                let mut slot = *bank.live();
                mutation.apply(&mut slot, rng);
                log::debug!("Applied {} to bank {}", mutation, bank.live_index());
                LiveUpdate::ReplaceSlot {
                    index: bank.live_index(),
                    slot,
                }
            }
        }
    }
}
