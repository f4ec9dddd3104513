//! Pattern banks and the deferred bank-switch state machine.
//!
//! A [`PatternBank`] holds sixteen [`BankSlot`]s. One of them is *live*: its
//! contents are copied into a working slot that the scheduler reads and
//! that step edits change. What happens to unsaved live edits when another
//! slot is selected is decided by the [`BankSwitchState`] of the request.

use serde::{Deserialize, Serialize};

use crate::pattern::VoicePattern;
use crate::timing::RhythmicDivision;
use crate::{clamp_num_beats, DEFAULT_NUM_BEATS, MAX_STEPS, NUM_BANKS, NUM_VOICES};

/// One stored pattern set: every voice, the cycle length and the division.
///
/// All voices always share the slot's cycle length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BankSlot {
    voices: [VoicePattern; NUM_VOICES],
    n_beats: usize,
    division: RhythmicDivision,
}

impl Default for BankSlot {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_BEATS, RhythmicDivision::default())
    }
}

impl BankSlot {
    /// An empty slot.
    pub fn new(n_beats: usize, division: RhythmicDivision) -> Self {
        let n_beats = clamp_num_beats(n_beats);
        Self {
            voices: [VoicePattern::new(n_beats); NUM_VOICES],
            n_beats,
            division,
        }
    }

    pub fn num_beats(&self) -> usize {
        self.n_beats
    }

    /// Change the cycle length of every voice. Steps are not cleared.
    pub fn set_num_beats(&mut self, n_beats: usize) {
        self.n_beats = clamp_num_beats(n_beats);
        for voice in &mut self.voices {
            voice.set_num_beats(self.n_beats);
        }
    }

    pub fn division(&self) -> RhythmicDivision {
        self.division
    }

    pub fn set_division(&mut self, division: RhythmicDivision) {
        self.division = division;
    }

    /// Pattern of one voice. Out-of-range voices read as voice 15.
    pub fn voice(&self, voice: usize) -> &VoicePattern {
        &self.voices[voice.min(NUM_VOICES - 1)]
    }

    pub fn voices(&self) -> &[VoicePattern; NUM_VOICES] {
        &self.voices
    }

    pub(crate) fn voices_mut(&mut self) -> &mut [VoicePattern; NUM_VOICES] {
        &mut self.voices
    }

    /// Set one step of one voice. Out-of-range voices are ignored.
    pub fn set_beat(&mut self, voice: usize, step: usize, on: bool) {
        if let Some(pattern) = self.voices.get_mut(voice) {
            pattern.set_beat(step, on);
        }
    }

    /// Overwrite the first steps of a voice, clipped to the cycle length.
    pub fn set_pattern(&mut self, voice: usize, steps: &[bool]) {
        let n_beats = self.n_beats;
        if let Some(pattern) = self.voices.get_mut(voice) {
            for (i, &on) in steps.iter().take(n_beats).enumerate() {
                pattern.set_beat(i, on);
            }
        }
    }

    /// Apply one fill probability to every voice.
    pub fn set_fill_probability(&mut self, probability: f32) {
        for voice in &mut self.voices {
            voice.set_fill_probability(probability);
        }
    }

    /// Whether every active step of every voice is off.
    pub fn is_empty(&self) -> bool {
        self.voices.iter().all(|v| v.active_count() == 0)
    }

    /// Serializable copy of this slot.
    pub fn to_snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            n_beats: self.n_beats,
            division: self.division,
            voices: self
                .voices
                .iter()
                .map(|v| (0..MAX_STEPS).map(|i| v.step(i)).collect())
                .collect(),
        }
    }

    /// Rebuild a slot from a snapshot; missing voices and steps stay off.
    pub fn from_snapshot(snapshot: &SlotSnapshot) -> Self {
        let mut slot = Self::new(snapshot.n_beats, snapshot.division);
        for (voice, steps) in snapshot.voices.iter().take(NUM_VOICES).enumerate() {
            for (step, &on) in steps.iter().take(MAX_STEPS).enumerate() {
                slot.voices[voice].set_beat(step, on);
            }
        }
        slot
    }
}

/// Serializable form of a [`BankSlot`].
///
/// Every voice stores its full 32-step capacity so that steps beyond the
/// current cycle length survive a save/restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub n_beats: usize,
    pub division: RhythmicDivision,
    pub voices: Vec<Vec<bool>>,
}

/// What to do with the live slot when a bank switch is serviced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankSwitchState {
    /// Nothing pending.
    #[default]
    DoNothing,
    /// Re-materialize the live slot from its stored copy.
    ReloadCurrent,
    /// Store the live slot, then load the target.
    SaveThenLoad,
    /// Copy `source` into the target, then load the target.
    CopyThenLoad,
    /// Load the target, discarding unsaved live edits.
    LoadWithoutSaving,
}

/// A pending bank switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankSwitchRequest {
    pub state: BankSwitchState,
    /// Slot to load.
    pub target: usize,
    /// Slot to copy from, used by [`BankSwitchState::CopyThenLoad`].
    pub source: Option<usize>,
}

impl BankSwitchRequest {
    pub fn reload_current() -> Self {
        Self {
            state: BankSwitchState::ReloadCurrent,
            target: 0,
            source: None,
        }
    }

    pub fn save_then_load(target: usize) -> Self {
        Self {
            state: BankSwitchState::SaveThenLoad,
            target,
            source: None,
        }
    }

    pub fn copy_then_load(source: usize, target: usize) -> Self {
        Self {
            state: BankSwitchState::CopyThenLoad,
            target,
            source: Some(source),
        }
    }

    pub fn load_without_saving(target: usize) -> Self {
        Self {
            state: BankSwitchState::LoadWithoutSaving,
            target,
            source: None,
        }
    }
}

/// Sixteen stored slots plus the live working copy.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternBank {
    slots: [BankSlot; NUM_BANKS],
    live: BankSlot,
    live_index: usize,
}

impl Default for PatternBank {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternBank {
    /// Empty slots, slot 0 live.
    pub fn new() -> Self {
        Self {
            slots: [BankSlot::default(); NUM_BANKS],
            live: BankSlot::default(),
            live_index: 0,
        }
    }

    /// Stored copy of a slot (index clamped).
    pub fn slot(&self, index: usize) -> &BankSlot {
        &self.slots[clamp_bank(index)]
    }

    pub fn slots(&self) -> &[BankSlot; NUM_BANKS] {
        &self.slots
    }

    /// Index of the slot the live copy came from.
    pub fn live_index(&self) -> usize {
        self.live_index
    }

    /// The live working copy.
    pub fn live(&self) -> &BankSlot {
        &self.live
    }

    /// Mutable live copy; edits stay unsaved until the next save.
    pub fn live_mut(&mut self) -> &mut BankSlot {
        &mut self.live
    }

    /// Write a stored slot; when it is the live slot, the live copy too.
    pub fn write_slot(&mut self, index: usize, slot: BankSlot) {
        let index = clamp_bank(index);
        self.slots[index] = slot;
        if index == self.live_index {
            self.live = slot;
        }
    }

    /// Edit one step of a slot. On the live slot only the live copy
    /// changes until the next save.
    pub fn set_beat(&mut self, index: usize, voice: usize, step: usize, on: bool) {
        let index = clamp_bank(index);
        if index == self.live_index {
            self.live.set_beat(voice, step, on);
        } else {
            self.slots[index].set_beat(voice, step, on);
        }
    }

    /// Overwrite one voice of the live slot and of its stored copy.
    pub fn set_live_pattern(&mut self, voice: usize, steps: &[bool]) {
        self.live.set_pattern(voice, steps);
        self.slots[self.live_index].set_pattern(voice, steps);
    }

    /// Change the cycle length of the live slot and its stored copy.
    pub fn set_live_num_beats(&mut self, n_beats: usize) {
        self.live.set_num_beats(n_beats);
        self.slots[self.live_index].set_num_beats(n_beats);
    }

    /// Change the division of the live slot and its stored copy.
    pub fn set_live_division(&mut self, division: RhythmicDivision) {
        self.live.set_division(division);
        self.slots[self.live_index].set_division(division);
    }

    /// Store the live copy into its slot.
    pub fn save_live(&mut self) {
        self.slots[self.live_index] = self.live;
    }

    /// Materialize a stored slot as the live copy.
    pub fn load(&mut self, index: usize) {
        let index = clamp_bank(index);
        self.live = self.slots[index];
        self.live_index = index;
    }

    /// Copy one stored slot over another. Out-of-range indices are a no-op.
    pub fn copy_slot(&mut self, from: usize, to: usize) -> bool {
        if from >= NUM_BANKS || to >= NUM_BANKS {
            return false;
        }
        self.slots[to] = self.slots[from];
        true
    }

    /// Service a bank switch. Returns whether the live copy was reloaded.
    pub fn handle(&mut self, request: BankSwitchRequest) -> bool {
        match request.state {
            BankSwitchState::DoNothing => false,
            BankSwitchState::ReloadCurrent => {
                self.load(self.live_index);
                true
            }
            BankSwitchState::SaveThenLoad => {
                self.save_live();
                self.load(request.target);
                true
            }
            BankSwitchState::CopyThenLoad => {
                let Some(source) = request.source else {
                    return false;
                };
                if source >= NUM_BANKS || request.target >= NUM_BANKS {
                    return false;
                }
                self.save_live();
                self.copy_slot(source, request.target);
                self.load(request.target);
                true
            }
            BankSwitchState::LoadWithoutSaving => {
                self.load(request.target);
                true
            }
        }
    }
}

/// Clamp a bank index into `0..16`.
pub fn clamp_bank(index: usize) -> usize {
    index.min(NUM_BANKS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_with_live_edit() -> PatternBank {
        let mut bank = PatternBank::new();
        bank.live_mut().set_pattern(0, &[true, false, false, false, true, false, false, false]);
        bank
    }

    #[test]
    fn test_save_then_load_keeps_edits() {
        let mut bank = bank_with_live_edit();
        let edited = *bank.live();

        assert!(bank.handle(BankSwitchRequest::save_then_load(1)));
        assert_eq!(bank.live_index(), 1);
        assert!(bank.live().is_empty());

        // go back to slot 0 and reload it: the edit was saved
        bank.handle(BankSwitchRequest::load_without_saving(0));
        bank.handle(BankSwitchRequest::reload_current());
        assert_eq!(bank.live(), &edited);
    }

    #[test]
    fn test_load_without_saving_discards_edits() {
        let mut bank = bank_with_live_edit();
        bank.handle(BankSwitchRequest::load_without_saving(3));
        bank.handle(BankSwitchRequest::load_without_saving(0));
        assert!(bank.live().is_empty());
    }

    #[test]
    fn test_reload_current_is_idempotent() {
        let mut bank = bank_with_live_edit();
        bank.save_live();
        bank.handle(BankSwitchRequest::reload_current());
        let first = bank.clone();
        bank.handle(BankSwitchRequest::reload_current());
        assert_eq!(bank, first);
    }

    #[test]
    fn test_copy_then_load() {
        let mut bank = bank_with_live_edit();
        bank.live_mut().set_num_beats(12);
        bank.live_mut().set_division(RhythmicDivision::Sixteenth);

        assert!(bank.handle(BankSwitchRequest::copy_then_load(0, 5)));
        assert_eq!(bank.live_index(), 5);
        assert_eq!(bank.live().num_beats(), 12);
        assert_eq!(bank.live().division(), RhythmicDivision::Sixteenth);
        assert_eq!(bank.slot(5), bank.slot(0));
    }

    #[test]
    fn test_copy_with_invalid_indices_is_a_noop() {
        let mut bank = bank_with_live_edit();
        let before = bank.clone();
        assert!(!bank.handle(BankSwitchRequest::copy_then_load(16, 2)));
        assert!(!bank.handle(BankSwitchRequest::copy_then_load(1, 99)));
        assert!(!bank.copy_slot(0, 16));
        assert_eq!(bank, before);
    }

    #[test]
    fn test_bank_index_is_clamped() {
        let mut bank = PatternBank::new();
        bank.handle(BankSwitchRequest::load_without_saving(40));
        assert_eq!(bank.live_index(), NUM_BANKS - 1);
    }

    #[test]
    fn test_write_slot_updates_live_only_when_live() {
        let mut bank = PatternBank::new();
        let mut slot = BankSlot::new(4, RhythmicDivision::Quarter);
        slot.set_beat(1, 2, true);

        bank.write_slot(2, slot);
        assert!(bank.live().is_empty());

        bank.write_slot(0, slot);
        assert_eq!(bank.live(), &slot);
    }

    #[test]
    fn test_step_edits_on_live_slot_stay_unsaved() {
        let mut bank = PatternBank::new();
        bank.set_beat(0, 2, 3, true);
        assert!(bank.live().voice(2).step(3));
        assert!(!bank.slot(0).voice(2).step(3));

        // other slots are edited in place
        bank.set_beat(4, 2, 3, true);
        assert!(bank.slot(4).voice(2).step(3));
    }

    #[test]
    fn test_live_length_and_pattern_are_persisted() {
        let mut bank = PatternBank::new();
        bank.set_live_num_beats(6);
        bank.set_live_division(RhythmicDivision::Quarter);
        bank.set_live_pattern(1, &[true, true, false, true, false, true, true, true]);

        for slot in [bank.live(), bank.slot(0)] {
            assert_eq!(slot.num_beats(), 6);
            assert_eq!(slot.division(), RhythmicDivision::Quarter);
            // clipped to the cycle length
            assert_eq!(slot.voice(1).pattern(), &[true, true, false, true, false, true]);
            assert!(!slot.voice(1).step(6));
        }
    }

    #[test]
    fn test_slot_voices_share_length() {
        let mut slot = BankSlot::default();
        slot.set_num_beats(5);
        assert!(slot.voices().iter().all(|v| v.num_beats() == 5));
    }

    #[test]
    fn test_slot_snapshot_keeps_steps_beyond_length() {
        let mut slot = BankSlot::new(4, RhythmicDivision::Eighth);
        slot.set_beat(3, 10, true);
        let restored = BankSlot::from_snapshot(&slot.to_snapshot());
        assert_eq!(restored, slot);
        assert!(restored.voice(3).step(10));
    }
}
