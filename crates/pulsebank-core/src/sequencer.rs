//! Sample-accurate transport scheduler.
//!
//! For every sample of a block the sequencer maps host time to a step
//! position, optionally swung, and evaluates the rhythm generator there.
//! Whenever the generator starts a new pulse, all voices receive a note-off
//! and the voices whose pattern (or a fill) agrees receive a note-on, both
//! at that sample offset.
//!
//! Bank switches requested from the control side are deferred to the start
//! of the next block. Switches driven by the `bank_index` parameter happen
//! at step boundaries, or at block start while the transport is stopped.
//! On the realtime side of a split engine the parameter arrives as a queued
//! [`LiveUpdate::SelectBank`] instead, and only the restart waits for the
//! next step boundary.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::bank::{clamp_bank, BankSlot, BankSwitchRequest, BankSwitchState, PatternBank};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::TriggerEvent;
use crate::generator::RhythmGenerator;
use crate::runtime::Monitor;
use crate::state::{EngineSnapshot, LiveUpdate};
use crate::timing::{positive_mod, BlockClock, Swing, TransportSnapshot};
use crate::NUM_VOICES;

/// Events a block can hold. Pulses that would not fit are dropped.
pub const EVENT_CAPACITY: usize = 1024;

/// Most events a single pulse emits: a note-off and a note-on per voice.
const EVENTS_PER_PULSE: usize = 2 * NUM_VOICES;

/// Realtime sequencer state.
#[derive(Clone, Debug)]
pub struct Sequencer {
    bank: PatternBank,
    pending: BankSwitchRequest,
    generator: RhythmGenerator,
    rng: StdRng,
    /// Step of the previous sample, `None` before the first played sample.
    last_step: Option<usize>,
    /// Raw position that counts as step 0 after a restart.
    sync_offset: f64,
    /// Last value seen on the bank parameter.
    observed_bank: usize,
    /// Whether `process_block` follows the bank parameter itself.
    follows_parameter: bool,
    /// Restart the cycle at the next step boundary.
    restart_pending: bool,
    events: Vec<TriggerEvent>,
    monitor: Arc<Monitor>,
}

impl Sequencer {
    /// A sequencer with empty banks, publishing to `monitor`.
    pub fn new(seed: u64, monitor: Arc<Monitor>) -> Self {
        let mut sequencer = Self {
            bank: PatternBank::new(),
            pending: BankSwitchRequest {
                state: BankSwitchState::DoNothing,
                target: 0,
                source: None,
            },
            generator: RhythmGenerator::new(),
            rng: StdRng::seed_from_u64(seed),
            last_step: None,
            sync_offset: 0.0,
            observed_bank: 0,
            follows_parameter: true,
            restart_pending: false,
            events: Vec::with_capacity(EVENT_CAPACITY),
            monitor,
        };
        sequencer.sync_live();
        sequencer
    }

    pub fn bank(&self) -> &PatternBank {
        &self.bank
    }

    /// The slot being played.
    pub fn live(&self) -> &BankSlot {
        self.bank.live()
    }

    pub fn generator(&self) -> &RhythmGenerator {
        &self.generator
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub(crate) fn set_monitor(&mut self, monitor: Arc<Monitor>) {
        self.monitor = monitor;
        self.sync_live();
    }

    /// Stop `process_block` from following the bank parameter. Moves of the
    /// parameter must then arrive as [`LiveUpdate::SelectBank`].
    pub(crate) fn set_follows_parameter(&mut self, follows: bool) {
        self.follows_parameter = follows;
    }

    /// Step of the most recently processed sample.
    pub fn current_step(&self) -> Option<usize> {
        self.last_step
    }

    /// The bank switch waiting for the next block.
    pub fn pending_switch(&self) -> BankSwitchState {
        self.pending.state
    }

    pub fn sync_offset(&self) -> f64 {
        self.sync_offset
    }

    /// Apply a resolved control change.
    ///
    /// Bank switch requests are only queued; they take effect at the next
    /// block. A move of the bank parameter loads its bank right away.
    pub fn apply(&mut self, update: LiveUpdate) {
        match update {
            LiveUpdate::SetStep {
                bank,
                voice,
                step,
                on,
            } => self.bank.set_beat(bank, voice, step, on),
            LiveUpdate::SetPattern { voice, steps, len } => {
                self.bank.set_live_pattern(voice, &steps[..len]);
            }
            LiveUpdate::SetNumBeats(n) => self.bank.set_live_num_beats(n),
            LiveUpdate::SetDivision(division) => self.bank.set_live_division(division),
            LiveUpdate::SetIoiProbability {
                factor,
                probability,
            } => self.generator.ioi_mut().set_probability(factor, probability),
            LiveUpdate::SwitchBank(request) => self.pending = request,
            LiveUpdate::SelectBank {
                index,
                keep_edits,
                restart,
            } => {
                if self.select_bank(index, keep_edits) && restart {
                    self.restart_pending = true;
                }
            }
            LiveUpdate::ReplaceSlot { index, slot } => self.bank.write_slot(index, slot),
        }
        self.sync_live();
    }

    /// Service the queued bank switch, if any.
    pub fn service_pending_switch(&mut self) -> bool {
        let request = self.pending;
        self.pending.state = BankSwitchState::DoNothing;
        if request.state == BankSwitchState::DoNothing {
            return false;
        }

        let switched = self.bank.handle(request);
        if switched {
            log::trace!(
                "Bank switch {:?} serviced, live bank is {}",
                request.state,
                self.bank.live_index()
            );
            self.sync_live();
        }
        switched
    }

    /// Follow the bank parameter. Only changes of the parameter switch banks,
    /// so a bank chosen by a control request sticks until the parameter
    /// moves.
    pub fn follow_bank_parameter(&mut self, config: &EngineConfig) -> bool {
        if config.bank_index == self.observed_bank {
            return false;
        }
        self.select_bank(config.bank_index, config.editor_attached)
    }

    /// The update that carries a move of the bank parameter, if it moved.
    pub fn bank_parameter_update(&self, config: &EngineConfig) -> Option<LiveUpdate> {
        (config.bank_index != self.observed_bank).then_some(LiveUpdate::SelectBank {
            index: config.bank_index,
            keep_edits: config.editor_attached,
            restart: config.restart_on_bank_change,
        })
    }

    /// Record a new parameter value and load its bank, saving the live slot
    /// first when `keep_edits` is set.
    fn select_bank(&mut self, index: usize, keep_edits: bool) -> bool {
        let index = clamp_bank(index);
        self.observed_bank = index;
        if index == self.bank.live_index() {
            return false;
        }

        let request = if keep_edits {
            BankSwitchRequest::save_then_load(index)
        } else {
            BankSwitchRequest::load_without_saving(index)
        };
        self.bank.handle(request);
        log::trace!("Bank parameter moved to {}", index);
        self.sync_live();
        true
    }

    /// Push continuous parameters into the generator and voices.
    pub fn apply_config(&mut self, config: &EngineConfig) {
        self.generator.set_complexity(config.complexity);
        self.generator.set_rests(config.rests);
        self.bank.live_mut().set_fill_probability(config.fills);
    }

    /// Render one block of `block_len` samples.
    ///
    /// Returns the events of this block ordered by sample offset, with
    /// note-offs before note-ons at equal offsets.
    pub fn process_block(
        &mut self,
        transport: &TransportSnapshot,
        config: &EngineConfig,
        block_len: usize,
    ) -> &[TriggerEvent] {
        self.events.clear();
        let config = config.clamped();

        self.service_pending_switch();
        self.apply_config(&config);

        let Some((bpm, time_in_samples)) = transport.position() else {
            // banks still follow the parameter while stopped, without a restart
            self.restart_pending = false;
            if self.follows_parameter && self.follow_bank_parameter(&config) {
                self.apply_config(&config);
            }
            return &self.events;
        };

        // division is fixed for the whole block
        let clock = BlockClock::new(
            bpm,
            time_in_samples,
            transport.sample_rate,
            self.bank.live().division(),
        );
        let swing = Swing::new(config.swing);
        let mut n_beats = self.bank.live().num_beats() as f64;
        let mut dropped = 0usize;

        for i in 0..block_len {
            let mut raw = clock.beat_at(i);
            if swing.is_active() {
                raw = swing.apply(raw);
            }

            let mut beat = positive_mod(raw - self.sync_offset, n_beats);
            let step = beat.floor() as usize;
            if self.last_step != Some(step) {
                let switched = self.follows_parameter && self.follow_bank_parameter(&config);
                let restart = std::mem::take(&mut self.restart_pending)
                    || (switched && config.restart_on_bank_change);
                let step = if switched || restart {
                    if restart {
                        self.sync_offset = raw;
                    }
                    self.apply_config(&config);
                    n_beats = self.bank.live().num_beats() as f64;
                    beat = positive_mod(raw - self.sync_offset, n_beats);
                    beat.floor() as usize
                } else {
                    step
                };
                self.last_step = Some(step);
                self.monitor.publish_step(Some(step));
            }

            let last_phase = self.generator.last_phase();
            let out = self.generator.evaluate(beat, &mut self.rng);
            if out.phase >= 0.5 * last_phase {
                continue;
            }

            if self.events.capacity() - self.events.len() < EVENTS_PER_PULSE {
                dropped += 1;
                continue;
            }
            for voice in 0..NUM_VOICES {
                self.events.push(TriggerEvent::note_off(voice, i));
            }
            if !out.will_fire {
                continue;
            }
            for voice in 0..NUM_VOICES {
                let pattern = self.bank.live().voice(voice);
                if pattern.trigger_beat(beat, out.beats_to_next_pulse, &mut self.rng) {
                    self.events
                        .push(TriggerEvent::note_on(voice, out.velocity, i));
                }
            }
        }

        if dropped > 0 {
            log::trace!("Event buffer full, dropped {} pulses", dropped);
        }
        &self.events
    }

    /// Snapshot of banks and IOI table.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(&self.bank, self.generator.ioi())
    }

    /// Replace banks and IOI table from a snapshot.
    pub fn restore(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        let bank = snapshot.to_bank()?;
        let ioi = snapshot.to_ioi_table()?;
        self.bank = bank;
        *self.generator.ioi_mut() = ioi;
        self.pending.state = BankSwitchState::DoNothing;
        self.observed_bank = self.bank.live_index();
        self.restart_pending = false;
        self.last_step = None;
        self.monitor.publish_step(None);
        self.sync_live();
        log::debug!("Restored snapshot, live bank {}", self.bank.live_index());
        Ok(())
    }

    /// Bring the generator in line with the live slot and publish the bank.
    fn sync_live(&mut self) {
        self.generator.set_num_beats(self.bank.live().num_beats());
        self.monitor.publish_bank(self.bank.live_index());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::Mutation;
    use crate::state::ControlRequest;
    use crate::timing::RhythmicDivision;
    use crate::NUM_BANKS;

    const SR: f64 = 48_000.0;

    fn sequencer() -> Sequencer {
        Sequencer::new(7, Arc::new(Monitor::new()))
    }

    fn steps(bits: &[u8]) -> Vec<bool> {
        bits.iter().map(|&b| b == 1).collect()
    }

    fn set_pattern(sequencer: &mut Sequencer, voice: usize, bits: &[u8]) {
        sequencer.apply(LiveUpdate::SetNumBeats(bits.len()));
        let mut fixed = [false; crate::MAX_STEPS];
        fixed[..bits.len()].copy_from_slice(&steps(bits));
        sequencer.apply(LiveUpdate::SetPattern {
            voice,
            steps: fixed,
            len: bits.len(),
        });
    }

    fn full_complexity() -> EngineConfig {
        EngineConfig {
            complexity: 1.0,
            ..EngineConfig::default()
        }
    }

    /// Samples per step at 120 bpm, eighth notes, 48 kHz.
    const STEP_SAMPLES: usize = 12_000;

    #[test]
    fn test_stopped_transport_is_silent() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 1, 1, 1, 1, 1, 1, 1]);
        let events = sequencer.process_block(&TransportSnapshot::stopped(SR), &full_complexity(), 512);
        assert!(events.is_empty());
        assert_eq!(sequencer.current_step(), None);
    }

    #[test]
    fn test_missing_tempo_is_silent() {
        let mut sequencer = sequencer();
        let mut transport = TransportSnapshot::playing(120.0, 0, SR);
        transport.bpm = None;
        assert!(sequencer.process_block(&transport, &full_complexity(), 512).is_empty());
    }

    #[test]
    fn test_step_transition_at_exact_crossing() {
        let mut sequencer = sequencer();
        let transport = TransportSnapshot::playing(120.0, 0, SR);
        let events = sequencer
            .process_block(&transport, &EngineConfig::default(), 16_384)
            .to_vec();

        let increment = 120.0 * 2.0 / (SR * 60.0);
        let crossing = (0..16_384)
            .find(|&i| (i as f64 * increment).floor() >= 1.0)
            .unwrap();

        // complexity 0: nothing fires, but every pulse start closes all voices
        let offsets: Vec<u32> = events
            .iter()
            .filter(|e| e.voice == 0)
            .map(|e| e.sample_offset)
            .collect();
        assert_eq!(offsets, vec![0, crossing as u32]);
        assert!(events.iter().all(|e| e.kind == crate::NoteKind::Off));
        assert_eq!(sequencer.current_step(), Some(1));
    }

    #[test]
    fn test_step_index_in_small_blocks() {
        let mut sequencer = sequencer();
        let config = full_complexity();
        let block = 512;

        let first = sequencer
            .process_block(&TransportSnapshot::playing(120.0, 0, SR), &config, block)
            .to_vec();
        assert_eq!(sequencer.current_step(), Some(0));
        assert!(first.iter().any(|e| e.sample_offset == 0));

        // the block holding sample 12000 is the first to report step 1
        let mut seen = Vec::new();
        for b in 1..30 {
            let time = (b * block) as i64;
            sequencer.process_block(&TransportSnapshot::playing(120.0, time, SR), &config, block);
            seen.push((time, sequencer.current_step()));
        }
        for (time, step) in seen {
            let expected = if time as usize + block > STEP_SAMPLES { 1 } else { 0 };
            assert_eq!(step, Some(expected), "block at {time}");
        }
    }

    #[test]
    fn test_save_then_load_during_playback() {
        let mut sequencer = sequencer();
        let config = EngineConfig::default();
        sequencer.process_block(&TransportSnapshot::playing(120.0, 0, SR), &config, 512);

        sequencer.apply(LiveUpdate::SetStep {
            bank: 0,
            voice: 0,
            step: 3,
            on: true,
        });
        let modified = *sequencer.live();

        sequencer.apply(LiveUpdate::SwitchBank(BankSwitchRequest::save_then_load(1)));
        sequencer.process_block(&TransportSnapshot::playing(120.0, 512, SR), &config, 512);
        assert_eq!(sequencer.bank().live_index(), 1);
        assert!(sequencer.live().is_empty());

        sequencer.apply(LiveUpdate::SwitchBank(BankSwitchRequest::load_without_saving(0)));
        sequencer.process_block(&TransportSnapshot::playing(120.0, 1024, SR), &config, 512);
        sequencer.apply(LiveUpdate::SwitchBank(BankSwitchRequest::reload_current()));
        sequencer.process_block(&TransportSnapshot::playing(120.0, 1536, SR), &config, 512);
        assert_eq!(sequencer.live().voices(), modified.voices());
    }

    #[test]
    fn test_active_downbeat_fires_every_cycle() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 0, 0, 0]);
        let config = full_complexity();

        let mut ons = Vec::new();
        let block = 512;
        let cycles = 3;
        for b in 0..(cycles * 4 * STEP_SAMPLES / block) {
            let time = (b * block) as i64;
            let transport = TransportSnapshot::playing(120.0, time, SR);
            for event in sequencer.process_block(&transport, &config, block) {
                if event.kind == crate::NoteKind::On {
                    ons.push((time + event.sample_offset as i64, event.voice));
                }
            }
        }

        let downbeats: Vec<i64> = ons
            .iter()
            .filter(|(_, voice)| *voice == 0)
            .map(|(time, _)| *time)
            .collect();
        assert_eq!(downbeats.len(), 3);
        for (cycle, time) in downbeats.iter().enumerate() {
            assert!((time - cycle as i64 * 48_000).abs() <= 1, "{time}");
        }
        // every other voice is empty
        assert!(ons.iter().all(|(_, voice)| *voice == 0));
    }

    #[test]
    fn test_note_offs_precede_note_ons() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 1, 1, 1]);
        set_pattern(&mut sequencer, 3, &[1, 1, 1, 1]);
        let config = full_complexity();
        let transport = TransportSnapshot::playing(120.0, 0, SR);
        let events = sequencer.process_block(&transport, &config, 4 * STEP_SAMPLES);

        for pair in events.windows(2) {
            assert!(pair[0].sample_offset <= pair[1].sample_offset);
            if pair[0].sample_offset == pair[1].sample_offset {
                assert!(!(pair[0].kind == crate::NoteKind::On && pair[1].kind == crate::NoteKind::Off));
            }
        }
    }

    #[test]
    fn test_pending_switch_waits_for_next_block() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 0, 0, 0]);
        sequencer.apply(LiveUpdate::SwitchBank(BankSwitchRequest::save_then_load(2)));
        assert_eq!(sequencer.bank().live_index(), 0);
        assert_eq!(sequencer.pending_switch(), BankSwitchState::SaveThenLoad);

        // serviced even while stopped
        sequencer.process_block(&TransportSnapshot::stopped(SR), &EngineConfig::default(), 64);
        assert_eq!(sequencer.bank().live_index(), 2);
        assert_eq!(sequencer.pending_switch(), BankSwitchState::DoNothing);
        assert_eq!(sequencer.monitor().live_bank(), 2);
        assert_eq!(sequencer.bank().slot(0).num_beats(), 4);
    }

    #[test]
    fn test_bank_parameter_switches_at_step_boundary_and_restarts() {
        let mut sequencer = sequencer();
        let mut four_steps = BankSlot::new(4, RhythmicDivision::Eighth);
        four_steps.set_beat(1, 0, true);
        sequencer.apply(LiveUpdate::ReplaceSlot {
            index: 5,
            slot: four_steps,
        });

        let transport = TransportSnapshot::playing(120.0, 0, SR);
        let config = full_complexity();
        sequencer.process_block(&transport, &config, STEP_SAMPLES + STEP_SAMPLES / 2);
        assert_eq!(sequencer.current_step(), Some(1));

        // the parameter moves mid-step; the switch waits for the boundary
        let config = EngineConfig {
            bank_index: 5,
            ..full_complexity()
        };
        let start = (STEP_SAMPLES + STEP_SAMPLES / 2) as i64;
        let transport = TransportSnapshot::playing(120.0, start, SR);
        let events = sequencer
            .process_block(&transport, &config, STEP_SAMPLES)
            .to_vec();

        assert_eq!(sequencer.bank().live_index(), 5);
        assert_eq!(sequencer.current_step(), Some(0));
        assert!(sequencer.sync_offset() > 1.99 && sequencer.sync_offset() < 2.01);

        let ons: Vec<&TriggerEvent> = events
            .iter()
            .filter(|e| e.kind == crate::NoteKind::On)
            .collect();
        assert_eq!(ons.len(), 1);
        assert_eq!(ons[0].voice, 1);
        assert!((ons[0].sample_offset as i64 - (STEP_SAMPLES / 2) as i64).abs() <= 1);
    }

    #[test]
    fn test_bank_parameter_is_edge_triggered() {
        let mut sequencer = sequencer();
        let transport = TransportSnapshot::playing(120.0, 0, SR);
        let config = EngineConfig::default();

        sequencer.apply(LiveUpdate::SwitchBank(BankSwitchRequest::load_without_saving(7)));
        sequencer.process_block(&transport, &config, 2 * STEP_SAMPLES);
        // parameter still reads 0, but it never moved
        assert_eq!(sequencer.bank().live_index(), 7);
    }

    #[test]
    fn test_editor_keeps_live_edits_on_parameter_switch() {
        let mut sequencer = sequencer();
        sequencer.apply(LiveUpdate::SetStep {
            bank: 0,
            voice: 4,
            step: 2,
            on: true,
        });
        let config = EngineConfig {
            bank_index: 1,
            editor_attached: true,
            ..EngineConfig::default()
        };
        sequencer.process_block(&TransportSnapshot::playing(120.0, 0, SR), &config, 16);
        assert_eq!(sequencer.bank().live_index(), 1);
        assert!(sequencer.bank().slot(0).voice(4).step(2));
    }

    #[test]
    fn test_without_editor_live_edits_are_dropped() {
        let mut sequencer = sequencer();
        sequencer.apply(LiveUpdate::SetStep {
            bank: 0,
            voice: 4,
            step: 2,
            on: true,
        });
        let config = EngineConfig {
            bank_index: 1,
            ..EngineConfig::default()
        };
        sequencer.process_block(&TransportSnapshot::playing(120.0, 0, SR), &config, 16);
        assert!(!sequencer.bank().slot(0).voice(4).step(2));
    }

    #[test]
    fn test_swing_delays_odd_steps() {
        let mut sequencer = sequencer();
        let config = EngineConfig {
            swing: 1.0,
            ..EngineConfig::default()
        };
        let transport = TransportSnapshot::playing(120.0, 0, SR);
        let events = sequencer.process_block(&transport, &config, 2 * STEP_SAMPLES);

        let pulses: Vec<u32> = events
            .iter()
            .filter(|e| e.voice == 0)
            .map(|e| e.sample_offset)
            .collect();
        // step 1 starts where (t/2)^2 * 2 reaches 1, i.e. t = sqrt(2) steps
        assert_eq!(pulses.len(), 2);
        assert_eq!(pulses[0], 0);
        let expected = 2f64.sqrt() * STEP_SAMPLES as f64;
        assert!((pulses[1] as f64 - expected).abs() <= 1.0, "{}", pulses[1]);
    }

    #[test]
    fn test_bank_parameter_followed_while_stopped() {
        let mut sequencer = sequencer();
        let config = EngineConfig {
            bank_index: 5,
            ..EngineConfig::default()
        };
        let events = sequencer.process_block(&TransportSnapshot::stopped(SR), &config, 64);
        assert!(events.is_empty());
        assert_eq!(sequencer.bank().live_index(), 5);
        assert_eq!(sequencer.monitor().live_bank(), 5);
        assert_eq!(sequencer.sync_offset(), 0.0);

        // a playing transport without tempo counts as stopped
        let mut transport = TransportSnapshot::playing(120.0, 0, SR);
        transport.bpm = None;
        let config = EngineConfig {
            bank_index: 2,
            ..EngineConfig::default()
        };
        sequencer.process_block(&transport, &config, 64);
        assert_eq!(sequencer.bank().live_index(), 2);
        assert_eq!(sequencer.current_step(), None);
    }

    #[test]
    fn test_host_loop_replays_downbeat_once_per_pass() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 0, 0, 0]);
        let config = full_complexity();

        // the host loops back to 0 after 48 blocks, a little past step 2
        let block = 512;
        let loop_blocks = 48;
        let mut ons = Vec::new();
        for b in 0..3 * loop_blocks {
            let time = ((b % loop_blocks) * block) as i64;
            let transport = TransportSnapshot::playing(120.0, time, SR);
            for event in sequencer.process_block(&transport, &config, block) {
                if event.kind == crate::NoteKind::On {
                    ons.push((b, event.sample_offset, event.voice));
                }
            }
        }

        assert_eq!(ons, vec![(0, 0, 0), (48, 0, 0), (96, 0, 0)]);
        assert_eq!(sequencer.current_step(), Some(2));
    }

    #[test]
    fn test_pre_roll_reaches_downbeat_at_zero() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 0, 0, 0]);
        let config = full_complexity();

        let block = 512;
        let start = -2 * STEP_SAMPLES as i64;
        let mut ons = Vec::new();
        let mut first_step = None;
        for b in 0..60 {
            let time = start + (b * block) as i64;
            let transport = TransportSnapshot::playing(120.0, time, SR);
            for event in sequencer.process_block(&transport, &config, block) {
                if event.kind == crate::NoteKind::On {
                    ons.push(time + event.sample_offset as i64);
                }
            }
            if b == 0 {
                first_step = sequencer.current_step();
            }
        }

        // two steps before zero is step 2 of the wrapped cycle
        assert_eq!(first_step, Some(2));
        assert_eq!(ons.len(), 1);
        assert!(ons[0].abs() <= 1, "{}", ons[0]);
    }

    #[test]
    fn test_dense_blocks_never_grow_the_event_buffer() {
        let mut sequencer = sequencer();
        sequencer.apply(LiveUpdate::SetDivision(RhythmicDivision::SixtyFourth));
        sequencer.apply(LiveUpdate::SetIoiProbability {
            factor: 1.0,
            probability: 0.0,
        });
        sequencer.apply(LiveUpdate::SetIoiProbability {
            factor: 0.125,
            probability: 1.0,
        });
        for voice in 0..NUM_VOICES {
            set_pattern(&mut sequencer, voice, &[1; 8]);
        }
        let capacity = sequencer.events.capacity();

        // about 73 pulses of at least 16 note-offs each
        let transport = TransportSnapshot::playing(200.0, 0, SR);
        let events = sequencer
            .process_block(&transport, &full_complexity(), 8192)
            .to_vec();

        assert_eq!(sequencer.events.capacity(), capacity);
        assert!(events.len() > capacity - EVENTS_PER_PULSE);
        for pair in events.windows(2) {
            assert!(pair[0].sample_offset <= pair[1].sample_offset);
        }
    }

    #[test]
    fn test_mutation_update_reaches_live_slot() {
        let mut sequencer = sequencer();
        set_pattern(&mut sequencer, 0, &[1, 0, 0, 0, 1, 0, 0, 0]);
        let mut rng = StdRng::seed_from_u64(0);
        let update = ControlRequest::Mutate(Mutation::Reverse).resolve(sequencer.bank(), &mut rng);
        sequencer.apply(update);

        assert_eq!(
            sequencer.live().voice(0).pattern(),
            steps(&[0, 0, 0, 1, 0, 0, 0, 1]).as_slice()
        );
        assert_eq!(sequencer.bank().slot(0), sequencer.live());
    }

    #[test]
    fn test_num_beats_change_reaches_generator() {
        let mut sequencer = sequencer();
        sequencer.apply(LiveUpdate::SetNumBeats(12));
        assert_eq!(sequencer.generator().num_beats(), 12);
        assert_eq!(sequencer.bank().slot(0).num_beats(), 12);
    }

    #[test]
    fn test_restore_replaces_banks() {
        let mut source = sequencer();
        set_pattern(&mut source, 2, &[1, 0, 1]);
        source.apply(LiveUpdate::SetIoiProbability {
            factor: 0.5,
            probability: 0.7,
        });
        let snapshot = source.snapshot();

        let mut target = sequencer();
        target.restore(&snapshot).unwrap();
        assert_eq!(target.snapshot(), snapshot);
        assert_eq!(target.generator().num_beats(), 3);

        let mut broken = snapshot;
        broken.banks.truncate(NUM_BANKS - 1);
        assert!(target.restore(&broken).is_err());
    }
}
