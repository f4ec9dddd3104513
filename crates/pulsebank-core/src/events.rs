//! Note events produced by the scheduler.
//!
//! Events are timestamped by their sample offset inside the audio block
//! that produced them. Within one block they are ordered by offset, and at
//! equal offsets every note-off precedes every note-on.

use serde::{Deserialize, Serialize};

/// MIDI note number of voice 0. Voice `v` plays note `BASE_NOTE + v`.
pub const BASE_NOTE: u8 = 36;

/// Whether an event starts or ends a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    On,
    Off,
}

/// A voice trigger at a sample offset inside the current block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Voice index (0-15).
    pub voice: u8,
    /// Note on or note off.
    pub kind: NoteKind,
    /// Velocity in `[0, 1]`; zero for note-offs.
    pub velocity: f32,
    /// Sample offset within the block.
    pub sample_offset: u32,
}

impl TriggerEvent {
    /// Create a note-on event.
    pub fn note_on(voice: usize, velocity: f32, sample_offset: usize) -> Self {
        Self {
            voice: voice as u8,
            kind: NoteKind::On,
            velocity: velocity.clamp(0.0, 1.0),
            sample_offset: sample_offset as u32,
        }
    }

    /// Create a note-off event.
    pub fn note_off(voice: usize, sample_offset: usize) -> Self {
        Self {
            voice: voice as u8,
            kind: NoteKind::Off,
            velocity: 0.0,
            sample_offset: sample_offset as u32,
        }
    }

    /// MIDI note number for this event's voice.
    pub fn note(&self) -> u8 {
        BASE_NOTE + self.voice
    }

    /// Velocity scaled to the MIDI range. Note-ons never map to 0.
    pub fn midi_velocity(&self) -> u8 {
        match self.kind {
            NoteKind::Off => 0,
            NoteKind::On => ((self.velocity * 127.0).round() as u8).clamp(1, 127),
        }
    }

    /// Raw three-byte MIDI message on `channel` (1-16, clamped).
    pub fn to_midi_bytes(&self, channel: u8) -> [u8; 3] {
        let channel = channel.clamp(1, 16) - 1;
        let status = match self.kind {
            NoteKind::On => 0x90,
            NoteKind::Off => 0x80,
        };
        [status | channel, self.note(), self.midi_velocity()]
    }
}
