//! Standard MIDI File output for rendered events.
//!
//! Output is SMF Format 1: a tempo track followed by one drum track on the
//! configured channel. Sample times are converted to ticks at the render
//! tempo.

use crate::render::RenderedEvent;
use anyhow::{Context, Result};
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use pulsebank_core::NoteKind;
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u32 = 480;

/// Convert events to MIDI and write them to a file.
pub fn write_midi(
    events: &[RenderedEvent],
    bpm: f64,
    sample_rate: f64,
    channel: u8,
    path: &Path,
) -> Result<()> {
    let smf = events_to_smf(events, bpm, sample_rate, channel);
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(anyhow::Error::msg)
        .context("Failed to encode MIDI file")?;
    std::fs::write(path, &buf)
        .with_context(|| format!("Failed to write MIDI file: {}", path.display()))?;
    log::info!("Wrote {} events to {}", events.len(), path.display());
    Ok(())
}

/// Sample time to ticks at `bpm`.
fn sample_to_tick(sample: u64, bpm: f64, sample_rate: f64) -> u32 {
    let quarters = sample as f64 / sample_rate * bpm / 60.0;
    (quarters * TICKS_PER_QUARTER as f64).round() as u32
}

fn events_to_smf(events: &[RenderedEvent], bpm: f64, sample_rate: f64, channel: u8) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER as u16)),
    ));

    // Track 0: tempo
    let tempo_microseconds = (60_000_000.0 / bpm).round() as u32;
    let tempo_track: Track<'static> = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    smf.tracks.push(tempo_track);

    // Track 1: drums
    let channel = u4::new(channel.clamp(1, 16) - 1);
    let mut track: Track<'static> = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"pulsebank")),
    }];

    let mut last_tick = 0;
    for event in events {
        let tick = sample_to_tick(event.sample, bpm, sample_rate).max(last_tick);
        let key = u7::new(event.note);
        let message = match event.kind {
            NoteKind::On => MidiMessage::NoteOn {
                key,
                vel: u7::new(event.velocity),
            },
            NoteKind::Off => MidiMessage::NoteOff {
                key,
                vel: u7::new(0),
            },
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}
