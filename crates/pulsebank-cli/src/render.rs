//! Offline rendering.
//!
//! Drives the engine the way a host would: the patterns from the render
//! config are loaded through control requests, then blocks are processed
//! back to back on a simulated playing transport.

use crate::config::RenderConfig;
use crate::{midi, OutputFormat, RenderArgs};
use anyhow::{Context, Result};
use pulsebank_core::{Engine, NoteKind, TransportSnapshot};
use serde::Serialize;
use std::fs;

/// An event placed on the render timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedEvent {
    /// Absolute sample time
    pub sample: u64,
    pub seconds: f64,
    pub voice: u8,
    pub note: u8,
    pub kind: NoteKind,
    /// MIDI velocity (0 for note-offs)
    pub velocity: u8,
}

/// Result of a render: the events and the final engine.
pub struct Render {
    pub events: Vec<RenderedEvent>,
    pub engine: Engine,
}

/// Run the `render` subcommand.
pub fn render(args: RenderArgs) -> Result<()> {
    let mut config = RenderConfig::resolve(args.config.as_deref())?;
    if let Some(bars) = args.bars {
        config.transport.bars = bars;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    let rendered = render_config(&config)?;
    let channel = config.engine.clamped().midi_channel;

    match args.format {
        OutputFormat::Text => {
            for event in &rendered.events {
                println!("{}", format_event(event));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rendered.events)
                .context("Failed to serialize events")?;
            println!("{}", json);
        }
        OutputFormat::None => {}
    }

    if let Some(path) = &args.midi {
        midi::write_midi(
            &rendered.events,
            config.transport.bpm,
            config.transport.sample_rate,
            channel,
            path,
        )?;
    }

    if let Some(path) = &args.dump_state {
        let json = serde_json::to_string_pretty(&rendered.engine.snapshot())
            .context("Failed to serialize engine state")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write state: {}", path.display()))?;
        log::info!("Wrote engine state to {}", path.display());
    }

    Ok(())
}

/// Render a config to events.
pub fn render_config(config: &RenderConfig) -> Result<Render> {
    let transport = &config.transport;
    if transport.bpm <= 0.0 || transport.sample_rate <= 0.0 {
        anyhow::bail!("Tempo and sample rate must be positive");
    }
    if transport.block_size == 0 {
        anyhow::bail!("Block size must be at least 1");
    }

    let seed = config.seed.unwrap_or_else(rand::random);
    log::info!("Rendering {} bars at {} bpm (seed {})", transport.bars, transport.bpm, seed);

    let mut engine = Engine::new(seed);
    engine.on_control_tick(&config.engine, config.to_requests()?);

    let total = transport.total_samples();
    let block = transport.block_size as u64;
    let mut events = Vec::new();
    let mut time = 0u64;
    while time < total {
        let len = block.min(total - time);
        let snapshot = TransportSnapshot::playing(transport.bpm, time as i64, transport.sample_rate);
        for event in engine.process_block(&snapshot, &config.engine, len as usize) {
            let sample = time + event.sample_offset as u64;
            events.push(RenderedEvent {
                sample,
                seconds: sample as f64 / transport.sample_rate,
                voice: event.voice,
                note: event.note(),
                kind: event.kind,
                velocity: event.midi_velocity(),
            });
        }
        time += len;
    }

    let ons = events.iter().filter(|e| e.kind == NoteKind::On).count();
    log::info!("Rendered {} note-ons, {} events total", ons, events.len());
    Ok(Render { events, engine })
}

fn format_event(event: &RenderedEvent) -> String {
    let kind = match event.kind {
        NoteKind::On => "on ",
        NoteKind::Off => "off",
    };
    format!(
        "{:>10.4}s  {}  voice {:>2}  note {:>3}  vel {:>3}",
        event.seconds, kind, event.voice, event.note, event.velocity
    )
}
