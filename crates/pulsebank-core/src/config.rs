//! Per-block engine parameters.
//!
//! An [`EngineConfig`] is what a host exposes as automatable parameters. It
//! is passed by reference to every block and control tick; nothing in the
//! engine keeps a global copy.

use crate::error::Result;
use crate::NUM_BANKS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters read at the start of every block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Generator complexity (0-1)
    pub complexity: f32,
    /// Probability of silencing a firing pulse (0-1)
    pub rests: f32,
    /// Fill probability for inactive steps (0-1)
    pub fills: f32,
    /// Swing amount (-1 to 1)
    pub swing: f32,
    /// MIDI output channel (1-16)
    pub midi_channel: u8,
    /// Selected bank (0-15), followed at step boundaries
    pub bank_index: usize,
    /// Restart the cycle when the bank changes at a step boundary
    pub restart_on_bank_change: bool,
    /// Whether an editor is showing the live pattern. Bank changes then
    /// keep its unsaved edits.
    pub editor_attached: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            complexity: 0.0,
            rests: 0.0,
            fills: 0.0,
            swing: 0.0,
            midi_channel: 1,
            bank_index: 0,
            restart_on_bank_change: true,
            editor_attached: false,
        }
    }
}

impl EngineConfig {
    /// Copy with every field clamped into its range. NaN becomes 0.
    pub fn clamped(&self) -> Self {
        Self {
            complexity: unit(self.complexity),
            rests: unit(self.rests),
            fills: unit(self.fills),
            swing: if self.swing.is_nan() {
                0.0
            } else {
                self.swing.clamp(-1.0, 1.0)
            },
            midi_channel: self.midi_channel.clamp(1, 16),
            bank_index: self.bank_index.min(NUM_BANKS - 1),
            ..*self
        }
    }

    /// Load a config from a TOML file. Missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        log::debug!("Loaded engine config from {}", path.display());
        Ok(config.clamped())
    }

    /// Write this config as TOML.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
