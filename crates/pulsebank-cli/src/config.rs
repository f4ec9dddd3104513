//! Render configuration for the `pulsebank` command.
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/pulsebank/config.toml`
//! - macOS: `~/Library/Application Support/pulsebank/config.toml`
//! - Windows: `%APPDATA%\pulsebank\config.toml`

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use pulsebank_core::{
    BankSwitchRequest, ControlRequest, EngineConfig, Mutation, RhythmicDivision, NUM_BANKS,
    NUM_VOICES,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a render needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Engine parameters
    pub engine: EngineConfig,
    /// Host transport simulation
    pub transport: TransportSettings,
    /// Seed for the generator and variations (random when absent)
    pub seed: Option<u64>,
    /// Patterns to load before rendering
    pub patterns: Vec<PatternEntry>,
    /// Variations applied to the selected bank after loading
    pub mutations: Vec<Mutation>,
}

/// Simulated host transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Tempo in quarter notes per minute
    pub bpm: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Samples per block
    pub block_size: usize,
    /// Length of the render in 4/4 bars
    pub bars: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            sample_rate: 48_000.0,
            block_size: 512,
            bars: 4,
        }
    }
}

impl TransportSettings {
    /// Total render length in samples.
    pub fn total_samples(&self) -> u64 {
        let seconds = self.bars as f64 * 4.0 * 60.0 / self.bpm;
        (seconds * self.sample_rate).round() as u64
    }
}

/// One voice of one bank, written as a step string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub bank: usize,
    pub voice: usize,
    /// Steps such as `"x...x...|x.x.x..."`
    pub steps: String,
    /// Cycle length; defaults to the number of steps given
    pub num_beats: Option<usize>,
    pub division: Option<RhythmicDivision>,
}

/// Parse a step string.
///
/// `x`, `X` and `1` are active steps; `.`, `-`, `_` and `0` are rests.
/// Whitespace and `|` are ignored so bars can be separated visually.
pub fn parse_steps(input: &str) -> Result<Vec<bool>> {
    let mut steps = Vec::with_capacity(input.len());
    for (i, c) in input.chars().enumerate() {
        match c {
            'x' | 'X' | '1' => steps.push(true),
            '.' | '-' | '_' | '0' => steps.push(false),
            '|' => {}
            c if c.is_whitespace() => {}
            other => bail!("Invalid step character {:?} at position {} in {:?}", other, i, input),
        }
    }
    if steps.is_empty() {
        bail!("Empty step pattern");
    }
    Ok(steps)
}

impl RenderConfig {
    /// Load a render config from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: RenderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, else from the default location, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match config_path() {
            Ok(default) if default.exists() => Self::load_from(&default),
            _ => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Control requests that load the configured patterns.
    ///
    /// Every entry saves the bank it edits; the selected bank is live at the
    /// end and the variations are applied to it.
    pub fn to_requests(&self) -> Result<Vec<ControlRequest>> {
        let mut requests = Vec::new();
        for entry in &self.patterns {
            if entry.bank >= NUM_BANKS {
                bail!("Bank {} out of range (0-{})", entry.bank, NUM_BANKS - 1);
            }
            if entry.voice >= NUM_VOICES {
                bail!("Voice {} out of range (0-{})", entry.voice, NUM_VOICES - 1);
            }
            let steps = parse_steps(&entry.steps)
                .with_context(|| format!("Bank {} voice {}", entry.bank, entry.voice))?;

            requests.push(ControlRequest::SwitchBank(BankSwitchRequest::save_then_load(
                entry.bank,
            )));
            requests.push(ControlRequest::SetNumBeats(
                entry.num_beats.unwrap_or(steps.len()),
            ));
            if let Some(division) = entry.division {
                requests.push(ControlRequest::SetDivision(division));
            }
            requests.push(ControlRequest::SetPattern {
                voice: entry.voice,
                steps,
            });
        }

        requests.push(ControlRequest::SwitchBank(BankSwitchRequest::save_then_load(
            self.engine.clamped().bank_index,
        )));
        requests.extend(self.mutations.iter().map(|&m| ControlRequest::Mutate(m)));
        Ok(requests)
    }
}

/// Get the default configuration file path
pub fn config_path() -> Result<PathBuf> {
    ProjectDirs::from("", "", "pulsebank")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .context("Could not determine config directory")
}

/// Create a default config file with comments
pub fn create_default_config_file() -> Result<PathBuf> {
    let path = config_path()?;
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# pulsebank configuration file

# Seed for the generator and pattern variations (omit for a random seed)
seed = 1

# Variations applied to the selected bank after the patterns are loaded:
# reverse, rotate_left, rotate_right, palindrome, double,
# markov_horizontal, cell_shuffle
mutations = []

[engine]
# Generator complexity (0-1): density and rhythmic variety
complexity = 0.6

# Probability of silencing a generated pulse (0-1)
rests = 0.1

# Probability of a fill on inactive steps (0-1)
fills = 0.1

# Swing (-1 to 1)
swing = 0.0

# MIDI channel (1-16)
midi_channel = 10

# Selected pattern bank (0-15)
bank_index = 0

# Restart the cycle when the bank changes
restart_on_bank_change = true

[transport]
bpm = 120.0
sample_rate = 48000.0
block_size = 512
bars = 4

# Step strings: x = hit, . = rest, | and spaces are ignored
[[patterns]]
bank = 0
voice = 0
steps = "x...x... x...x..."

[[patterns]]
bank = 0
voice = 2
steps = "....x... ....x..."

[[patterns]]
bank = 0
voice = 6
steps = "x.x.x.x. x.x.x.x."
division = "sixteenth"
"#;
