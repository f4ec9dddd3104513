//! pulsebank - offline renderer for the pulsebank drum sequencer.
//!
//! Loads step patterns from a TOML file, runs the engine on a simulated
//! host transport and prints the resulting note events or writes them to a
//! Standard MIDI File.

mod config;
mod midi;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// pulsebank - generative drum patterns from metric weights
#[derive(Parser, Debug)]
#[command(name = "pulsebank")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render generative drum patterns", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render patterns to note events
    Render(RenderArgs),

    /// Print the metric weight table for a cycle length
    Weights {
        /// Cycle length in steps (1-32)
        #[arg(value_name = "STEPS")]
        steps: usize,
    },

    /// Create a default configuration file
    Init,

    /// Show the configuration file path
    ConfigPath,
}

/// Arguments for the `render` command.
#[derive(clap::Args, Debug)]
pub struct RenderArgs {
    /// Config file (default: the user config file, else built-in defaults)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of 4/4 bars to render
    #[arg(short, long)]
    pub bars: Option<u32>,

    /// Seed for the generator and variations
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Event output on stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write a Standard MIDI File
    #[arg(long, value_name = "FILE")]
    pub midi: Option<PathBuf>,

    /// Write the final engine state as JSON
    #[arg(long, value_name = "FILE")]
    pub dump_state: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    None,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Render(render_args) => render::render(render_args),
        Commands::Weights { steps } => {
            let table = pulsebank_core::indispensability::weights(steps);
            let weights: Vec<String> = table.as_slice().iter().map(|w| w.to_string()).collect();
            println!("{} steps: {}", table.len(), weights.join(" "));
            Ok(())
        }
        Commands::Init => {
            let path = config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = config::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
