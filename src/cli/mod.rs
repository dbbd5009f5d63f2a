//! CLI module for Undertone.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::catalog::SelectionStrategy;
use clap::{Parser, Subcommand};

/// Undertone - theme-aware background music for spoken audio
///
/// Transcribes a recording, groups it into narrative sections (Hook, What,
/// Why, How, Ending Hook) and lays matching background music under each one.
#[derive(Parser, Debug)]
#[command(name = "undertone")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add background music to a single audio file
    Process {
        /// Input audio file (mp3, wav, m4a, aac, flac, ogg)
        input: String,

        /// Output WAV file (default: <output_dir>/<name>_with_bgm.wav)
        #[arg(short, long)]
        output: Option<String>,

        /// BGM volume reduction in dB
        #[arg(long)]
        volume_reduction: Option<f32>,

        /// How clips are picked from a theme (random, round-robin)
        #[arg(long)]
        selection: Option<SelectionStrategy>,
    },

    /// Process every audio file in a directory
    Batch {
        /// Directory with input audio
        #[arg(long, default_value = "input_audio")]
        input_dir: String,

        /// Directory for processed files (default: configured output directory)
        #[arg(long)]
        output_dir: Option<String>,

        /// BGM volume reduction in dB
        #[arg(long)]
        volume_reduction: Option<f32>,

        /// Re-process files whose output already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (default: configured host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the themed BGM catalog
    Catalog,

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,
}
