use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trackforge")]
#[command(author, version, about = "Declarative track policies for media files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate a policy file
    Validate {
        /// Policy to validate (uses [defaults] policy if not specified)
        policy: Option<PathBuf>,
    },

    /// Parse a condition expression and optionally evaluate it
    Check {
        /// Expression, e.g. 'exists(audio, lang == eng)'
        #[arg(required = true)]
        expression: String,

        /// JSON snapshot or track list to evaluate against
        #[arg(long)]
        tracks: Option<PathBuf>,
    },

    /// Show what a policy would do to files described by a snapshot file
    Plan {
        /// Policy file
        #[arg(required = true)]
        policy: PathBuf,

        /// Files to plan (default: every file in the snapshot file)
        files: Vec<PathBuf>,

        /// JSON snapshot file (uses [defaults] snapshots if not specified)
        #[arg(long)]
        snapshots: Option<PathBuf>,

        /// Only run the named phase (repeatable)
        #[arg(long = "phase")]
        phases: Vec<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version information
    Version,
}
