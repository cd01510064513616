//! CLI parse: clap types for placegraft. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Placegraft CLI - merge build artifacts into place snapshots and publish them
#[derive(Debug, Parser)]
#[command(name = "placegraft")]
#[command(about = "Graft build artifacts into base place snapshots and publish them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory; relative paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stderr, stdout, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge build artifacts into base snapshots and write a prepared manifest
    Prepare {
        /// Publish targets manifest
        #[arg(long)]
        manifest: PathBuf,
        /// Directory receiving merged place files
        #[arg(long)]
        output_dir: PathBuf,
        /// Where to write the prepared manifest
        #[arg(long)]
        prepared_manifest: PathBuf,
    },
    /// Publish the places listed in a prepared manifest
    Publish {
        /// Prepared manifest written by `prepare`
        #[arg(long)]
        manifest: PathBuf,
        /// Universe owning every target place
        #[arg(long)]
        universe_id: u64,
        /// Open Cloud API key
        #[arg(long, env = "PLACEGRAFT_API_KEY", hide_env_values = true)]
        api_key: String,
        /// Max attempts per target (overrides publish.max_attempts)
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the managed paths a project file declares, one per line
    Paths {
        /// Project file
        #[arg(long)]
        project: PathBuf,
    },
}
