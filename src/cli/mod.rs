//! CLI command definitions for layered-prefs
//!
//! This module defines the CLI structure using clap's derive macros.
//! Override arguments (`--Preferences...`) are split off before clap sees
//! the command line; see [`crate::overrides::StartupArgs::partition`].

pub mod edit;
pub mod query;

use crate::config::ExecutionMode;
use crate::source::SourceKind;
use clap::{Parser, Subcommand, ValueEnum};
use edit::{SetArgs, UnsetArgs};
use query::{DumpArgs, EvalArgs, GetArgs};

/// Execution mode as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Production,
    Development,
    Test,
    Editor,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Production => ExecutionMode::Production,
            ModeArg::Development => ExecutionMode::Development,
            ModeArg::Test => ExecutionMode::Test,
            ModeArg::Editor => ExecutionMode::Editor,
        }
    }
}

/// Source selector for commands that touch a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Asset,
    Local,
    Remote,
}

impl From<SourceArg> for SourceKind {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Asset => SourceKind::Asset,
            SourceArg::Local => SourceKind::Local,
            SourceArg::Remote => SourceKind::Remote,
        }
    }
}

/// Inspect and edit layered preferences
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a settings file (replaces project and user settings)
    #[arg(short, long, global = true)]
    pub settings: Option<String>,

    /// Execution mode (overrides settings)
    #[arg(short, long, value_enum, global = true)]
    pub mode: Option<ModeArg>,

    /// Accept overrides for read-only sources in production mode
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Sources to resolve through, highest priority first
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_value = "local,remote,asset",
        global = true
    )]
    pub sources: Vec<SourceArg>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Selected layers as source kinds, in priority order.
    pub fn layers(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| SourceKind::from(*s)).collect()
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a key across the selected sources
    Get(GetArgs),

    /// Store a value in a writable source and save it
    Set(SetArgs),

    /// Remove a key from a writable source and save it
    Unset(UnsetArgs),

    /// Expand ${Preferences.path} references in a string
    Eval(EvalArgs),

    /// Print a source, or the merged view of the selected sources, as JSON
    Dump(DumpArgs),

    /// Show the state of every source
    Status,

    /// Fetch the remote source and report the result
    Fetch,
}
