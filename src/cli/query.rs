//! Read-only subcommands: get, eval and dump.

use super::SourceArg;
use crate::document::{Document, Value};
use clap::Args;

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Key to resolve. A dotted path is resolved by its first segment and
    /// then walked inside the winning source.
    pub key: String,

    /// Printed when no source has the key
    #[arg(short, long)]
    pub default: Option<String>,

    /// Print the value as JSON
    #[arg(long)]
    pub json: bool,
}

impl GetArgs {
    /// First path segment, used to pick the winning source.
    pub fn root_key(&self) -> &str {
        self.key.split('.').next().unwrap_or(&self.key)
    }

    /// Render a resolved value for output.
    pub fn render(&self, value: &Value) -> String {
        match value.as_text() {
            Some(text) if !self.json => text,
            _ => value.to_json(true).to_string(),
        }
    }
}

/// Arguments for the eval subcommand
#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Text containing ${Preferences.path} references
    pub text: String,
}

/// Arguments for the dump subcommand
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Dump a single source instead of the merged view
    #[arg(long, value_enum)]
    pub source: Option<SourceArg>,

    /// Keep insertion order instead of sorting keys
    #[arg(long)]
    pub unsorted: bool,

    /// Single-line output
    #[arg(long)]
    pub compact: bool,

    /// Expand references in every string value (keys ending in @Const are kept)
    #[arg(long)]
    pub evaluate: bool,

    /// Remove keys ending in @Editor, as done before publishing
    #[arg(long)]
    pub publish: bool,
}

impl DumpArgs {
    /// Apply the requested publishing transforms to `doc`.
    pub fn transform(&self, doc: &mut Document) {
        if self.publish {
            doc.strip_editor_keys();
        }
        if self.evaluate {
            doc.evaluate_in_place();
        }
    }
}
