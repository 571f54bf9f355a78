//! Set and unset subcommands.

use super::SourceArg;
use crate::document::Value;
use crate::error::{PrefsError, PrefsResult};
use clap::Args;

/// Arguments for the set subcommand
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dot-separated key path (intermediate documents are created)
    pub key: String,

    /// Value to store
    pub value: String,

    /// Parse the value as JSON instead of storing it as a string
    #[arg(long)]
    pub json: bool,

    /// Source to write to
    #[arg(long, value_enum, default_value = "local")]
    pub source: SourceArg,
}

impl SetArgs {
    /// The value to store.
    pub fn parsed_value(&self) -> PrefsResult<Value> {
        if !self.json {
            return Ok(Value::String(self.value.clone()));
        }
        let json: serde_json::Value = serde_json::from_str(&self.value)
            .map_err(|e| PrefsError::invalid_argument(&self.value, &e.to_string()))?;
        match Value::from_json(&json)? {
            Some(value) if value.is_supported() => Ok(value),
            Some(value) => Err(PrefsError::invalid_argument(
                &self.value,
                &format!("unsupported {} value", value.kind()),
            )),
            None => Err(PrefsError::invalid_argument(&self.value, "null cannot be stored")),
        }
    }
}

/// Arguments for the unset subcommand
#[derive(Args, Debug)]
pub struct UnsetArgs {
    /// Top-level key to remove
    pub key: String,

    /// Source to remove the key from
    #[arg(long, value_enum, default_value = "local")]
    pub source: SourceArg,
}
