//! Command-line overrides.
//!
//! Start-up arguments of the form
//!
//! ```text
//! --<Prefix>[@<Scope>].<dot.path>=<value>
//! -<Prefix>[@<Scope>].<dot.path> <value>
//! ```
//!
//! are collected into [`OverrideEntry`]s and written into a document as the
//! last step of parsing a source, so they win over file and network content.
//! Unscoped entries apply to every source, `@Asset` and `@Local` entries only
//! to that source. A scoped argument without a path
//! (`--Preferences@Local=/tmp/prefs.json`) replaces the source's backing
//! location instead.
//!
//! Values are always stored as strings. Tokens that do not match are ignored.

use crate::document::{Document, Value};
use crate::source::SourceKind;
use tracing::{debug, warn};

/// Default reserved prefix for override arguments.
pub const DEFAULT_PREFIX: &str = "Preferences";

/// Ordered `(key, value)` pairs parsed from start-up arguments.
///
/// Keys have their leading `-`/`--` removed. Flags without a value map to an
/// empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupArgs {
    pairs: Vec<(String, String)>,
}

impl StartupArgs {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Parse option tokens out of `argv` (without the program name).
    ///
    /// Accepts `--key=value`, `-key=value`, `--key value` and bare `--flag`.
    /// Positional tokens are skipped.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = argv.into_iter().map(Into::into).collect();
        let mut pairs = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let consumed = match split_option(&tokens[i], tokens.get(i + 1)) {
                Some((key, value, consumed)) => {
                    pairs.push((key, value));
                    consumed
                }
                None => 1,
            };
            i += consumed;
        }
        Self { pairs }
    }

    /// Split `argv` into override tokens for `prefix` and everything else.
    ///
    /// Lets a front-end argument parser see only the arguments it knows.
    pub fn partition(argv: Vec<String>, prefix: &str) -> (Self, Vec<String>) {
        let mut pairs = Vec::new();
        let mut rest = Vec::new();
        let mut i = 0;
        while i < argv.len() {
            match split_option(&argv[i], argv.get(i + 1)) {
                Some((key, value, consumed)) if key.starts_with(prefix) => {
                    pairs.push((key, value));
                    i += consumed;
                }
                _ => {
                    rest.push(argv[i].clone());
                    i += 1;
                }
            }
        }
        (Self { pairs }, rest)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Returns `(key, value, tokens consumed)` for an option token.
fn split_option(token: &str, next: Option<&String>) -> Option<(String, String, usize)> {
    let body = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    if body.is_empty() || body.starts_with('-') {
        return None;
    }

    if let Some((key, value)) = body.split_once('=') {
        if key.is_empty() {
            return None;
        }
        return Some((key.to_string(), value.to_string(), 1));
    }

    match next {
        Some(value) if !value.starts_with('-') => Some((body.to_string(), value.clone(), 2)),
        _ => Some((body.to_string(), String::new(), 1)),
    }
}

/// Which sources an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideScope {
    Global,
    Asset,
    Local,
}

impl OverrideScope {
    /// Scope from the text after `@`, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("asset") {
            Some(OverrideScope::Asset)
        } else if name.eq_ignore_ascii_case("local") {
            Some(OverrideScope::Local)
        } else {
            None
        }
    }

    pub fn applies_to(&self, kind: SourceKind) -> bool {
        match self {
            OverrideScope::Global => true,
            OverrideScope::Asset => kind == SourceKind::Asset,
            OverrideScope::Local => kind == SourceKind::Local,
        }
    }
}

/// A single `(scope, path, value)` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry {
    pub scope: OverrideScope,
    pub path: String,
    pub value: String,
}

/// Every override found in the start-up arguments, in argument order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    entries: Vec<OverrideEntry>,
    locations: Vec<(OverrideScope, String)>,
}

impl Overrides {
    /// Collect overrides for `prefix` from parsed arguments.
    pub fn parse(args: &StartupArgs, prefix: &str) -> Self {
        let mut overrides = Self::default();
        for (key, value) in args.pairs() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };

            let (scope, rest) = match rest.strip_prefix('@') {
                Some(scoped) => {
                    let (name, rest) = match scoped.find('.') {
                        Some(dot) => scoped.split_at(dot),
                        None => (scoped, ""),
                    };
                    match OverrideScope::from_name(name) {
                        Some(scope) => (scope, rest),
                        None => {
                            debug!(argument = %key, "Ignoring override with unknown scope");
                            continue;
                        }
                    }
                }
                None => (OverrideScope::Global, rest),
            };

            let value = trim_quotes(value).to_string();
            if rest.is_empty() {
                if scope != OverrideScope::Global && !value.is_empty() {
                    overrides.locations.push((scope, value));
                }
                continue;
            }

            let Some(path) = rest.strip_prefix('.') else {
                // Some other argument that merely shares the prefix
                continue;
            };
            if path.is_empty() || path.split('.').any(str::is_empty) {
                debug!(argument = %key, "Ignoring override with malformed path");
                continue;
            }

            overrides.entries.push(OverrideEntry {
                scope,
                path: path.to_string(),
                value,
            });
        }
        overrides
    }

    pub fn entries(&self) -> &[OverrideEntry] {
        &self.entries
    }

    /// Entries that apply to `kind`, in argument order.
    pub fn for_source(&self, kind: SourceKind) -> Vec<OverrideEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.scope.applies_to(kind))
            .cloned()
            .collect()
    }

    /// Backing location override for `kind`; the last one given wins.
    pub fn location_for(&self, kind: SourceKind) -> Option<&str> {
        self.locations
            .iter()
            .rev()
            .find(|(scope, _)| scope.applies_to(kind))
            .map(|(_, location)| location.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.locations.is_empty()
    }
}

/// Strip one layer of matching surrounding quotes.
fn trim_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Write `entries` into `doc` in order, creating intermediate documents.
///
/// Bypasses the writable flag; callers decide whether a source may receive
/// overrides. Returns the number of applied entries.
pub fn apply(doc: &mut Document, entries: &[OverrideEntry]) -> usize {
    let mut applied = 0;
    for entry in entries {
        let segments: Vec<&str> = entry.path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut target = &mut *doc;
        for segment in parents {
            if target.has(segment) && target.get_document(segment).is_none() {
                warn!(
                    path = %entry.path,
                    segment = %segment,
                    "Override replaces a non-object value with a nested document"
                );
            }
            target = target.ensure_document(segment);
        }
        target.insert_raw(last.to_string(), Value::String(entry.value.clone()));
        applied += 1;
    }
    applied
}
