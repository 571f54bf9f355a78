//! `${Preferences.path}` reference substitution.
//!
//! [`eval`] replaces every reference in a string with the referenced value,
//! chasing references inside the replacement until nothing is left to
//! resolve. It always returns a string. References that cannot be resolved
//! stay in the output followed by a [`Marker`]:
//!
//! - `(Unknown)`: the path does not exist or holds an empty string
//! - `(Nested)`: the path itself contains `${`
//! - `(Recursive)`: the path is already being expanded further up
//!
//! Cycle tracking is per expansion chain. A path is "in progress" only while
//! its own value is being expanded, so two sibling references to the same
//! path both resolve, while a path that re-enters itself at any depth is cut.

use crate::document::{Document, Value};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Namespace every reference starts with.
pub const REFERENCE_NAMESPACE: &str = "Preferences";

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{Preferences\.([^}]*)\}").expect("reference pattern is valid")
});

/// Inline marker appended to a reference that was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Unknown,
    Nested,
    Recursive,
}

impl Marker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Unknown => "(Unknown)",
            Marker::Nested => "(Nested)",
            Marker::Recursive => "(Recursive)",
        }
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the reference token for `path`.
pub fn reference(path: &str) -> String {
    format!("${{{}.{}}}", REFERENCE_NAMESPACE, path)
}

/// Evaluate every reference in `input` against `doc`.
pub fn eval(input: &str, doc: &Document) -> String {
    let mut in_progress = HashSet::new();
    expand(input, doc, &mut in_progress)
}

/// True if `input` contains at least one reference.
pub fn has_references(input: &str) -> bool {
    REFERENCE.is_match(input)
}

fn expand(input: &str, doc: &Document, in_progress: &mut HashSet<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for caps in REFERENCE.captures_iter(input) {
        let Some(token) = caps.get(0) else {
            continue;
        };
        let path = caps.get(1).map_or("", |m| m.as_str());

        out.push_str(&input[last..token.start()]);
        out.push_str(&resolve(token.as_str(), path, doc, in_progress));
        last = token.end();
    }

    out.push_str(&input[last..]);
    out
}

fn resolve(token: &str, path: &str, doc: &Document, in_progress: &mut HashSet<String>) -> String {
    if path.contains("${") {
        return marked(token, Marker::Nested);
    }
    if in_progress.contains(path) {
        return marked(token, Marker::Recursive);
    }

    let text = match doc.lookup(path).map(value_text) {
        Some(text) if !text.is_empty() => text,
        _ => return marked(token, Marker::Unknown),
    };

    in_progress.insert(path.to_string());
    let expanded = expand(&text, doc, in_progress);
    in_progress.remove(path);
    expanded
}

fn value_text(value: &Value) -> String {
    value
        .as_text()
        .unwrap_or_else(|| value.to_json(false).to_string())
}

fn marked(token: &str, marker: Marker) -> String {
    format!("{}{}", token, marker)
}
