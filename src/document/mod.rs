//! Ordered key/value preference documents.
//!
//! A [`Document`] maps string keys to [`Value`]s in insertion order. Nested
//! documents inherit the writable flag of their parent. Mutations through
//! [`Document::set`] and [`Document::unset`] are refused on read-only
//! documents and mark the document dirty only when something changed.

mod convert;
mod value;

pub use convert::FromValue;
pub use value::{Value, ValueKind};

use crate::error::{PrefsError, PrefsResult};
use crate::eval;
use std::collections::HashMap;

/// Keys with this suffix are never passed through the evaluator.
pub const CONST_SUFFIX: &str = "@Const";

/// Keys with this suffix only exist for authoring and are stripped before
/// a document is published.
pub const EDITOR_SUFFIX: &str = "@Editor";

/// Ordered mapping from keys to preference values.
#[derive(Debug, Clone)]
pub struct Document {
    keys: Vec<String>,
    values: HashMap<String, Value>,
    location: String,
    writable: bool,
    dirty: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Document {
    /// Structural equality: same location, same keys, pairwise-equal values.
    /// Key order, dirty and writable flags are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .all(|(key, value)| other.values.get(key) == Some(value))
    }
}

impl Document {
    /// Create an empty, writable document with no location.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: HashMap::new(),
            location: String::new(),
            writable: true,
            dirty: false,
        }
    }

    /// Create an empty document that refuses mutation.
    pub fn read_only() -> Self {
        Self {
            writable: false,
            ..Self::new()
        }
    }

    /// Parse a JSON object into a writable document.
    pub fn parse(text: &str) -> PrefsResult<Self> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(PrefsError::malformed)?;
        Self::from_json(&json)
    }

    /// Convert a JSON object. `null` members are dropped.
    pub fn from_json(json: &serde_json::Value) -> PrefsResult<Self> {
        match json {
            serde_json::Value::Object(map) => Self::from_json_map(map),
            other => Err(PrefsError::malformed(format!(
                "root must be a JSON object, found {}",
                json_kind(other)
            ))),
        }
    }

    pub(crate) fn from_json_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> PrefsResult<Self> {
        let mut doc = Self::new();
        for (key, json) in map {
            if let Some(value) = Value::from_json(json)
                .map_err(|e| e.with_details(format!("at key '{}'", key)))?
            {
                doc.insert_raw(key.clone(), value);
            }
        }
        Ok(doc)
    }

    /// Convert to JSON, optionally sorting keys lexicographically at every level.
    pub fn to_json(&self, sort: bool) -> serde_json::Value {
        let mut keys: Vec<&String> = self.keys.iter().collect();
        if sort {
            keys.sort();
        }

        let mut map = serde_json::Map::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.values.get(key) {
                map.insert(key.clone(), value.to_json(sort));
            }
        }
        serde_json::Value::Object(map)
    }

    /// Serialize to JSON text.
    pub fn encode(&self, pretty: bool, sort: bool) -> PrefsResult<String> {
        let json = self.to_json(sort);
        let text = if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        text.map_err(PrefsError::internal)
    }

    // Flags

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.location = location.into();
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Change the writable flag of this document and every nested document.
    pub(crate) fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
        for value in self.values.values_mut() {
            if let Value::Object(doc) = value {
                doc.set_writable(writable);
            }
        }
    }

    /// True if this document or any nested document has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
            || self.values.values().any(|value| match value {
                Value::Object(doc) => doc.is_dirty(),
                _ => false,
            })
    }

    /// Clear the dirty flag here and in every nested document.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
        for value in self.values.values_mut() {
            if let Value::Object(doc) = value {
                doc.mark_clean();
            }
        }
    }

    // Reads

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.keys
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| (key.as_str(), value)))
    }

    /// True iff `key` is a direct member of this document.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed read. Absent keys and values that do not convert yield `default`.
    pub fn get<T: FromValue>(&self, key: &str, default: T) -> T {
        self.values
            .get(key)
            .and_then(T::from_value)
            .unwrap_or(default)
    }

    /// Read a string, or `None` when absent or not representable as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(Value::as_text)
    }

    /// Nested document stored under `key`. Scalars yield `None`.
    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.values.get(key).and_then(Value::as_document)
    }

    pub fn get_document_mut(&mut self, key: &str) -> Option<&mut Document> {
        match self.values.get_mut(key) {
            Some(Value::Object(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Typed array read. The value must be an array whose every element
    /// converts under the scalar rules; otherwise `default` is returned.
    pub fn get_array<T: FromValue>(&self, key: &str, default: Vec<T>) -> Vec<T> {
        match self.values.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(T::from_value)
                .collect::<Option<Vec<T>>>()
                .unwrap_or(default),
            _ => default,
        }
    }

    /// Walk a dot-separated path through nested documents.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.values.get(first)?;
        for segment in segments {
            current = current.as_document()?.values.get(segment)?;
        }
        Some(current)
    }

    // Writes

    /// Store `value` under `key`.
    ///
    /// Returns false without touching the document when it is read-only,
    /// when the value is unsupported, or when it equals the stored value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if !self.writable {
            return false;
        }

        let mut value = value.into();
        if !value.is_supported() {
            return false;
        }
        if let Value::Object(doc) = &mut value {
            doc.location.clear();
            doc.set_writable(true);
        }
        if self.values.get(key) == Some(&value) {
            return false;
        }

        self.insert_raw(key.to_string(), value);
        self.dirty = true;
        true
    }

    /// [`Document::set`] for untyped JSON input. `null` is unsupported.
    pub fn set_json(&mut self, key: &str, json: &serde_json::Value) -> bool {
        match Value::from_json(json) {
            Ok(Some(value)) => self.set(key, value),
            Ok(None) | Err(_) => false,
        }
    }

    /// [`Document::set`] through a dot-separated path. Missing intermediate
    /// documents are created; a scalar in the way is replaced.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> bool {
        if !self.writable {
            return false;
        }
        let Some((parents, last)) = path.rsplit_once('.') else {
            return self.set(path, value);
        };

        let mut target = self;
        for segment in parents.split('.') {
            if segment.is_empty() {
                return false;
            }
            if target.get_document(segment).is_none() {
                target.set(segment, Document::new());
            }
            target = match target.get_document_mut(segment) {
                Some(doc) => doc,
                None => return false,
            };
        }
        !last.is_empty() && target.set(last, value)
    }

    /// Remove `key`. Returns false when read-only or absent.
    pub fn unset(&mut self, key: &str) -> bool {
        if !self.writable {
            return false;
        }
        if self.values.remove(key).is_none() {
            return false;
        }
        self.keys.retain(|k| k != key);
        self.dirty = true;
        true
    }

    /// Deep-merge `other` into this document: nested documents merge key by
    /// key, everything else is replaced. Returns whether anything changed.
    pub fn merge_from(&mut self, other: &Document) -> bool {
        if !self.writable {
            return false;
        }

        let mut changed = false;
        for (key, value) in other.iter() {
            if let Value::Object(overlay) = value
                && let Some(base) = self.get_document_mut(key)
            {
                changed |= base.merge_from(overlay);
                continue;
            }
            changed |= self.set(key, value.clone());
        }
        changed
    }

    /// Rewrite every string value through the evaluator, resolving
    /// references against this document as it was before the call.
    ///
    /// Keys ending in [`CONST_SUFFIX`] are left untouched. This is a
    /// publishing transform: it ignores the writable flag and leaves the
    /// dirty flag alone. Returns the number of rewritten values.
    pub fn evaluate_in_place(&mut self) -> usize {
        let root = self.clone();
        self.evaluate_against(&root)
    }

    fn evaluate_against(&mut self, root: &Document) -> usize {
        let mut rewritten = 0;
        for (key, value) in self.values.iter_mut() {
            if key.ends_with(CONST_SUFFIX) {
                continue;
            }
            match value {
                Value::String(s) => {
                    let evaluated = eval::eval(s, root);
                    if evaluated != *s {
                        *s = evaluated;
                        rewritten += 1;
                    }
                }
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        if let Value::String(s) = item {
                            let evaluated = eval::eval(s, root);
                            if evaluated != *s {
                                *s = evaluated;
                                rewritten += 1;
                            }
                        }
                    }
                }
                Value::Object(doc) => rewritten += doc.evaluate_against(root),
                _ => {}
            }
        }
        rewritten
    }

    /// Remove every key ending in [`EDITOR_SUFFIX`], recursively.
    /// Returns the number of removed keys.
    pub fn strip_editor_keys(&mut self) -> usize {
        let before = self.keys.len();
        self.keys.retain(|key| !key.ends_with(EDITOR_SUFFIX));
        self.values.retain(|key, _| !key.ends_with(EDITOR_SUFFIX));
        let mut removed = before - self.keys.len();

        for value in self.values.values_mut() {
            if let Value::Object(doc) = value {
                removed += doc.strip_editor_keys();
            }
        }
        removed
    }

    /// Evaluate `${Preferences.path}` references in `input` against this document.
    pub fn eval(&self, input: &str) -> String {
        eval::eval(input, self)
    }

    // Crate-internal mutation that bypasses the writable flag (loading and
    // command-line overrides).

    pub(crate) fn insert_raw(&mut self, key: String, mut value: Value) {
        if let Value::Object(doc) = &mut value {
            doc.set_writable(self.writable);
        }
        if !self.values.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.values.insert(key, value);
    }

    /// Nested document under `key`, replacing any non-document value.
    pub(crate) fn ensure_document(&mut self, key: &str) -> &mut Document {
        let replace = !matches!(self.values.get(key), Some(Value::Object(_)));
        if replace {
            let mut child = Document::new();
            child.writable = self.writable;
            self.insert_raw(key.to_string(), Value::Object(child));
        }
        match self.values.get_mut(key) {
            Some(Value::Object(doc)) => doc,
            _ => unreachable!("document inserted above"),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
        self.dirty = false;
    }

    /// Replace the content with `other`, keeping location and writable flag.
    pub(crate) fn replace_content(&mut self, other: Document) {
        self.keys = other.keys;
        self.values = other.values;
        let writable = self.writable;
        self.set_writable(writable);
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
