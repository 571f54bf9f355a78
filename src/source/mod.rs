//! Preference sources.
//!
//! A [`Source`] binds a [`Document`] to a backing location and a policy:
//! whether it may be mutated and saved, and whether it is encrypted at rest.
//! There are three kinds:
//!
//! - **Asset** - packaged preferences, read-only outside authoring
//! - **Local** - per-device preferences, always writable
//! - **Remote** - fetched over the network, never writable
//!
//! Loading moves a source through `Uninitialized -> Loading -> Loaded | Failed`.
//! Load failures never escape as errors: they are recorded on the source
//! and reported through the boolean result of [`Source::read`].

pub mod persist;

use crate::config::ExecutionMode;
use crate::crypto::Cipher;
use crate::document::{Document, FromValue, Value};
use crate::error::{PrefsError, PrefsResult};
use crate::logging::Logger;
use crate::overrides::{self, OverrideEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// The three source variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Asset,
    Local,
    Remote,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Asset => write!(f, "asset"),
            SourceKind::Local => write!(f, "local"),
            SourceKind::Remote => write!(f, "remote"),
        }
    }
}

/// Load state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Uninitialized,
    Loading,
    Loaded,
    Failed,
}

/// Writable and encrypted-at-rest flags of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePolicy {
    pub writable: bool,
    pub encrypted: bool,
}

impl SourcePolicy {
    /// Policy of `kind` when running in `mode`.
    pub fn for_kind(kind: SourceKind, mode: ExecutionMode) -> Self {
        match kind {
            SourceKind::Asset => Self {
                writable: mode.is_authoring(),
                encrypted: mode.encrypts_asset(),
            },
            SourceKind::Local => Self {
                writable: true,
                encrypted: mode.encrypts_local(),
            },
            SourceKind::Remote => Self {
                writable: false,
                encrypted: false,
            },
        }
    }
}

/// Snapshot of a source for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub state: SourceState,
    pub location: String,
    pub writable: bool,
    pub encrypted: bool,
    pub dirty: bool,
    pub keys: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

/// A policy-tagged document bound to a backing location.
#[derive(Debug)]
pub struct Source {
    kind: SourceKind,
    document: Document,
    writable: bool,
    cipher: Option<Cipher>,
    state: SourceState,
    error: Option<PrefsError>,
    overrides: Vec<OverrideEntry>,
    loaded_at: Option<DateTime<Utc>>,
    logger: Logger,
}

impl Source {
    /// Create an unloaded plaintext source. Local sources are writable,
    /// Asset and Remote sources are read-only.
    pub fn new(kind: SourceKind, location: impl Into<String>) -> Self {
        let writable = kind == SourceKind::Local;
        let mut document = if writable {
            Document::new()
        } else {
            Document::read_only()
        };
        document.set_location(location);

        Self {
            kind,
            document,
            writable,
            cipher: None,
            state: SourceState::Uninitialized,
            error: None,
            overrides: Vec::new(),
            loaded_at: None,
            logger: Logger::new().with_name(kind.to_string()),
        }
    }

    /// Override the writable flag. Remote sources stay read-only.
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable && self.kind != SourceKind::Remote;
        self.document.set_writable(self.writable);
        self
    }

    /// Encrypt the backing file with `cipher`.
    pub fn encrypted(mut self, cipher: Cipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Command-line overrides applied at the end of every parse.
    pub fn with_overrides(mut self, overrides: Vec<OverrideEntry>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    // Policy and state

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == SourceState::Loaded
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.document.is_dirty()
    }

    pub fn location(&self) -> &str {
        self.document.location()
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.document.set_location(location);
    }

    /// Error recorded by the last failed load.
    pub fn error(&self) -> Option<&PrefsError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn overrides(&self) -> &[OverrideEntry] {
        &self.overrides
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            kind: self.kind,
            state: self.state,
            location: self.location().to_string(),
            writable: self.writable,
            encrypted: self.is_encrypted(),
            dirty: self.is_dirty(),
            keys: self.document.len(),
            error: self.error_message().map(String::from),
            loaded_at: self.loaded_at,
        }
    }

    // Loading

    /// Load from `location`, which also becomes the backing location.
    pub fn read(&mut self, location: impl Into<String>) -> bool {
        self.document.set_location(location);
        self.begin_load();
        let result = self.load_file();
        self.finish_load(result)
    }

    /// Load again from the current backing location.
    pub fn reload(&mut self) -> bool {
        let location = self.location().to_string();
        self.read(location)
    }

    /// Load from plaintext JSON already in memory.
    pub fn parse(&mut self, text: &str) -> bool {
        self.begin_load();
        let result = Document::parse(text);
        self.finish_load(result)
    }

    fn begin_load(&mut self) {
        self.state = SourceState::Loading;
        self.error = None;
        self.document.clear();
    }

    fn load_file(&self) -> PrefsResult<Document> {
        let location = self.location();
        if location.is_empty() {
            return Err(PrefsError::missing_location(&format!("{} source", self.kind)));
        }

        let bytes = persist::read_bytes(Path::new(location))?;
        let plaintext = match &self.cipher {
            Some(cipher) => {
                let encoded = String::from_utf8(bytes).map_err(PrefsError::decryption)?;
                cipher.decrypt(&encoded)?
            }
            None => bytes,
        };
        let text = String::from_utf8(plaintext).map_err(PrefsError::malformed)?;

        Document::parse(&text).map_err(|e| e.with_location(location))
    }

    fn finish_load(&mut self, result: PrefsResult<Document>) -> bool {
        match result {
            Ok(doc) => {
                self.document.replace_content(doc);
                let applied = overrides::apply(&mut self.document, &self.overrides);
                if applied > 0 {
                    self.logger
                        .debug(&format!("Applied {} command-line override(s)", applied));
                }
                self.document.mark_clean();
                self.state = SourceState::Loaded;
                self.loaded_at = Some(Utc::now());
                true
            }
            Err(err) => {
                self.document.clear();
                self.logger.error(&format!(
                    "Failed to load {} preferences: {}",
                    self.kind, err
                ));
                self.error = Some(err);
                self.state = SourceState::Failed;
                false
            }
        }
    }

    // Saving

    /// Save to the backing location. Failures are logged and return false.
    pub fn save(&mut self, pretty: bool, sort: bool) -> bool {
        match self.try_save(pretty, sort) {
            Ok(()) => true,
            Err(err) => {
                self.logger
                    .error(&format!("Failed to save {} preferences: {}", self.kind, err));
                false
            }
        }
    }

    /// Save to the backing location, returning the reason on failure.
    pub fn try_save(&mut self, pretty: bool, sort: bool) -> PrefsResult<()> {
        if !self.writable {
            return Err(PrefsError::read_only(&format!("{} source", self.kind)));
        }
        let location = self.location().to_string();
        if location.is_empty() {
            return Err(PrefsError::missing_location(&format!("{} source", self.kind)));
        }

        let text = self.document.encode(pretty, sort)?;
        let payload = match &self.cipher {
            Some(cipher) => cipher.encrypt(text.as_bytes())?,
            None => text,
        };
        persist::write_atomic(Path::new(&location), payload.as_bytes())?;

        self.document.mark_clean();
        self.logger.notice(&format!("Saved {} preferences to {}", self.kind, location));
        Ok(())
    }

    // Reads

    pub fn has(&self, key: &str) -> bool {
        self.document.has(key)
    }

    pub fn get<T: FromValue>(&self, key: &str, default: T) -> T {
        self.document.get(key, default)
    }

    pub fn get_array<T: FromValue>(&self, key: &str, default: Vec<T>) -> Vec<T> {
        self.document.get_array(key, default)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.document.get_string(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.document.get_value(key)
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.document.get_document(key)
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.document.lookup(path)
    }

    /// Evaluate references in `input` against this source's document.
    pub fn eval(&self, input: &str) -> String {
        self.document.eval(input)
    }

    // Writes

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if !self.check_writable(key) {
            return false;
        }
        self.document.set(key, value)
    }

    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> bool {
        if !self.check_writable(path) {
            return false;
        }
        self.document.set_path(path, value)
    }

    pub fn set_json(&mut self, key: &str, json: &serde_json::Value) -> bool {
        if !self.check_writable(key) {
            return false;
        }
        self.document.set_json(key, json)
    }

    pub fn unset(&mut self, key: &str) -> bool {
        if !self.check_writable(key) {
            return false;
        }
        self.document.unset(key)
    }

    /// Mutable nested document. `None` for read-only sources.
    pub fn get_document_mut(&mut self, key: &str) -> Option<&mut Document> {
        if !self.check_writable(key) {
            return None;
        }
        self.document.get_document_mut(key)
    }

    pub fn merge_from(&mut self, other: &Document) -> bool {
        if !self.check_writable("<merge>") {
            return false;
        }
        self.document.merge_from(other)
    }

    fn check_writable(&self, key: &str) -> bool {
        if !self.writable {
            self.logger.warning(&format!(
                "Refusing to modify '{}': {} source is read-only",
                key, self.kind
            ));
        }
        self.writable
    }
}
