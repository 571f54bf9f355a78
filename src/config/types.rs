//! Settings that control the preference engine itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Reserved prefix for command-line overrides (`--<prefix>.path=value`).
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Execution mode; decides source policies.
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Accept overrides for read-only sources even in production.
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub paths: PathsSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub encryption: EncryptionSettings,

    #[serde(default)]
    pub save: SaveSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            mode: ExecutionMode::default(),
            insecure: false,
            paths: PathsSettings::default(),
            remote: RemoteSettings::default(),
            encryption: EncryptionSettings::default(),
            save: SaveSettings::default(),
        }
    }
}

fn default_prefix() -> String {
    crate::overrides::DEFAULT_PREFIX.to_string()
}

/// How the process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Shipped application (default). Everything encrypted, overrides of
    /// read-only sources refused unless `insecure` is set.
    #[default]
    Production,
    /// Running interactively on a developer machine.
    Development,
    /// Automated tests.
    Test,
    /// Authoring packaged preferences; the asset source is writable.
    Editor,
}

impl ExecutionMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Some(ExecutionMode::Production),
            "development" | "dev" => Some(ExecutionMode::Development),
            "test" => Some(ExecutionMode::Test),
            "editor" => Some(ExecutionMode::Editor),
            _ => None,
        }
    }

    /// A live application session: the local source auto-saves.
    pub fn is_interactive(&self) -> bool {
        matches!(self, ExecutionMode::Production | ExecutionMode::Development)
    }

    /// Authoring context: asset preferences are edited, not layered.
    pub fn is_authoring(&self) -> bool {
        *self == ExecutionMode::Editor
    }

    /// Whether read-only sources may receive command-line overrides.
    pub fn trusts_overrides(&self, insecure: bool) -> bool {
        insecure || *self != ExecutionMode::Production
    }

    /// Whether the local source is encrypted at rest.
    pub fn encrypts_local(&self) -> bool {
        *self == ExecutionMode::Production
    }

    /// Whether the asset source is encrypted at rest.
    pub fn encrypts_asset(&self) -> bool {
        !self.is_authoring()
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Production => write!(f, "production"),
            ExecutionMode::Development => write!(f, "development"),
            ExecutionMode::Test => write!(f, "test"),
            ExecutionMode::Editor => write!(f, "editor"),
        }
    }
}

/// Backing file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsSettings {
    /// Packaged asset preferences.
    #[serde(default = "default_asset_path")]
    pub asset: PathBuf,

    /// Per-device local preferences. Defaults to the platform local data dir.
    #[serde(default)]
    pub local: Option<PathBuf>,
}

impl Default for PathsSettings {
    fn default() -> Self {
        Self {
            asset: default_asset_path(),
            local: None,
        }
    }
}

impl PathsSettings {
    /// Effective local path.
    pub fn local_path(&self) -> PathBuf {
        self.local.clone().unwrap_or_else(default_local_path)
    }
}

fn default_asset_path() -> PathBuf {
    PathBuf::from("assets/preferences.json")
}

fn default_local_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("layered-prefs")
        .join("preferences.json")
}

/// Remote source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSettings {
    #[serde(default)]
    pub uri: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts before the built-in retry policy gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles per attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            uri: None,
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

/// Encryption at rest.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    /// Secret the AES key is derived from.
    #[serde(default = "default_secret")]
    pub secret: String,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

impl std::fmt::Debug for EncryptionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionSettings")
            .field("secret", &"***")
            .finish()
    }
}

fn default_secret() -> String {
    "layered-prefs".to_string()
}

/// Output format used by `save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSettings {
    #[serde(default = "default_true")]
    pub pretty: bool,

    #[serde(default = "default_true")]
    pub sort: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            pretty: true,
            sort: true,
        }
    }
}

fn default_true() -> bool {
    true
}
