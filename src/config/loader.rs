//! Settings loader with tier-based merging.
//!
//! Loads `settings.yaml` from each tier and merges them field by field.

use super::merge::deep_merge_all;
use super::types::{ExecutionMode, Settings};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name looked up in every tier directory.
pub const SETTINGS_FILE: &str = "settings.yaml";

/// Settings tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettingsTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// Project-level settings ($CWD/layered-prefs/)
    Project = 1,
    /// User-level settings (<config dir>/layered-prefs/)
    User = 2,
    /// Environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for SettingsTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsTier::Defaults => write!(f, "defaults"),
            SettingsTier::Project => write!(f, "project"),
            SettingsTier::User => write!(f, "user"),
            SettingsTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories for each settings tier.
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for SettingsPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl SettingsPaths {
    /// Discover tier directories from environment and platform defaults.
    pub fn discover() -> Self {
        // User dir: LAYERED_PREFS_USER_DIR or <config dir>/layered-prefs
        let user_dir = std::env::var("LAYERED_PREFS_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|c| c.join("layered-prefs")));

        // Project dir: LAYERED_PREFS_PROJECT_DIR or $CWD/layered-prefs
        let project_dir = std::env::var("LAYERED_PREFS_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("layered-prefs")));

        Self {
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }
}

/// Loads [`Settings`] from all tiers.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    pub paths: SettingsPaths,
    settings: Settings,
    /// Files that contributed, lowest tier first.
    loaded_files: Vec<(SettingsTier, PathBuf)>,
}

impl SettingsLoader {
    /// Load settings from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(SettingsPaths::discover())
    }

    /// Load settings with explicit tier directories.
    pub fn load_with_paths(paths: SettingsPaths) -> Result<Self> {
        // An explicit settings file replaces the file tiers
        if let Ok(explicit_path) = std::env::var("LAYERED_PREFS_SETTINGS_PATH") {
            let path = PathBuf::from(&explicit_path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading settings file {}", path.display()))?;
            let mut settings: Settings = serde_yaml::from_str(&content)
                .with_context(|| format!("parsing settings file {}", path.display()))?;
            apply_env_overrides(&mut settings, |name| std::env::var(name).ok());
            return Ok(Self {
                paths,
                settings,
                loaded_files: vec![(SettingsTier::Project, path)],
            });
        }

        let mut tiers: Vec<Value> = Vec::new();
        let mut loaded_files = Vec::new();

        // Tier 1: Defaults
        tiers.push(serde_json::to_value(Settings::default())?);

        // Tier 2: Project
        if let Some(ref project_dir) = paths.project_dir
            && let Some(value) = read_tier(&project_dir.join(SETTINGS_FILE))
        {
            tiers.push(value);
            loaded_files.push((SettingsTier::Project, project_dir.join(SETTINGS_FILE)));
        }

        // Tier 3: User
        if let Some(ref user_dir) = paths.user_dir
            && let Some(value) = read_tier(&user_dir.join(SETTINGS_FILE))
        {
            tiers.push(value);
            loaded_files.push((SettingsTier::User, user_dir.join(SETTINGS_FILE)));
        }

        let merged = deep_merge_all(tiers);
        let mut settings: Settings = serde_json::from_value(merged)?;

        // Tier 4: Environment variable overrides
        apply_env_overrides(&mut settings, |name| std::env::var(name).ok());

        Ok(Self {
            paths,
            settings,
            loaded_files,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Files that contributed to the settings, lowest tier first.
    pub fn loaded_files(&self) -> &[(SettingsTier, PathBuf)] {
        &self.loaded_files
    }
}

/// Read one tier file. Missing files are skipped silently, unreadable or
/// malformed ones with a warning.
fn read_tier(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable settings file");
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => {
            debug!(path = %path.display(), "Loaded settings tier");
            Some(value)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping malformed settings file");
            None
        }
    }
}

/// Apply `LAYERED_PREFS_*` variables, read through `lookup`.
pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(prefix) = lookup("LAYERED_PREFS_PREFIX")
        && !prefix.is_empty()
    {
        settings.prefix = prefix;
    }

    if let Some(mode) = lookup("LAYERED_PREFS_MODE") {
        match ExecutionMode::from_str(&mode) {
            Some(mode) => settings.mode = mode,
            None => warn!(value = %mode, "Ignoring unknown LAYERED_PREFS_MODE"),
        }
    }

    if let Some(insecure) = lookup("LAYERED_PREFS_INSECURE") {
        settings.insecure = matches!(insecure.to_lowercase().as_str(), "1" | "true" | "yes");
    }

    if let Some(asset) = lookup("LAYERED_PREFS_ASSET_PATH") {
        settings.paths.asset = PathBuf::from(asset);
    }

    if let Some(local) = lookup("LAYERED_PREFS_LOCAL_PATH") {
        settings.paths.local = Some(PathBuf::from(local));
    }

    if let Some(uri) = lookup("LAYERED_PREFS_REMOTE_URI") {
        settings.remote.uri = Some(uri);
    }

    if let Some(secret) = lookup("LAYERED_PREFS_SECRET") {
        settings.encryption.secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_settings_paths_discover() {
        let paths = SettingsPaths::discover();
        assert!(paths.project_dir.is_some());
    }

    #[test]
    fn test_load_defaults_only() {
        let temp = TempDir::new().unwrap();
        let paths = SettingsPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = SettingsLoader::load_with_paths(paths).unwrap();
        let settings = loader.settings();

        assert_eq!(settings.remote.timeout_secs, 10);
        assert_eq!(settings.mode, ExecutionMode::Production);
        assert!(loader.loaded_files().is_empty());
    }

    #[test]
    fn test_project_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("layered-prefs");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(
            project_dir.join(SETTINGS_FILE),
            "mode: development\nremote:\n  max_attempts: 7\n",
        )
        .unwrap();

        let paths = SettingsPaths::with_dirs(Some(project_dir), Some(temp.path().join("user")));
        let loader = SettingsLoader::load_with_paths(paths).unwrap();
        let settings = loader.settings();

        assert_eq!(settings.mode, ExecutionMode::Development);
        assert_eq!(settings.remote.max_attempts, 7);
        assert_eq!(settings.remote.timeout_secs, 10);
        assert_eq!(loader.loaded_files()[0].0, SettingsTier::Project);
    }

    #[test]
    fn test_user_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("layered-prefs");
        let user_dir = temp.path().join("user");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::create_dir_all(&user_dir).unwrap();

        std::fs::write(
            project_dir.join(SETTINGS_FILE),
            "prefix: Game\nremote:\n  max_attempts: 7\n  timeout_secs: 30\n",
        )
        .unwrap();
        std::fs::write(user_dir.join(SETTINGS_FILE), "remote:\n  max_attempts: 2\n").unwrap();

        let paths = SettingsPaths::with_dirs(Some(project_dir), Some(user_dir));
        let loader = SettingsLoader::load_with_paths(paths).unwrap();
        let settings = loader.settings();

        assert_eq!(settings.prefix, "Game");
        assert_eq!(settings.remote.max_attempts, 2);
        assert_eq!(settings.remote.timeout_secs, 30);
        assert_eq!(loader.loaded_files().len(), 2);
    }

    #[test]
    fn test_malformed_tier_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project_dir = temp.path().join("layered-prefs");
        std::fs::create_dir_all(&project_dir).unwrap();
        std::fs::write(project_dir.join(SETTINGS_FILE), "remote: [unclosed").unwrap();

        let paths = SettingsPaths::with_dirs(Some(project_dir), None);
        let loader = SettingsLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.settings(), &Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LAYERED_PREFS_MODE", "test"),
            ("LAYERED_PREFS_INSECURE", "yes"),
            ("LAYERED_PREFS_LOCAL_PATH", "/tmp/local.json"),
            ("LAYERED_PREFS_REMOTE_URI", "https://cdn.example/prefs.json"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(settings.mode, ExecutionMode::Test);
        assert!(settings.insecure);
        assert_eq!(settings.paths.local_path(), PathBuf::from("/tmp/local.json"));
        assert_eq!(
            settings.remote.uri.as_deref(),
            Some("https://cdn.example/prefs.json")
        );
        assert_eq!(settings.prefix, "Preferences");
    }

    #[test]
    fn test_unknown_env_mode_ignored() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |name| {
            (name == "LAYERED_PREFS_MODE").then(|| "staging".to_string())
        });
        assert_eq!(settings.mode, ExecutionMode::Production);
    }
}
