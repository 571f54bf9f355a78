//! Engine settings.
//!
//! Settings are merged field by field from four tiers:
//! 1. **Defaults** - built into the binary
//! 2. **Project** - `$CWD/layered-prefs/settings.yaml`
//! 3. **User** - `<config dir>/layered-prefs/settings.yaml`
//! 4. **Environment** - `LAYERED_PREFS_*` variables
//!
//! ## Environment Variables
//! - `LAYERED_PREFS_SETTINGS_PATH` - Explicit settings file (replaces tiers 2 and 3)
//! - `LAYERED_PREFS_PROJECT_DIR` - Project settings dir (default: `./layered-prefs`)
//! - `LAYERED_PREFS_USER_DIR` - User settings dir
//! - `LAYERED_PREFS_PREFIX` - Reserved override prefix
//! - `LAYERED_PREFS_MODE` - `production`, `development`, `test` or `editor`
//! - `LAYERED_PREFS_INSECURE` - Accept overrides for read-only sources
//! - `LAYERED_PREFS_ASSET_PATH` - Asset preferences file
//! - `LAYERED_PREFS_LOCAL_PATH` - Local preferences file
//! - `LAYERED_PREFS_REMOTE_URI` - Remote preferences URI
//! - `LAYERED_PREFS_SECRET` - Encryption secret

mod loader;
mod merge;
mod types;

pub use loader::{SETTINGS_FILE, SettingsLoader, SettingsPaths, SettingsTier, apply_env_overrides};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
