//! Process-wide preference context.
//!
//! [`PrefsContext`] owns the Asset, Local and Remote sources. Each is created
//! and loaded on first access with the policy of the current
//! [`ExecutionMode`] and the command-line overrides that apply to it.
//! Construct one at start-up and pass it to whatever needs preferences.

use crate::config::{ExecutionMode, Settings};
use crate::crypto::Cipher;
use crate::document::FromValue;
use crate::error::{PrefsError, PrefsResult};
use crate::logging::Logger;
use crate::overrides::{Overrides, StartupArgs};
use crate::remote::{self, FetchHooks};
use crate::resolver::Resolver;
use crate::source::{Source, SourceKind, SourcePolicy, SourceStatus};
use std::sync::OnceLock;
use std::path::Path;

/// Layering used when the caller does not name one: local edits win over
/// remote content, which wins over packaged defaults.
pub const DEFAULT_LAYERS: [SourceKind; 3] =
    [SourceKind::Local, SourceKind::Remote, SourceKind::Asset];

/// Builds and loads sources. Kept apart from the source cells so a cell can
/// be initialized while the factory is borrowed.
#[derive(Debug)]
struct SourceFactory {
    settings: Settings,
    overrides: Overrides,
    cipher: Cipher,
    logger: Logger,
}

impl SourceFactory {
    fn policy(&self, kind: SourceKind) -> SourcePolicy {
        SourcePolicy::for_kind(kind, self.settings.mode)
    }

    /// Backing location. A scoped argument may replace it for Asset and
    /// Local; the Remote URI only comes from settings.
    fn location(&self, kind: SourceKind) -> String {
        let configured = || match kind {
            SourceKind::Asset => self.settings.paths.asset.to_string_lossy().into_owned(),
            SourceKind::Local => self.settings.paths.local_path().to_string_lossy().into_owned(),
            SourceKind::Remote => self.settings.remote.uri.clone().unwrap_or_default(),
        };
        match kind {
            SourceKind::Asset | SourceKind::Local => self
                .overrides
                .location_for(kind)
                .map(String::from)
                .unwrap_or_else(configured),
            SourceKind::Remote => configured(),
        }
    }

    fn build(&self, kind: SourceKind) -> Source {
        let policy = self.policy(kind);
        let mut source = Source::new(kind, self.location(kind))
            .writable(policy.writable)
            .with_logger(self.logger.clone().with_name(kind.to_string()));
        if policy.encrypted {
            source = source.encrypted(self.cipher.clone());
        }

        let trusted = policy.writable || self.settings.mode.trusts_overrides(self.settings.insecure);
        let entries = self.overrides.for_source(kind);
        if trusted {
            source = source.with_overrides(entries);
        } else if !entries.is_empty() {
            self.logger.warning(&format!(
                "Ignoring {} override(s) for read-only {} source in {} mode",
                entries.len(),
                kind,
                self.settings.mode
            ));
        }
        source
    }

    fn load(&self, kind: SourceKind) -> Source {
        let mut source = self.build(kind);
        match kind {
            SourceKind::Asset => {
                let location = source.location().to_string();
                source.read(location);
            }
            SourceKind::Local => {
                let location = source.location().to_string();
                if Path::new(&location).exists() {
                    source.read(location);
                } else {
                    // First run: start empty so overrides still land.
                    self.logger
                        .notice(&format!("No local preferences at {}, starting empty", location));
                    source.parse("{}");
                }
            }
            // Populated by fetch
            SourceKind::Remote => {}
        }
        source
    }
}

fn cell_mut(cell: &mut OnceLock<Source>, init: impl FnOnce() -> Source) -> &mut Source {
    if cell.get().is_none() {
        *cell = OnceLock::from(init());
    }
    match cell.get_mut() {
        Some(source) => source,
        None => unreachable!("source initialized above"),
    }
}

/// Owner of the three sources.
#[derive(Debug)]
pub struct PrefsContext {
    factory: SourceFactory,
    asset: OnceLock<Source>,
    local: OnceLock<Source>,
    remote: OnceLock<Source>,
    client: Option<reqwest::Client>,
    autosave: bool,
}

impl PrefsContext {
    /// Create a context. No source is touched until first accessed.
    pub fn new(settings: Settings, args: &StartupArgs) -> Self {
        let overrides = Overrides::parse(args, &settings.prefix);
        let cipher = Cipher::from_secret(&settings.encryption.secret);
        Self {
            factory: SourceFactory {
                settings,
                overrides,
                cipher,
                logger: Logger::new(),
            },
            asset: OnceLock::new(),
            local: OnceLock::new(),
            remote: OnceLock::new(),
            client: None,
            autosave: true,
        }
    }

    /// Logger handed to every source created from now on.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.factory.logger = logger;
        self
    }

    /// HTTP client for [`PrefsContext::fetch_remote`].
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Save a dirty Local source when the context is dropped. On by default.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.factory.settings
    }

    pub fn mode(&self) -> ExecutionMode {
        self.factory.settings.mode
    }

    pub fn overrides(&self) -> &Overrides {
        &self.factory.overrides
    }

    // Sources

    pub fn asset(&self) -> &Source {
        self.asset.get_or_init(|| self.factory.load(SourceKind::Asset))
    }

    pub fn local(&self) -> &Source {
        self.local.get_or_init(|| self.factory.load(SourceKind::Local))
    }

    pub fn remote(&self) -> &Source {
        self.remote.get_or_init(|| self.factory.load(SourceKind::Remote))
    }

    pub fn asset_mut(&mut self) -> &mut Source {
        let factory = &self.factory;
        cell_mut(&mut self.asset, || factory.load(SourceKind::Asset))
    }

    pub fn local_mut(&mut self) -> &mut Source {
        let factory = &self.factory;
        cell_mut(&mut self.local, || factory.load(SourceKind::Local))
    }

    pub fn remote_mut(&mut self) -> &mut Source {
        let factory = &self.factory;
        cell_mut(&mut self.remote, || factory.load(SourceKind::Remote))
    }

    pub fn source(&self, kind: SourceKind) -> &Source {
        match kind {
            SourceKind::Asset => self.asset(),
            SourceKind::Local => self.local(),
            SourceKind::Remote => self.remote(),
        }
    }

    pub fn source_mut(&mut self, kind: SourceKind) -> &mut Source {
        match kind {
            SourceKind::Asset => self.asset_mut(),
            SourceKind::Local => self.local_mut(),
            SourceKind::Remote => self.remote_mut(),
        }
    }

    /// Sources for `kinds`, in the given order.
    pub fn sources(&self, kinds: &[SourceKind]) -> Vec<&Source> {
        kinds.iter().map(|kind| self.source(*kind)).collect()
    }

    /// Status of every source that has been created.
    pub fn status(&self) -> Vec<SourceStatus> {
        [&self.asset, &self.local, &self.remote]
            .into_iter()
            .filter_map(|cell| cell.get().map(Source::status))
            .collect()
    }

    // Resolution

    /// Resolver over this context's Asset source. Asset-only when the mode
    /// is not interactive.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.asset()).asset_only(!self.mode().is_interactive())
    }

    /// Resolve `key` across `layers`, highest priority first. An empty list
    /// queries the Asset source.
    pub fn get<T: FromValue>(&self, key: &str, default: T, layers: &[SourceKind]) -> T {
        self.resolver().get(key, default, &self.sources(layers))
    }

    pub fn get_string(&self, key: &str, layers: &[SourceKind]) -> Option<String> {
        self.resolver().get_string(key, &self.sources(layers))
    }

    pub fn has_key(&self, key: &str, layers: &[SourceKind]) -> bool {
        self.resolver().has_key(key, &self.sources(layers))
    }

    /// Evaluate references in `input` against the effective view of `layers`.
    pub fn eval(&self, input: &str, layers: &[SourceKind]) -> String {
        self.resolver().effective(&self.sources(layers)).eval(input)
    }

    // Lifecycle

    /// Save the Local source if it is loaded, dirty and the mode is
    /// interactive. Returns whether a save happened.
    pub fn checkpoint(&mut self) -> bool {
        if !self.mode().is_interactive() {
            return false;
        }
        let save = self.factory.settings.save;
        match self.local.get_mut() {
            Some(local) if local.is_dirty() => local.save(save.pretty, save.sort),
            _ => false,
        }
    }

    /// Run the fetch protocol against the configured remote URI.
    pub async fn fetch_remote<H>(&mut self, hooks: &mut H) -> PrefsResult<()>
    where
        H: FetchHooks + ?Sized,
    {
        let uri = self.factory.location(SourceKind::Remote);

        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let client = reqwest::Client::builder()
                    .build()
                    .map_err(|e| PrefsError::internal(format!("building HTTP client: {}", e)))?;
                self.client = Some(client.clone());
                client
            }
        };

        remote::fetch(self.remote_mut(), &uri, &client, hooks).await
    }
}

impl Drop for PrefsContext {
    fn drop(&mut self) {
        if self.autosave {
            self.checkpoint();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceState;
    use tempfile::TempDir;

    fn settings(temp: &TempDir, mode: ExecutionMode) -> Settings {
        let mut settings = Settings::default();
        settings.mode = mode;
        settings.paths.asset = temp.path().join("asset.json");
        settings.paths.local = Some(temp.path().join("local.json"));
        settings
    }

    fn argv(tokens: &[&str]) -> StartupArgs {
        StartupArgs::from_argv(tokens.iter().copied())
    }

    #[test]
    fn test_missing_local_starts_empty_with_overrides() {
        let temp = TempDir::new().unwrap();
        let ctx = PrefsContext::new(
            settings(&temp, ExecutionMode::Development),
            &argv(&["--Preferences@Local.user.age=30"]),
        )
        .with_autosave(false);

        let local = ctx.local();
        assert_eq!(local.state(), SourceState::Loaded);
        assert!(!local.is_encrypted());
        assert_eq!(
            local.get_document("user").unwrap().get_string("age").as_deref(),
            Some("30")
        );
    }

    #[test]
    fn test_asset_overrides_need_trust() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("asset.json"), r#"{"k": "file"}"#).unwrap();
        let args = argv(&["--Preferences@Asset.k=cli"]);

        let editor = settings(&temp, ExecutionMode::Editor);
        let ctx = PrefsContext::new(editor, &args).with_autosave(false);
        assert_eq!(ctx.asset().get_string("k").as_deref(), Some("cli"));

        let mut prod = settings(&temp, ExecutionMode::Production);
        prod.paths.asset = temp.path().join("missing.json");
        let ctx = PrefsContext::new(prod, &args).with_autosave(false);
        assert!(ctx.asset().overrides().is_empty());
    }

    #[test]
    fn test_resolution_prefers_local() {
        let temp = TempDir::new().unwrap();
        let mut ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);
        ctx.local_mut().set("greeting", "Hello ${Preferences.name}");
        ctx.local_mut().set("name", "John");

        assert_eq!(
            ctx.get_string("greeting", &DEFAULT_LAYERS).as_deref(),
            Some("Hello ${Preferences.name}")
        );
        assert_eq!(ctx.eval("${Preferences.greeting}", &DEFAULT_LAYERS), "Hello John");
        assert!(!ctx.has_key("greeting", &[]));
    }

    #[test]
    fn test_checkpoint_saves_dirty_local_in_interactive_modes() {
        let temp = TempDir::new().unwrap();
        let mut ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);
        assert!(!ctx.checkpoint());

        ctx.local_mut().set("volume", 3);
        assert!(ctx.checkpoint());
        assert!(!ctx.local().is_dirty());
        assert!(temp.path().join("local.json").exists());

        let mut test_mode = PrefsContext::new(settings(&temp, ExecutionMode::Test), &argv(&[]))
            .with_autosave(false);
        test_mode.local_mut().set("volume", 4);
        assert!(!test_mode.checkpoint());
    }

    #[test]
    fn test_drop_autosaves() {
        let temp = TempDir::new().unwrap();
        {
            let mut ctx =
                PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]));
            ctx.local_mut().set("name", "John");
        }
        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);
        assert_eq!(ctx.local().get_string("name").as_deref(), Some("John"));
    }

    #[test]
    fn test_location_override() {
        let temp = TempDir::new().unwrap();
        let other = temp.path().join("other.json");
        std::fs::write(&other, r#"{"from": "other"}"#).unwrap();
        let arg = format!("--Preferences@Local={}", other.display());

        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[&arg]))
            .with_autosave(false);
        assert_eq!(ctx.local().get_string("from").as_deref(), Some("other"));
    }

    #[test]
    fn test_test_mode_resolves_asset_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("asset.json"), r#"{"k": "asset"}"#).unwrap();
        std::fs::write(temp.path().join("local.json"), r#"{"k": "local"}"#).unwrap();

        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Test), &argv(&[]))
            .with_autosave(false);
        assert!(ctx.resolver().is_asset_only());
        assert_eq!(ctx.get_string("k", &[SourceKind::Local]).as_deref(), Some("asset"));

        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);
        assert!(!ctx.resolver().is_asset_only());
        assert_eq!(ctx.get_string("k", &[SourceKind::Local]).as_deref(), Some("local"));
    }

    #[test]
    fn test_remote_uri_ignores_scoped_location_arguments() {
        let temp = TempDir::new().unwrap();
        let mut settings = settings(&temp, ExecutionMode::Development);
        settings.remote.uri = Some("https://prefs.example/app.json".to_string());
        let ctx = PrefsContext::new(settings, &argv(&["--Preferences@Remote=https://other.example"]))
            .with_autosave(false);

        assert_eq!(ctx.remote().location(), "https://prefs.example/app.json");
    }

    #[test]
    fn test_context_is_shared_across_reader_threads() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<PrefsContext>();

        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("local.json"), r#"{"name": "John"}"#).unwrap();
        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);

        std::thread::scope(|scope| {
            let readers: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| ctx.get_string("name", &DEFAULT_LAYERS)))
                .collect();
            for reader in readers {
                assert_eq!(reader.join().unwrap().as_deref(), Some("John"));
            }
        });
    }

    #[test]
    fn test_status_lists_created_sources_only() {
        let temp = TempDir::new().unwrap();
        let ctx = PrefsContext::new(settings(&temp, ExecutionMode::Development), &argv(&[]))
            .with_autosave(false);
        assert!(ctx.status().is_empty());
        ctx.local();
        let status = ctx.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].kind, SourceKind::Local);
    }
}
