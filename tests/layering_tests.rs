//! Integration tests for layered resolution.
//!
//! These tests verify resolver precedence, command-line overrides and
//! reference evaluation through a full context.

use layered_prefs::config::{ExecutionMode, Settings};
use layered_prefs::context::{DEFAULT_LAYERS, PrefsContext};
use layered_prefs::document::Document;
use layered_prefs::overrides::StartupArgs;
use layered_prefs::resolver::Resolver;
use layered_prefs::source::{Source, SourceKind};
use tempfile::TempDir;

/// Helper to create settings whose files live in `dir`.
fn test_settings(dir: &TempDir, mode: ExecutionMode) -> Settings {
    let mut settings = Settings::default();
    settings.prefix = "Cfg".to_string();
    settings.mode = mode;
    settings.paths.asset = dir.path().join("asset.json");
    settings.paths.local = Some(dir.path().join("local.json"));
    settings
}

fn loaded(kind: SourceKind, json: &str) -> Source {
    let mut source = Source::new(kind, "");
    assert!(source.parse(json));
    source
}

#[test]
fn resolver_returns_first_source_with_key() {
    let asset = loaded(SourceKind::Asset, "{}");
    let a = loaded(SourceKind::Local, r#"{"k": "from-a"}"#);
    let b = loaded(SourceKind::Remote, r#"{"k": "from-b"}"#);
    let resolver = Resolver::new(&asset);

    assert_eq!(resolver.get("k", String::new(), &[&a, &b]), "from-a");
    assert_eq!(resolver.get("k", String::new(), &[&b, &a]), "from-b");
    assert_eq!(resolver.get("absent", "fallback".to_string(), &[&a, &b]), "fallback");
}

#[test]
fn scoped_override_creates_intermediate_documents() {
    let dir = TempDir::new().unwrap();
    let args = StartupArgs::from_argv(["--Cfg@Local.user.age=30"]);
    let ctx = PrefsContext::new(test_settings(&dir, ExecutionMode::Development), &args)
        .with_autosave(false);

    let user = ctx.local().get_document("user").unwrap();
    assert_eq!(user.get_string("age").as_deref(), Some("30"));
    assert_eq!(user.get("age", 0), 30);
    assert!(!ctx.local().is_dirty());
}

#[test]
fn overrides_win_over_file_content() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("local.json"),
        r#"{"volume": 0.5, "name": "file"}"#,
    )
    .unwrap();
    let args = StartupArgs::from_argv(["-Cfg.name", "cli", "--Cfg@Asset.volume=1"]);
    let ctx = PrefsContext::new(test_settings(&dir, ExecutionMode::Development), &args)
        .with_autosave(false);

    assert_eq!(ctx.local().get_string("name").as_deref(), Some("cli"));
    // Asset-scoped entries never reach the local source
    assert_eq!(ctx.local().get("volume", 0.0_f64), 0.5);
}

#[test]
fn evaluation_across_layers() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("local.json"),
        r#"{"greeting": "Hello ${Preferences.name}", "a": "${Preferences.b}", "b": "${Preferences.a}"}"#,
    )
    .unwrap();
    let args = StartupArgs::from_argv(["--Cfg.name=John"]);
    let ctx = PrefsContext::new(test_settings(&dir, ExecutionMode::Development), &args)
        .with_autosave(false);

    assert_eq!(ctx.eval("${Preferences.greeting}", &DEFAULT_LAYERS), "Hello John");
    assert_eq!(
        ctx.eval("${Preferences.missing}", &DEFAULT_LAYERS),
        "${Preferences.missing}(Unknown)"
    );
    assert_eq!(
        ctx.eval("${Preferences.a}", &DEFAULT_LAYERS),
        "${Preferences.a}(Recursive)"
    );
}

#[test]
fn non_interactive_modes_resolve_asset_only() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("asset.json"), r#"{"k": "asset"}"#).unwrap();
    std::fs::write(dir.path().join("local.json"), r#"{"k": "local"}"#).unwrap();

    for mode in [ExecutionMode::Editor, ExecutionMode::Test] {
        let ctx = PrefsContext::new(test_settings(&dir, mode), &StartupArgs::default())
            .with_autosave(false);

        assert!(ctx.resolver().is_asset_only(), "{} mode", mode);
        assert_eq!(
            ctx.get_string("k", &DEFAULT_LAYERS).as_deref(),
            Some("asset"),
            "{} mode",
            mode
        );
    }
}

#[test]
fn effective_view_publishes_cleanly() {
    let asset = loaded(
        SourceKind::Asset,
        r#"{"title": "Game ${Preferences.version}", "version": "1.0", "tpl@Const": "${Preferences.version}", "notes@Editor": "internal"}"#,
    );
    let local = loaded(SourceKind::Local, r#"{"version": "1.1"}"#);
    let resolver = Resolver::new(&asset);

    let mut view: Document = resolver.effective(&[&local, &asset]);
    view.strip_editor_keys();
    view.evaluate_in_place();

    assert_eq!(view.get_string("title").as_deref(), Some("Game 1.1"));
    assert_eq!(
        view.get_string("tpl@Const").as_deref(),
        Some("${Preferences.version}")
    );
    assert!(!view.has("notes@Editor"));
}
