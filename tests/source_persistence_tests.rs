//! Integration tests for source persistence.
//!
//! These tests write sources to a temporary directory and read them back,
//! in plaintext and encrypted form.

use layered_prefs::config::ExecutionMode;
use layered_prefs::crypto::Cipher;
use layered_prefs::document::Document;
use layered_prefs::error::ErrorCode;
use layered_prefs::source::{Source, SourceKind, SourcePolicy, SourceState};
use tempfile::TempDir;

/// Helper to build a populated local source backed by `name` in `dir`.
fn populated_local(dir: &TempDir, name: &str) -> Source {
    let location = dir.path().join(name).to_string_lossy().into_owned();
    let mut source = Source::new(SourceKind::Local, location);
    assert!(source.parse("{}"));

    source.set("zeta", "last");
    source.set("alpha", 1);
    source.set("ratio", 0.25);
    source.set("enabled", true);
    source.set("levels", vec![3_i64, 1, 2]);

    let mut audio = Document::new();
    audio.set("volume", 0.8);
    audio.set("muted", false);
    source.set("audio", audio);
    source
}

#[test]
fn sorted_pretty_save_roundtrips_structurally() {
    let dir = TempDir::new().unwrap();
    let mut source = populated_local(&dir, "prefs.json");
    assert!(source.save(true, true));

    let mut reread = Source::new(SourceKind::Local, "");
    assert!(reread.read(source.location().to_string()));

    assert_eq!(reread.document(), source.document());
    assert_eq!(reread.get_array::<i64>("levels", vec![]), vec![3, 1, 2]);
    assert_eq!(
        reread.get_document("audio").unwrap().get("volume", 0.0_f64),
        0.8
    );
}

#[test]
fn sorted_output_orders_keys_at_every_level() {
    let dir = TempDir::new().unwrap();
    let mut source = populated_local(&dir, "prefs.json");
    assert!(source.save(true, true));

    let text = std::fs::read_to_string(source.location()).unwrap();
    let pos = |needle: &str| text.find(needle).unwrap();
    assert!(pos("\"alpha\"") < pos("\"audio\""));
    assert!(pos("\"audio\"") < pos("\"zeta\""));
    assert!(pos("\"muted\"") < pos("\"volume\""));
    assert!(text.contains('\n'), "pretty output spans lines");
}

#[test]
fn unsorted_compact_output_keeps_insertion_order() {
    let dir = TempDir::new().unwrap();
    let mut source = populated_local(&dir, "prefs.json");
    assert!(source.save(false, false));

    let text = std::fs::read_to_string(source.location()).unwrap();
    assert!(!text.contains('\n'));
    assert!(text.find("\"zeta\"").unwrap() < text.find("\"alpha\"").unwrap());
}

#[test]
fn encrypted_source_never_writes_plaintext() {
    let dir = TempDir::new().unwrap();
    let policy = SourcePolicy::for_kind(SourceKind::Local, ExecutionMode::Production);
    assert!(policy.encrypted);

    let mut source = populated_local(&dir, "secure.json").encrypted(Cipher::from_secret("s3cret"));
    source.set("token", "plaintext-marker");
    assert!(source.save(true, true));

    let raw = std::fs::read(source.location()).unwrap();
    let raw = String::from_utf8_lossy(&raw);
    assert!(!raw.contains("plaintext-marker"));
    assert!(!raw.contains("alpha"));

    let mut reread = Source::new(SourceKind::Local, "").encrypted(Cipher::from_secret("s3cret"));
    assert!(reread.read(source.location().to_string()));
    assert_eq!(reread.document(), source.document());
}

#[test]
fn plaintext_reader_rejects_encrypted_file() {
    let dir = TempDir::new().unwrap();
    let mut source = populated_local(&dir, "secure.json").encrypted(Cipher::from_secret("k"));
    assert!(source.save(false, false));

    let mut plain = Source::new(SourceKind::Local, "");
    assert!(!plain.read(source.location().to_string()));
    assert_eq!(plain.state(), SourceState::Failed);
    assert_eq!(plain.error().unwrap().code, ErrorCode::MalformedContent);
}

#[test]
fn failed_read_leaves_document_empty() {
    let dir = TempDir::new().unwrap();
    let mut source = populated_local(&dir, "prefs.json");
    assert!(!source.document().is_empty());

    let missing = dir.path().join("missing.json").to_string_lossy().into_owned();
    assert!(!source.read(missing));
    assert!(source.document().is_empty());
    assert!(source.error_message().is_some());
}

#[test]
fn asset_is_read_only_outside_editor() {
    let dir = TempDir::new().unwrap();
    let location = dir.path().join("asset.json").to_string_lossy().into_owned();

    let policy = SourcePolicy::for_kind(SourceKind::Asset, ExecutionMode::Development);
    let mut asset = Source::new(SourceKind::Asset, location.clone()).writable(policy.writable);
    assert!(asset.parse(r#"{"k": 1}"#));
    assert!(!asset.set("k", 2));
    assert_eq!(asset.try_save(true, true).unwrap_err().code, ErrorCode::ReadOnly);

    let policy = SourcePolicy::for_kind(SourceKind::Asset, ExecutionMode::Editor);
    let mut asset = Source::new(SourceKind::Asset, location).writable(policy.writable);
    assert!(asset.parse(r#"{"k": 1}"#));
    assert!(asset.set("k", 2));
    assert!(asset.save(true, true));
}
