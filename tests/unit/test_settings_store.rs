//! Unit Tests for the Settings Store
//!
//! The JSON store backs the settings form: a flat string map, persisted
//! as a whole, last write wins.

use procwarden::settings::{JsonSettingsStore, MemorySettingsStore, Settings, SettingsStore};
use procwarden::Error;
use tempfile::TempDir;

fn settings(pairs: &[(&str, &str)]) -> Settings {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonSettingsStore::new(dir.path().join("settings.json"));
    assert!(store.get_config().unwrap().is_empty());
}

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let store = JsonSettingsStore::new(dir.path().join("settings.json"));
    let saved = settings(&[("EXCHANGE", "kraken"), ("TRADE_SIZE", "0.5")]);

    store.save_config(&saved).unwrap();
    assert_eq!(store.get_config().unwrap(), saved);

    // A second store on the same file sees the same values
    let reopened = JsonSettingsStore::new(store.path());
    assert_eq!(reopened.get_config().unwrap(), saved);
}

#[test]
fn test_last_write_wins() {
    let dir = TempDir::new().unwrap();
    let store = JsonSettingsStore::new(dir.path().join("settings.json"));

    store.save_config(&settings(&[("A", "1"), ("B", "2")])).unwrap();
    store.save_config(&settings(&[("B", "3")])).unwrap();

    assert_eq!(store.get_config().unwrap(), settings(&[("B", "3")]));
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("settings.json");
    let store = JsonSettingsStore::new(&path);

    store.save_config(&settings(&[("KEY", "value")])).unwrap();
    assert!(path.exists());
}

#[test]
fn test_file_is_a_flat_json_object() {
    let dir = TempDir::new().unwrap();
    let store = JsonSettingsStore::new(dir.path().join("settings.json"));
    store.save_config(&settings(&[("KEY", "value")])).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json, serde_json::json!({"KEY": "value"}));
}

#[test]
fn test_empty_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "  \n").unwrap();

    let store = JsonSettingsStore::new(&path);
    assert!(store.get_config().unwrap().is_empty());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = JsonSettingsStore::new(&path).get_config().unwrap_err();
    assert!(matches!(err, Error::SettingsLoadFailed { .. }));
}

#[test]
fn test_non_string_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"TRADE_SIZE": 0.5}"#).unwrap();

    assert!(JsonSettingsStore::new(&path).get_config().is_err());
}

#[test]
fn test_memory_store() {
    let store = MemorySettingsStore::new(settings(&[("A", "1")]));
    assert_eq!(store.get_config().unwrap(), settings(&[("A", "1")]));

    store.save_config(&Settings::new()).unwrap();
    assert!(store.get_config().unwrap().is_empty());
}
