//! Integration tests for export and import.

use deauth_whitelist::whitelist::{
    ImportMode, ImportOptions, NewEntry, StoreOptions, WhitelistError, WhitelistStore,
};
use tempfile::TempDir;

fn open(dir: &TempDir, name: &str) -> WhitelistStore {
    WhitelistStore::open(
        dir.path().join(name),
        StoreOptions {
            auto_backup: false,
            ..StoreOptions::default()
        },
    )
    .expect("Store should open")
}

fn merge() -> ImportOptions {
    ImportOptions {
        mode: ImportMode::Merge,
        create_backup: false,
    }
}

#[test]
fn export_then_import_into_empty_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let source = open(&dir, "source.json");
    source
        .add(NewEntry::bssid("AA:BB:CC:DD:EE:FF").description("router"))
        .expect("add");
    source.add(NewEntry::ssid("Guest_*").wildcard().tag("guest")).expect("add");

    let exported = serde_json::to_string(&source.export().expect("export")).expect("json");
    assert!(exported.contains("exported_date"));

    let target = open(&dir, "target.json");
    let summary = target.import_json(&exported, merge()).expect("import");
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.total, 2);

    let entries = target.list().expect("list");
    assert_eq!(entries[0].description, "router");
    assert!(entries[1].use_wildcard);
    assert_eq!(entries[1].tags, vec!["guest"]);
}

#[test]
fn merge_skips_existing_and_assigns_fresh_ids() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");
    store.add(NewEntry::ssid("HomeNet")).expect("add");

    let json = r#"{"networks":[
        {"id":1,"ssid":"HomeNet"},
        {"id":1,"ssid":"Office"}
    ]}"#;
    let summary = store.import_json(json, merge()).expect("import");
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);

    let ids: Vec<_> = store.list().expect("list").iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn replace_discards_existing_entries() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");
    store.add(NewEntry::ssid("Old")).expect("add");

    let options = ImportOptions {
        mode: ImportMode::Replace,
        create_backup: true,
    };
    let summary = store
        .import_json(r#"{"networks":[{"ssid":"New"}]}"#, options)
        .expect("import");
    assert_eq!(summary.total, 1);

    let entries = store.list().expect("list");
    assert_eq!(entries[0].ssid.as_deref(), Some("New"));
    assert!(entries[0].id > 1, "ids are never reused within a run");
    assert_eq!(store.list_backups().expect("backups").len(), 1);
}

#[test]
fn one_invalid_entry_rejects_the_whole_import() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");
    store.add(NewEntry::ssid("HomeNet")).expect("add");
    let before = std::fs::read_to_string(store.path()).expect("read");

    let json = r#"{"networks":[
        {"ssid":"Good"},
        {"bssid":"not-a-mac"}
    ]}"#;
    let err = store.import_json(json, merge()).expect_err("Import should fail");
    assert!(matches!(err, WhitelistError::Validation(_)));
    assert!(err.to_string().contains("import entry 2"));

    assert_eq!(store.list().expect("list").len(), 1);
    assert_eq!(std::fs::read_to_string(store.path()).expect("read"), before);
}

#[test]
fn repeated_entry_in_document_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");

    let json = r#"{"networks":[
        {"bssid":"aa:bb:cc:dd:ee:ff"},
        {"bssid":"AA-BB-CC-DD-EE-FF"}
    ]}"#;
    assert!(matches!(
        store.import_json(json, merge()),
        Err(WhitelistError::DuplicateEntry(_))
    ));
    assert!(store.list().expect("list").is_empty());
}

#[test]
fn legacy_document_can_be_imported() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");

    let summary = store
        .import_json(r#"{"whitelist":["11:22:33:44:55:66","CoffeeShop"]}"#, merge())
        .expect("import");
    assert_eq!(summary.imported, 2);

    let entries = store.list().expect("list");
    assert_eq!(entries[0].bssid.as_deref(), Some("11:22:33:44:55:66"));
    assert_eq!(entries[1].ssid.as_deref(), Some("CoffeeShop"));
}

#[test]
fn malformed_json_is_a_validation_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open(&dir, "whitelist.json");
    assert!(matches!(
        store.import_json("[1, 2, 3]", merge()),
        Err(WhitelistError::Validation(_))
    ));
}
