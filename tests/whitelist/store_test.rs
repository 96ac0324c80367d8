//! Integration tests for the JSON-backed store.

use std::sync::Arc;
use std::thread;

use deauth_whitelist::whitelist::{
    NewEntry, StoreOptions, WhitelistDocument, WhitelistError, WhitelistStore,
};
use tempfile::TempDir;

fn options() -> StoreOptions {
    StoreOptions {
        auto_backup: false,
        ..StoreOptions::default()
    }
}

fn read_document(store: &WhitelistStore) -> WhitelistDocument {
    let content = std::fs::read_to_string(store.path()).expect("Failed to read store file");
    WhitelistDocument::from_json(&content).expect("Store file should parse")
}

#[test]
fn stale_temp_file_is_ignored_and_replaced() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    std::fs::write(
        &path,
        r#"{"networks":[{"id":1,"ssid":"HomeNet"}],"version":"1.0"}"#,
    )
    .expect("Failed to write store");
    // Leftover from a crash between the temp write and the rename.
    std::fs::write(dir.path().join("whitelist.json.tmp"), "{ half written").expect("write");

    let store = WhitelistStore::open(&path, options()).expect("Store should open");
    assert_eq!(store.list().expect("list").len(), 1);

    store.add(NewEntry::ssid("Office")).expect("Add should succeed");
    assert!(!dir.path().join("whitelist.json.tmp").exists());
    assert_eq!(read_document(&store).networks.len(), 2);
}

#[test]
fn failed_write_leaves_memory_and_disk_unchanged() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    let store = WhitelistStore::open(&path, options()).expect("Store should open");
    store.add(NewEntry::ssid("HomeNet")).expect("Add should succeed");
    let before = std::fs::read_to_string(&path).expect("read");

    // A directory squatting on the temp path makes the write fail.
    std::fs::create_dir(dir.path().join("whitelist.json.tmp")).expect("mkdir");

    let err = store
        .add(NewEntry::ssid("Office"))
        .expect_err("Add should fail");
    assert!(matches!(err, WhitelistError::Persistence { .. }), "{err:?}");

    let entries = store.list().expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ssid.as_deref(), Some("HomeNet"));
    assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
}

#[test]
fn concurrent_adds_get_unique_ids() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(
        WhitelistStore::open(dir.path().join("whitelist.json"), options()).expect("open"),
    );

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..5)
                    .map(|n| {
                        store
                            .add(NewEntry::ssid(format!("net-{worker}-{n}")))
                            .expect("Add should succeed")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().expect("Thread panicked"))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40);
    assert_eq!(read_document(&store).networks.len(), 40);
}

#[test]
fn legacy_file_is_converted_on_load() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    std::fs::write(&path, r#"{"whitelist":["aa:bb:cc:dd:ee:ff","HomeNet"]}"#)
        .expect("Failed to write store");

    let store = WhitelistStore::open(&path, options()).expect("Store should open");
    let entries = store.list().expect("list");

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, 1);
    assert_eq!(entries[0].bssid.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    assert_eq!(entries[1].id, 2);
    assert_eq!(entries[1].ssid.as_deref(), Some("HomeNet"));
    assert!(entries.iter().all(|e| e.enabled));

    let id = store.add(NewEntry::ssid("Office")).expect("add");
    assert_eq!(id, 3);
    assert!(read_document(&store).networks.iter().all(|e| e.id != 0));
}

#[test]
fn corrupt_file_is_reported() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    std::fs::write(&path, "not json").expect("write");

    let err = WhitelistStore::open(&path, options()).expect_err("Open should fail");
    assert!(matches!(err, WhitelistError::CorruptStore { .. }));
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "not json");
}

#[test]
fn corrupt_reload_keeps_last_known_good() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    let store = WhitelistStore::open(&path, options()).expect("open");
    store.add(NewEntry::ssid("HomeNet")).expect("add");

    std::fs::write(&path, "{ broken").expect("write");
    assert!(store.load().is_err());

    let entries = store.list().expect("Snapshot should survive");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ssid.as_deref(), Some("HomeNet"));
}

#[test]
fn external_edit_is_picked_up_by_reload() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    let store = WhitelistStore::open(&path, options()).expect("open");
    store.add(NewEntry::ssid("HomeNet")).expect("add");

    std::fs::write(
        &path,
        r#"{"networks":[{"id":7,"ssid":"Edited"}],"version":"1.0"}"#,
    )
    .expect("write");
    store.load().expect("Reload should succeed");

    let entries = store.list().expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 7);
    assert_eq!(store.add(NewEntry::ssid("Next")).expect("add"), 8);
}

#[test]
fn backups_are_rotated_and_restorable() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    let store = WhitelistStore::open(
        &path,
        StoreOptions {
            auto_backup: true,
            max_backups: 2,
            ..StoreOptions::default()
        },
    )
    .expect("open");

    for name in ["one", "two", "three", "four"] {
        store.add(NewEntry::ssid(name)).expect("add");
    }
    assert_eq!(store.list_backups().expect("backups").len(), 2);

    // The newest backup was taken just before "four" was written.
    store.restore_latest_backup().expect("restore");
    let names: Vec<_> = store
        .list()
        .expect("list")
        .into_iter()
        .filter_map(|e| e.ssid)
        .collect();
    assert_eq!(names, vec!["one", "two", "three"]);
    assert_eq!(read_document(&store).networks.len(), 3);
}

#[test]
fn restore_without_backup_is_not_found() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = WhitelistStore::open(dir.path().join("whitelist.json"), options()).expect("open");
    assert!(matches!(
        store.restore_latest_backup(),
        Err(WhitelistError::NotFound(_))
    ));
}

#[test]
fn validation_failures_do_not_touch_the_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = WhitelistStore::open(dir.path().join("whitelist.json"), options()).expect("open");

    let too_long = "x".repeat(33);
    for bad in [
        NewEntry::default(),
        NewEntry::bssid("zz:zz:zz:zz:zz:zz"),
        NewEntry::ssid(too_long),
        NewEntry::ssid("([bad").regex(),
    ] {
        assert!(matches!(store.add(bad), Err(WhitelistError::Validation(_))));
    }
    assert!(store.list().expect("list").is_empty());
}

#[test]
fn duplicate_bssid_in_other_notation_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = WhitelistStore::open(dir.path().join("whitelist.json"), options()).expect("open");
    store.add(NewEntry::bssid("AA:BB:CC:DD:EE:FF")).expect("add");

    assert!(matches!(
        store.add(NewEntry::bssid("aa-bb-cc-dd-ee-ff")),
        Err(WhitelistError::DuplicateEntry(_))
    ));
}

#[test]
fn added_entries_survive_reopen_unchanged() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("whitelist.json");
    let store = WhitelistStore::open(&path, options()).expect("Store should open");

    let guest = store
        .add(NewEntry {
            description: "lobby".to_string(),
            tags: vec!["guest".to_string(), "5g".to_string()],
            enabled: Some(false),
            ..NewEntry::ssid("Guest_*").wildcard()
        })
        .expect("Add should succeed");
    let office = store
        .add(NewEntry::ssid("(?x) OFFICE_\\d+ # floors").regex())
        .expect("Add should succeed");
    let router = store
        .add(NewEntry::bssid("aa-bb-cc-dd-ee-ff"))
        .expect("Add should succeed");

    let before = store.list().expect("list");
    let reopened = WhitelistStore::open(&path, options()).expect("Store should reopen");
    assert_eq!(reopened.list().expect("list"), before);
    for id in [guest, office, router] {
        assert_eq!(
            reopened.get(id).expect("get"),
            store.get(id).expect("get")
        );
    }
    assert_eq!(
        reopened.get(router).expect("get").bssid.as_deref(),
        Some("AA:BB:CC:DD:EE:FF")
    );
}
