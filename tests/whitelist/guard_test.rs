//! Integration tests for enforcement through the guard.

use std::sync::Arc;

use deauth_whitelist::guard::{DeauthHooks, WhitelistGuard};
use deauth_whitelist::whitelist::{
    AttackDecision, EnforcementMode, NewEntry, StoreOptions, WhitelistStore,
};
use tempfile::TempDir;

fn guard_with_file(dir: &TempDir, content: Option<&str>, mode: EnforcementMode) -> WhitelistGuard {
    let path = dir.path().join("whitelist.json");
    if let Some(content) = content {
        std::fs::write(&path, content).expect("Failed to write store");
    }
    let store = WhitelistStore::new(
        path,
        StoreOptions {
            auto_backup: false,
            ..StoreOptions::default()
        },
    );
    WhitelistGuard::new(Arc::new(store), mode)
}

#[tokio::test]
async fn strict_mode_lets_attack_proceed_on_corrupt_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let guard = guard_with_file(&dir, Some("{ corrupt"), EnforcementMode::Strict);

    let verdict = guard.evaluate("AA:BB:CC:DD:EE:FF", "HomeNet");
    assert!(!verdict.whitelisted);
    assert!(verdict.fallback_reason.is_some());

    let decision = guard.on_deauth_attempt("AA:BB:CC:DD:EE:FF", "HomeNet").await;
    assert_eq!(decision, AttackDecision::Proceed);
}

#[tokio::test]
async fn lenient_mode_suppresses_attack_on_corrupt_store() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let guard = guard_with_file(&dir, Some("{ corrupt"), EnforcementMode::Lenient);

    assert!(guard.is_whitelisted("AA:BB:CC:DD:EE:FF", "HomeNet"));
    let decision = guard.on_deauth_attempt("AA:BB:CC:DD:EE:FF", "HomeNet").await;
    assert!(!decision.allows_attack());
}

#[tokio::test]
async fn explicit_match_is_never_overridden() {
    for mode in [EnforcementMode::Strict, EnforcementMode::Lenient] {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let guard = guard_with_file(&dir, None, mode);
        guard.add(NewEntry::ssid("HomeNet")).await.expect("add");

        let verdict = guard.evaluate("garbage", "HomeNet");
        assert!(verdict.whitelisted, "{mode}");
        assert!(verdict.fallback_reason.is_none());

        let verdict = guard.evaluate("11:22:33:44:55:66", "Stranger");
        assert!(!verdict.whitelisted, "{mode}");
        assert!(verdict.fallback_reason.is_none());
    }
}

#[tokio::test]
async fn changes_take_effect_on_next_decision() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let guard = guard_with_file(&dir, None, EnforcementMode::Strict);

    assert!(guard
        .on_deauth_attempt("AA:BB:CC:DD:EE:FF", "")
        .await
        .allows_attack());

    let id = guard
        .add(NewEntry::bssid("aa:bb:cc:dd:ee:ff"))
        .await
        .expect("add");
    assert!(!guard
        .on_deauth_attempt("AA:BB:CC:DD:EE:FF", "")
        .await
        .allows_attack());

    guard.toggle(id, false).await.expect("toggle");
    assert!(guard
        .on_deauth_attempt("AA:BB:CC:DD:EE:FF", "")
        .await
        .allows_attack());

    guard.toggle(id, true).await.expect("toggle");
    guard.remove(id).await.expect("remove");
    assert!(guard
        .on_deauth_attempt("AA:BB:CC:DD:EE:FF", "")
        .await
        .allows_attack());
}

#[tokio::test]
async fn repaired_file_recovers_after_reload() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let guard = guard_with_file(&dir, Some("{ corrupt"), EnforcementMode::Strict);
    assert!(guard.reload().await.is_err());

    std::fs::write(
        guard.store().path(),
        r#"{"networks":[{"id":1,"ssid":"HomeNet"}]}"#,
    )
    .expect("write");
    guard.reload().await.expect("Reload should succeed");

    let verdict = guard.evaluate("", "HomeNet");
    assert!(verdict.whitelisted);
    assert!(verdict.fallback_reason.is_none());
}

#[tokio::test]
async fn invalid_stored_pattern_is_reported_in_verdict() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let guard = guard_with_file(
        &dir,
        Some(r#"{"networks":[{"id":1,"ssid":"([bad","use_regex":true}]}"#),
        EnforcementMode::Lenient,
    );

    let verdict = guard.evaluate("", "anything");
    assert!(!verdict.whitelisted);
    assert!(verdict.fallback_reason.is_none());
    assert_eq!(verdict.invalid_patterns.len(), 1);
    assert_eq!(verdict.invalid_patterns[0].id, 1);
    assert!(verdict.invalid_patterns[0].first_seen);

    // Only the first sighting is flagged for a warning.
    let verdict = guard.evaluate("", "anything else");
    assert_eq!(verdict.invalid_patterns.len(), 1);
    assert!(!verdict.invalid_patterns[0].first_seen);
}

#[tokio::test]
async fn blank_fields_from_older_files_do_not_spare_strangers() {
    let content = r#"{
        "networks": [
            {"id": 1, "bssid": "", "ssid": "Home", "description": "", "enabled": true,
             "use_wildcard": false, "use_regex": false, "tags": [],
             "added_date": "2024-05-01T12:30:00.123456"}
        ],
        "version": "1.0"
    }"#;

    for mode in [EnforcementMode::Strict, EnforcementMode::Lenient] {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let guard = guard_with_file(&dir, Some(content), mode);

        let verdict = guard.evaluate("11:22:33:44:55:66", "Stranger");
        assert!(!verdict.whitelisted, "{mode}");
        assert!(verdict.fallback_reason.is_none(), "{mode}");
        let decision = guard.on_deauth_attempt("11:22:33:44:55:66", "Stranger").await;
        assert_eq!(decision, AttackDecision::Proceed, "{mode}");

        let verdict = guard.evaluate("", "Home");
        assert!(verdict.whitelisted, "{mode}");
        assert_eq!(verdict.matched.map(|m| m.id), Some(1));
    }
}
