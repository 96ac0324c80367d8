//! Whitelist module tests.

mod guard_test;
mod import_test;
mod matcher_test;
mod store_test;

/// Verify the public whitelist types are exported from the library.
#[test]
fn test_all_whitelist_types_exported() {
    use deauth_whitelist::whitelist::{
        AttackDecision, Bssid, EnforcementMode, EntryUpdate, ImportMode, ImportOptions,
        MatchEngine, MatchError, NewEntry, StoreOptions, WhitelistDocument, WhitelistError,
        WhitelistStore,
    };

    let _ = MatchEngine::new();
    let _ = StoreOptions::default();
    let _ = WhitelistDocument::default();
    let _ = EntryUpdate::default();
    let _ = ImportOptions::default();
    let _ = NewEntry::ssid("x");
    let _: Result<Bssid, _> = "AA:BB:CC:DD:EE:FF".parse();
    let _: fn() -> WhitelistError = || WhitelistError::NotFound("x".to_string());
    let _ = MatchError::MissingTarget;
    let _ = (EnforcementMode::Strict, ImportMode::Merge, AttackDecision::Proceed);
    let _ = WhitelistStore::new("whitelist.json", StoreOptions::default());
}
