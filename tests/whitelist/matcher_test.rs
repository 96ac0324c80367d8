//! Integration tests for the match engine.

use deauth_whitelist::whitelist::{
    MatchEngine, MatchError, MatchRule, NewEntry, SsidMode, WhitelistEntry,
};

fn entries(specs: Vec<NewEntry>) -> Vec<WhitelistEntry> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, new)| {
            let mut entry = new.into_entry().expect("Entry should be valid");
            entry.id = i as u64 + 1;
            entry
        })
        .collect()
}

#[test]
fn bssid_entry_matches_any_notation() {
    let engine = MatchEngine::new();
    let list = entries(vec![NewEntry::bssid("aa-bb-cc-dd-ee-ff")]);

    for target in ["AA:BB:CC:DD:EE:FF", "aa:bb:cc:dd:ee:ff", "aa.bb.cc.dd.ee.ff"] {
        assert_eq!(engine.is_whitelisted(target, "", &list), Ok(true), "{target}");
    }
    assert_eq!(
        engine.is_whitelisted("AA:BB:CC:DD:EE:00", "", &list),
        Ok(false)
    );
}

#[test]
fn bssid_entry_ignores_ssid_and_ssid_entry_ignores_bssid() {
    let engine = MatchEngine::new();
    let list = entries(vec![
        NewEntry::bssid("AA:BB:CC:DD:EE:FF"),
        NewEntry::ssid("HomeNet"),
    ]);

    let outcome = engine.check("AA:BB:CC:DD:EE:FF", "Anything", &list);
    assert_eq!(outcome.matched.map(|m| m.rule), Some(MatchRule::Bssid));

    let outcome = engine.check("11:22:33:44:55:66", "HomeNet", &list);
    let matched = outcome.matched.expect("SSID entry should match");
    assert_eq!(matched.id, 2);
    assert_eq!(matched.rule, MatchRule::Ssid(SsidMode::Exact));
}

#[test]
fn entry_with_both_fields_matches_on_either() {
    let engine = MatchEngine::new();
    let mut new = NewEntry::bssid("AA:BB:CC:DD:EE:FF");
    new.ssid = Some("Office".to_string());
    let list = entries(vec![new]);

    assert_eq!(engine.is_whitelisted("AA:BB:CC:DD:EE:FF", "Other", &list), Ok(true));
    assert_eq!(engine.is_whitelisted("11:22:33:44:55:66", "Office", &list), Ok(true));
    assert_eq!(engine.is_whitelisted("11:22:33:44:55:66", "Other", &list), Ok(false));
}

#[test]
fn wildcard_and_regex_modes() {
    let engine = MatchEngine::new();
    let list = entries(vec![
        NewEntry::ssid("Guest_*").wildcard(),
        NewEntry::ssid(r"Corp-\d{3}").regex(),
    ]);

    assert_eq!(engine.is_whitelisted("", "Guest_5G", &list), Ok(true));
    assert_eq!(engine.is_whitelisted("", "MyGuest_5G", &list), Ok(false));
    assert_eq!(engine.is_whitelisted("", "Corp-042", &list), Ok(true));
    assert_eq!(engine.is_whitelisted("", "Corp-0421", &list), Ok(false));
    assert_eq!(engine.is_whitelisted("", "corp-042", &list), Ok(false));
}

#[test]
fn regex_ignore_case_is_opt_in() {
    let list = entries(vec![NewEntry::ssid("corp-.*").regex()]);

    assert_eq!(MatchEngine::new().is_whitelisted("", "CORP-1", &list), Ok(false));
    assert_eq!(
        MatchEngine::new()
            .with_regex_ignore_case(true)
            .is_whitelisted("", "CORP-1", &list),
        Ok(true)
    );
}

#[test]
fn empty_whitelist_never_matches() {
    let engine = MatchEngine::new();
    assert_eq!(engine.is_whitelisted("AA:BB:CC:DD:EE:FF", "Net", &[]), Ok(false));
}

#[test]
fn match_wins_over_malformed_bssid() {
    let engine = MatchEngine::new();
    let list = entries(vec![NewEntry::ssid("HomeNet")]);

    assert_eq!(engine.is_whitelisted("not-a-mac", "HomeNet", &list), Ok(true));
    assert!(matches!(
        engine.is_whitelisted("not-a-mac", "Other", &list),
        Err(MatchError::MalformedTarget(_))
    ));
}

#[test]
fn hand_edited_invalid_regex_is_skipped() {
    let engine = MatchEngine::new();
    let mut list = entries(vec![NewEntry::ssid("Fallback")]);
    let broken = WhitelistEntry {
        id: 99,
        ssid: Some("([unclosed".to_string()),
        use_regex: true,
        ..list[0].clone()
    };
    list.insert(0, broken);

    let outcome = engine.check("", "Fallback", &list);
    assert_eq!(outcome.matched.map(|m| m.id), Some(1));
    assert_eq!(outcome.invalid_patterns.len(), 1);
    assert_eq!(outcome.invalid_patterns[0].id, 99);
    assert!(outcome.errors.is_empty());
}
