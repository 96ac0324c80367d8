//! Colored CLI display utilities for whitelist output.

use std::io::{self, Write};
use std::path::Path;

use owo_colors::OwoColorize;

use crate::guard::Verdict;
use crate::whitelist::{ImportSummary, SsidMode, WhitelistEntry, WhitelistStats};

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Plain one-line description of an entry.
#[must_use]
pub fn format_entry(entry: &WhitelistEntry) -> String {
    let mut parts = Vec::new();
    if let Some(bssid) = &entry.bssid {
        parts.push(format!("bssid={bssid}"));
    }
    if let Some(ssid) = &entry.ssid {
        let mode = match entry.ssid_mode() {
            SsidMode::Exact => "",
            SsidMode::Wildcard => " (wildcard)",
            SsidMode::Regex => " (regex)",
        };
        parts.push(format!("ssid={ssid:?}{mode}"));
    }
    if !entry.description.is_empty() {
        parts.push(format!("desc={:?}", truncate(&entry.description, 40)));
    }
    if !entry.tags.is_empty() {
        parts.push(format!("tags={}", entry.tags.join(",")));
    }
    parts.join(" ")
}

/// Print the entry table.
pub fn print_entries(entries: &[WhitelistEntry]) {
    if entries.is_empty() {
        println!("{}", "No whitelisted networks".dimmed());
        return;
    }
    for entry in entries {
        let state = if entry.enabled {
            "[ON ]".green().bold().to_string()
        } else {
            "[OFF]".dimmed().to_string()
        };
        println!(
            "{} {:>4} {}",
            state,
            entry.id.cyan(),
            format_entry(entry)
        );
    }
    let _ = io::stdout().flush();
}

/// Print a decision preview.
pub fn print_verdict(bssid: &str, ssid: &str, verdict: &Verdict) {
    let target = format!("bssid={bssid:?} ssid={ssid:?}");
    if verdict.whitelisted {
        println!("{} {}", "[PROTECTED]".green().bold(), target);
    } else {
        println!("{} {}", "[ATTACKABLE]".yellow().bold(), target);
    }
    if let Some(matched) = &verdict.matched {
        println!(
            "  matched entry {} ({}) by {:?}",
            matched.id.cyan(),
            matched.label,
            matched.rule
        );
    }
    if let Some(reason) = &verdict.fallback_reason {
        println!("  {} {}", "fallback:".red(), reason);
    }
    for failure in &verdict.invalid_patterns {
        println!(
            "  {} entry {} pattern {:?}: {}",
            "invalid regex".red(),
            failure.id,
            failure.pattern,
            failure.error
        );
    }
}

/// Print aggregate counts.
pub fn print_stats(stats: &WhitelistStats) {
    println!("{}", "Whitelist statistics".blue().bold());
    println!("  total:    {}", stats.total_networks);
    println!("  enabled:  {}", stats.enabled_networks);
    println!("  bssid:    {}", stats.bssid_entries);
    println!("  ssid:     {}", stats.ssid_entries);
    println!("  wildcard: {}", stats.wildcard_entries);
    println!("  regex:    {}", stats.regex_entries);
    println!("  version:  {}", stats.version);
    if let Some(updated) = stats.last_updated {
        println!("  updated:  {}", updated.to_rfc3339().dimmed());
    }
}

/// Print the result of an import.
pub fn print_import_summary(summary: &ImportSummary) {
    print_success(&format!(
        "Imported {} network(s), skipped {}, {} total",
        summary.imported, summary.skipped, summary.total
    ));
}

/// Print a backup path.
pub fn print_backup(label: &str, path: &Path) {
    print_success(&format!("{label}: {}", path.display()));
}

pub fn print_success(message: &str) {
    println!("{} {}", "[OK]".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
