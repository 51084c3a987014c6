//! Language-priority ordering
//!
//! Sorts torrents by the release's French-language flavor, derived from
//! the raw title first and the parsed languages as a fallback. The sort
//! is stable: items inside a group keep their incoming order.

use once_cell::sync::Lazy;
use regex::Regex;
use streamarr_core::models::TorrentItem;
use tracing::debug;

/// Title patterns, most specific first. Group 1 outranks group 2, etc.
static PATTERNS: Lazy<Vec<(Regex, &'static str, u32)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(?i)\bVFF\b").unwrap(), "VFF", 1),
        (Regex::new(r"(?i)\bVOF\b").unwrap(), "VOF", 1),
        (Regex::new(r"(?i)\bVFI\b").unwrap(), "VFI", 1),
        (Regex::new(r"(?i)\bVF2\b").unwrap(), "VF2", 2),
        (Regex::new(r"(?i)\bVFQ\b").unwrap(), "VFQ", 2),
        (Regex::new(r"(?i)\bVOSTFR\b").unwrap(), "VOSTFR", 3),
        (Regex::new(r"(?i)\bVQ\b").unwrap(), "VQ", 4),
        (Regex::new(r"(?i)\bFRENCH\b").unwrap(), "FRENCH", 4),
    ]
});

const UNMATCHED: u32 = 999;

pub struct LanguagePriorityFilter;

impl LanguagePriorityFilter {
    pub fn apply(items: &mut Vec<TorrentItem>) {
        items.sort_by_key(|item| Self::priority(item));
        debug!(
            "language priority sort applied to {} items (VFF/VOF/VFI > VF2/VFQ > VOSTFR > VQ/FRENCH)",
            items.len()
        );
    }

    pub fn priority(item: &TorrentItem) -> u32 {
        if let Some(group) = Self::group_from_title(&item.raw_title) {
            return group;
        }
        // No marker in the title; fall back to indexer-provided languages
        let mut best = UNMATCHED;
        for language in &item.languages {
            if let Some(group) = Self::group_from_code(language) {
                best = best.min(group);
            }
        }
        best
    }

    fn group_from_title(title: &str) -> Option<u32> {
        PATTERNS
            .iter()
            .filter(|(pattern, _, _)| pattern.is_match(title))
            .map(|(_, _, group)| *group)
            .min()
    }

    fn group_from_code(code: &str) -> Option<u32> {
        match code.to_ascii_lowercase().as_str() {
            "vff" | "vof" | "vfi" | "multi" => Some(1),
            "vf2" | "vfq" => Some(2),
            "vostfr" => Some(3),
            "vq" | "fr" | "vf" | "french" => Some(4),
            _ => None,
        }
    }
}
