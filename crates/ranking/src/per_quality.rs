//! Per-resolution result caps

use crate::sort::SortMode;
use std::collections::HashMap;
use streamarr_core::models::TorrentItem;
use tracing::debug;

pub struct ResultsPerQualityFilter {
    max_per_quality: usize,
    sort_mode: SortMode,
}

impl ResultsPerQualityFilter {
    pub fn new(max_per_quality: u32, sort_mode: SortMode) -> Self {
        ResultsPerQualityFilter {
            max_per_quality: max_per_quality as usize,
            sort_mode,
        }
    }

    /// Cap each resolution bucket. Size-based sorts want the whole set so
    /// the final ordering can consider every candidate; everything passes
    /// through untouched in that case.
    pub fn apply(&self, items: Vec<TorrentItem>) -> Vec<TorrentItem> {
        if self.max_per_quality == 0 || self.sort_mode.is_size_based() {
            return items;
        }

        let input_len = items.len();
        let mut per_resolution: HashMap<String, usize> = HashMap::new();
        let filtered: Vec<TorrentItem> = items
            .into_iter()
            .filter(|item| {
                let resolution = item
                    .parsed
                    .resolution
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let seen = per_resolution.entry(resolution).or_insert(0);
                *seen += 1;
                *seen <= self.max_per_quality
            })
            .collect();
        debug!(
            "per-quality cap {}: {} -> {} items",
            self.max_per_quality,
            input_len,
            filtered.len()
        );
        filtered
    }
}
