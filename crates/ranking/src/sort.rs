//! Configurable final ordering

use streamarr_core::models::TorrentItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    SizeDesc,
    SizeAsc,
    Seeders,
    QualityThenSize,
}

impl SortMode {
    pub fn parse(value: &str) -> SortMode {
        match value.to_ascii_lowercase().as_str() {
            "sizedesc" => SortMode::SizeDesc,
            "sizeasc" => SortMode::SizeAsc,
            "qualitythensize" => SortMode::QualityThenSize,
            _ => SortMode::Seeders,
        }
    }

    pub fn is_size_based(&self) -> bool {
        matches!(
            self,
            SortMode::SizeDesc | SortMode::SizeAsc | SortMode::QualityThenSize
        )
    }
}

/// Resolution rank for quality-first ordering; higher is better.
fn resolution_rank(item: &TorrentItem) -> u32 {
    match item.parsed.resolution.as_deref() {
        Some("2160p") => 5,
        Some("1080p") => 4,
        Some("720p") => 3,
        Some("576p") => 2,
        Some("480p") => 1,
        _ => 0,
    }
}

fn item_size(item: &TorrentItem) -> u64 {
    item.file_size_bytes.unwrap_or(item.size_bytes)
}

/// Stable sort by the configured mode.
pub fn sort_items(items: &mut [TorrentItem], mode: SortMode) {
    match mode {
        SortMode::SizeDesc => items.sort_by(|a, b| item_size(b).cmp(&item_size(a))),
        SortMode::SizeAsc => items.sort_by(|a, b| item_size(a).cmp(&item_size(b))),
        SortMode::Seeders => items.sort_by(|a, b| b.seeders.cmp(&a.seeders)),
        SortMode::QualityThenSize => items.sort_by(|a, b| {
            resolution_rank(b)
                .cmp(&resolution_rank(a))
                .then_with(|| item_size(b).cmp(&item_size(a)))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamarr_core::models::{MediaKind, Privacy, RawResult};

    fn item(title: &str, size: u64, seeders: u32, n: usize) -> TorrentItem {
        TorrentItem::from_raw(
            RawResult {
                raw_title: title.to_string(),
                info_hash: format!("{n:040x}"),
                size_bytes: size,
                magnet: None,
                torrent_file_url: None,
                seeders,
                languages: vec![],
                indexer_name: "t".to_string(),
                privacy: Privacy::Public,
            },
            MediaKind::Movie,
        )
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(SortMode::parse("sizedesc"), SortMode::SizeDesc);
        assert_eq!(SortMode::parse("SIZEASC"), SortMode::SizeAsc);
        assert_eq!(SortMode::parse("qualitythensize"), SortMode::QualityThenSize);
        assert_eq!(SortMode::parse(""), SortMode::Seeders);
        assert_eq!(SortMode::parse("whatever"), SortMode::Seeders);
    }

    #[test]
    fn test_sort_by_seeders_desc() {
        let mut items = vec![
            item("A", 10, 3, 0),
            item("B", 10, 9, 1),
            item("C", 10, 6, 2),
        ];
        sort_items(&mut items, SortMode::Seeders);
        let seeders: Vec<u32> = items.iter().map(|i| i.seeders).collect();
        assert_eq!(seeders, vec![9, 6, 3]);
    }

    #[test]
    fn test_quality_then_size() {
        let mut items = vec![
            item("A 720p", 100, 0, 0),
            item("B 1080p", 10, 0, 1),
            item("C 1080p", 50, 0, 2),
        ];
        sort_items(&mut items, SortMode::QualityThenSize);
        let titles: Vec<&str> = items.iter().map(|i| i.raw_title.as_str()).collect();
        assert_eq!(titles, vec!["C 1080p", "B 1080p", "A 720p"]);
    }

    #[test]
    fn test_selected_file_size_preferred() {
        let mut big = item("A", 1, 0, 0);
        big.file_size_bytes = Some(500);
        let small = item("B", 100, 0, 1);
        let mut items = vec![small, big];
        sort_items(&mut items, SortMode::SizeDesc);
        assert_eq!(items[0].raw_title, "A");
    }
}
