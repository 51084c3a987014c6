//! TorrentSmartContainer
//!
//! Holds the deduplicated torrent set for one search and reconciles the
//! availability announcements coming back from heterogeneous debrid
//! providers. Updates are commutative per info hash: applying the same
//! announcements twice leaves the container unchanged, and a provider
//! never clobbers another provider's positive result.

use crate::models::{
    AnnouncedFile, AvailabilityAnnouncement, AvailabilityCode, MediaRequest, StoreName,
    TorrentItem,
};
use crate::parsing::{select_episode_file, FileCandidate};
use crate::traits::ProviderKind;
use std::collections::HashMap;
use tracing::{debug, warn};

pub struct TorrentSmartContainer {
    items: HashMap<String, TorrentItem>,
    /// Insertion order, so output stays stable across runs
    order: Vec<String>,
}

impl TorrentSmartContainer {
    pub fn new(items: Vec<TorrentItem>) -> Self {
        let mut container = TorrentSmartContainer {
            items: HashMap::new(),
            order: Vec::new(),
        };
        container.insert(items);
        container
    }

    /// Insert items, dropping duplicates by info hash (first one wins).
    pub fn insert(&mut self, items: Vec<TorrentItem>) {
        for item in items {
            if item.info_hash.is_empty() {
                continue;
            }
            let hash = item.info_hash.to_ascii_lowercase();
            if self.items.contains_key(&hash) {
                debug!("skipping duplicate info hash {hash}");
                continue;
            }
            self.order.push(hash.clone());
            self.items.insert(hash, item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, info_hash: &str) -> Option<&TorrentItem> {
        self.items.get(&info_hash.to_ascii_lowercase())
    }

    pub fn items(&self) -> impl Iterator<Item = &TorrentItem> {
        self.order.iter().filter_map(|hash| self.items.get(hash))
    }

    /// Hashes still awaiting an availability verdict
    pub fn unresolved_hashes(&self) -> Vec<String> {
        self.items()
            .filter(|item| item.availability.is_empty())
            .map(|item| item.info_hash.clone())
            .collect()
    }

    /// Public items worth publishing to the community cache
    pub fn public_items(&self) -> Vec<TorrentItem> {
        self.items()
            .filter(|item| item.privacy == crate::models::Privacy::Public)
            .cloned()
            .collect()
    }

    /// Merge one provider's bulk-check response into the container.
    pub fn update_availability(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        kind: ProviderKind,
        media: &MediaRequest,
    ) {
        if announcements.is_empty() && kind != ProviderKind::Torbox {
            debug!("empty availability response for {kind:?}");
            return;
        }
        match kind {
            ProviderKind::RealDebrid => self.update_direct(announcements, media, "RD"),
            ProviderKind::AllDebrid => self.update_alldebrid(announcements, media),
            ProviderKind::Premiumize => self.update_premiumize(announcements, media),
            ProviderKind::Torbox => self.update_torbox(announcements, media),
            ProviderKind::Aggregator => self.update_aggregated(announcements, media),
        }
    }

    fn update_direct(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        media: &MediaRequest,
        code: &str,
    ) {
        for (hash, announcement) in announcements {
            let Some(item) = self.items.get_mut(&hash.to_ascii_lowercase()) else {
                warn!("announcement for unknown hash {hash} from {code}");
                continue;
            };
            if !announcement.cached {
                continue;
            }
            let selected = Self::pick_file(&announcement.files, media);
            item.availability = AvailabilityCode::direct(code);
            item.is_cached = true;
            if let Some(file) = selected {
                item.select_file(file.file_index, &file.file_name, file.size_bytes);
            }
        }
    }

    /// AllDebrid: a returned hash is instantly playable regardless of
    /// file details; availability is never downgraded on absence.
    fn update_alldebrid(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        media: &MediaRequest,
    ) {
        for (hash, announcement) in announcements {
            let Some(item) = self.items.get_mut(&hash.to_ascii_lowercase()) else {
                continue;
            };
            item.availability = AvailabilityCode::direct("AD");
            item.is_cached = true;
            if let Some(file) = Self::pick_file(&announcement.files, media) {
                item.select_file(file.file_index, &file.file_name, file.size_bytes);
            }
        }
    }

    /// Premiumize: presence only means the provider accepts the torrent;
    /// `pm_cached` carries the "instantly playable" verdict separately.
    fn update_premiumize(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        media: &MediaRequest,
    ) {
        for (hash, announcement) in announcements {
            let Some(item) = self.items.get_mut(&hash.to_ascii_lowercase()) else {
                continue;
            };
            item.availability = AvailabilityCode::direct("PM");
            item.pm_cached = Some(announcement.cached);
            if announcement.cached {
                let from_index = Self::match_full_index(item, media);
                if let Some((index, name, size)) = from_index {
                    item.select_file(index, &name, size);
                } else if let Some(file) = Self::pick_file(&announcement.files, media) {
                    item.select_file(file.file_index, &file.file_name, file.size_bytes);
                }
            }
        }
    }

    /// TorBox: the response is authoritative for the whole batch. Hashes
    /// it does not return are unavailable there; their earlier TB marker
    /// (if any) is cleared, other providers' codes are left alone.
    fn update_torbox(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        media: &MediaRequest,
    ) {
        for (hash, announcement) in announcements {
            let Some(item) = self.items.get_mut(&hash.to_ascii_lowercase()) else {
                continue;
            };
            item.availability = AvailabilityCode::direct("TB");
            item.tb_cached = Some(announcement.cached);
            if let Some(file) = Self::pick_file(&announcement.files, media) {
                item.select_file(file.file_index, &file.file_name, file.size_bytes);
            }
        }
        for hash in self.order.clone() {
            if announcements.contains_key(&hash) {
                continue;
            }
            if let Some(item) = self.items.get_mut(&hash) {
                if item.availability.as_str() == "TB" {
                    item.availability = AvailabilityCode::empty();
                    item.tb_cached = None;
                }
            }
        }
    }

    /// Aggregator: per-file cached flags; non-cached items are kept and
    /// flagged so the client still sees a "download required" entry.
    fn update_aggregated(
        &mut self,
        announcements: &HashMap<String, AvailabilityAnnouncement>,
        media: &MediaRequest,
    ) {
        for (hash, announcement) in announcements {
            let Some(item) = self.items.get_mut(&hash.to_ascii_lowercase()) else {
                warn!(
                    "aggregator announcement for unknown hash {hash} (store {})",
                    announcement.store
                );
                continue;
            };
            let Some(store) = StoreName::parse(&announcement.store) else {
                warn!("unknown aggregator store '{}'", announcement.store);
                continue;
            };
            item.availability = AvailabilityCode::aggregated(store);
            item.is_cached = announcement.cached;
            item.always_show = true;
            if let Some(file) = Self::pick_file(&announcement.files, media) {
                item.select_file(file.file_index, &file.file_name, file.size_bytes);
            }
        }
    }

    /// Items worth presenting: direct-torrentable with a known file,
    /// magnet-backed with an identified file, or force-shown. Series
    /// items without a selected file get one last matching attempt
    /// against their full index.
    pub fn best_matching(&mut self, media: &MediaRequest) -> Vec<TorrentItem> {
        let hashes = self.order.clone();
        let mut matching = Vec::new();
        for hash in hashes {
            let Some(item) = self.items.get_mut(&hash) else {
                continue;
            };
            if media.is_series() && item.file_index.is_none() {
                if let Some((index, name, size)) = Self::match_full_index(item, media) {
                    item.select_file(index, &name, size);
                }
            }
            let direct_torrentable =
                item.torrent_file_url.is_some() && item.file_index.is_some();
            let magnet_with_file = item.magnet_uri().is_some() && item.file_index.is_some();
            if direct_torrentable || magnet_with_file || item.always_show {
                matching.push(item.clone());
            }
        }
        debug!(
            "best_matching: {} of {} items kept ({} not cached)",
            matching.len(),
            self.items.len(),
            matching.iter().filter(|i| !i.is_cached).count()
        );
        matching
    }

    /// Largest file of the full index whose season/episode lists contain
    /// the target episode.
    fn match_full_index(
        item: &TorrentItem,
        media: &MediaRequest,
    ) -> Option<(u32, String, u64)> {
        let (season, episode) = media.season_episode()?;
        let full_index = item.full_index.as_ref()?;
        full_index
            .iter()
            .filter(|f| f.seasons.contains(&season) && f.episodes.contains(&episode))
            .max_by_key(|f| f.size_bytes)
            .map(|f| (f.file_index, f.file_name.clone(), f.size_bytes))
    }

    /// Series pick the episode's file; movies the largest one.
    fn pick_file(files: &[AnnouncedFile], media: &MediaRequest) -> Option<FileCandidate> {
        if files.is_empty() {
            return None;
        }
        let candidates: Vec<FileCandidate> = files
            .iter()
            .map(|f| FileCandidate {
                file_index: f.file_index,
                file_name: f.file_name.clone(),
                size_bytes: f.size_bytes,
            })
            .collect();
        match media.season_episode() {
            Some((season, episode)) => {
                select_episode_file(&candidates, season, episode).cloned()
            }
            None => candidates.into_iter().max_by_key(|f| f.size_bytes),
        }
    }
}
