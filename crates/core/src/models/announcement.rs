//! Per-hash availability announcements returned by debrid queries

use serde::{Deserialize, Serialize};

/// A file reported by a debrid provider for a given torrent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncedFile {
    pub file_index: u32,
    pub file_name: String,
    pub size_bytes: u64,
}

/// The per-hash result of a bulk availability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityAnnouncement {
    pub info_hash: String,

    /// Files the provider reported; may be empty even for cached hashes
    #[serde(default)]
    pub files: Vec<AnnouncedFile>,

    /// Whether the provider holds a playable copy right now. Presence of
    /// the announcement alone does not imply this for every provider.
    pub cached: bool,

    /// Internal store name the announcement came from
    pub store: String,
}

impl AvailabilityAnnouncement {
    pub fn largest_file(&self) -> Option<&AnnouncedFile> {
        self.files.iter().max_by_key(|f| f.size_bytes)
    }
}
