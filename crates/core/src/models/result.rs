//! Raw indexer results
//!
//! The shared shape every indexer implementation returns. Results with an
//! info hash shorter than 40 hex characters are discarded by the
//! orchestrator before they enter the pipeline.

use serde::{Deserialize, Serialize};

/// Tracker privacy of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Private,
}

/// A single item as returned by an indexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    /// Title of the release as published on the tracker
    pub raw_title: String,

    /// 40-hex lowercase info hash, or empty when the indexer only
    /// provided a torrent file URL
    pub info_hash: String,

    /// Size of the release in bytes
    pub size_bytes: u64,

    /// Magnet URI when available
    #[serde(default)]
    pub magnet: Option<String>,

    /// Direct .torrent download URL when available
    #[serde(default)]
    pub torrent_file_url: Option<String>,

    /// Number of seeders
    pub seeders: u32,

    /// Languages advertised by the indexer
    #[serde(default)]
    pub languages: Vec<String>,

    /// Indexer that produced this result
    pub indexer_name: String,

    pub privacy: Privacy,
}

impl RawResult {
    /// A hash is usable only as a full 40-char lowercase hex string.
    pub fn has_valid_hash(&self) -> bool {
        self.info_hash.len() == 40 && self.info_hash.chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_hash(hash: &str) -> RawResult {
        RawResult {
            raw_title: "Some.Movie.2020.1080p".to_string(),
            info_hash: hash.to_string(),
            size_bytes: 1_000,
            magnet: None,
            torrent_file_url: None,
            seeders: 1,
            languages: vec![],
            indexer_name: "test".to_string(),
            privacy: Privacy::Public,
        }
    }

    #[test]
    fn test_hash_validation() {
        assert!(result_with_hash(&"a".repeat(40)).has_valid_hash());
        assert!(!result_with_hash(&"a".repeat(39)).has_valid_hash());
        assert!(!result_with_hash("").has_valid_hash());
        assert!(!result_with_hash(&"z".repeat(40)).has_valid_hash());
    }
}
