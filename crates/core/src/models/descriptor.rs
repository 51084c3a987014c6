//! Stream descriptors
//!
//! The user-facing output of a search. Descriptors are cached as-is under
//! the stream key, so they keep the fields (`info_hash`, `service`) the
//! post-processing pass needs to upgrade stale entries; the API layer owns
//! the wire representation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Display name; first line is the availability prefix, second the
    /// resolution tag
    pub name: String,

    /// Multi-line description block
    pub description: String,

    /// Playback URL for debrid-backed entries
    #[serde(default)]
    pub url: Option<String>,

    /// Identity of the underlying torrent
    #[serde(default)]
    pub info_hash: Option<String>,

    /// Selected file for direct-torrent entries
    #[serde(default)]
    pub file_index: Option<u32>,

    /// Availability code this descriptor was built with
    #[serde(default)]
    pub service: Option<String>,

    /// Links consecutive episodes of the same torrent for autoplay
    pub binge_group: String,

    pub filename: String,
}

impl StreamDescriptor {
    /// Replace the first display line, keeping the resolution tag.
    pub fn with_prefix(&self, prefix: &str) -> StreamDescriptor {
        let rest = self.name.split_once('\n').map(|(_, r)| r).unwrap_or("");
        let name = if rest.is_empty() {
            prefix.to_string()
        } else {
            format!("{prefix}\n{rest}")
        };
        StreamDescriptor {
            name,
            ..self.clone()
        }
    }

    /// Whether the first display line advertises instant availability
    pub fn is_instant(&self) -> bool {
        self.name.starts_with('⚡')
    }
}
