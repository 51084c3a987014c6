//! Cache key derivation and TTL policy
//!
//! All Redis keys used by the pipeline are built here so the layout of
//! shared state stays in one place. Media and stream keys are 16-hex
//! SHA-256 digests of the request identity.

use crate::models::{MediaRequest, UserConfig};
use sha2::{Digest, Sha256};
use std::time::Duration;

pub const MEDIA_TTL: Duration = Duration::from_secs(24 * 3600);
pub const STREAM_TTL: Duration = Duration::from_secs(20 * 60);
pub const STREAM_TTL_AGGREGATOR: Duration = Duration::from_secs(10 * 60);
pub const STREAM_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
pub const CURRENT_SOURCE_TTL: Duration = Duration::from_secs(20 * 60);
pub const DOWNLOAD_FLAG_TTL: Duration = Duration::from_secs(10 * 60);
pub const READY_TTL: Duration = Duration::from_secs(5 * 60);
pub const DIRECT_LINK_TTL: Duration = Duration::from_secs(10 * 60);
pub const STREAM_LINK_TTL: Duration = Duration::from_secs(20 * 60);
pub const WORKING_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
pub const FORCE_REFRESH_TTL: Duration = Duration::from_secs(60);
pub const LOCK_TTL: Duration = Duration::from_secs(60);

pub const IN_PROGRESS: &str = "IN_PROGRESS";
pub const READY: &str = "READY";

pub fn hash16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

fn media_identity(media: &MediaRequest) -> String {
    let language = media.languages().first().map(String::as_str).unwrap_or("");
    match media {
        MediaRequest::Movie { id, year, .. } => {
            format!("{id}:{}:{language}", year.unwrap_or(0))
        }
        MediaRequest::SeriesEpisode { id, season, .. } => {
            // The unfiltered media cache is shared across a season: every
            // episode of a pack reuses the same indexer results.
            format!("{id}:{language}:S{season:02}")
        }
    }
}

/// Unfiltered result set for a media identity (24 h)
pub fn media_key(media: &MediaRequest) -> String {
    format!("media:{}", hash16(&media_identity(media)))
}

/// Final descriptor list for a user and media (20 m / 10 m)
pub fn stream_key(user: &str, media: &MediaRequest) -> String {
    let identity = match media {
        MediaRequest::Movie { .. } => format!("{user}:{}", media_identity(media)),
        MediaRequest::SeriesEpisode {
            id,
            season,
            episode,
            ..
        } => {
            let language = media.languages().first().map(String::as_str).unwrap_or("");
            format!("{user}:{id}:{language}:S{season:02}E{episode:02}")
        }
    };
    format!("stream:{}", hash16(&identity))
}

pub fn search_lock_key(stream_key: &str) -> String {
    format!("lock:search:{stream_key}")
}

pub fn stream_link_key(user: &str, decoded_query: &str) -> String {
    format!("stream_link:{user}:{decoded_query}")
}

pub fn stream_lock_key(user: &str, decoded_query: &str) -> String {
    format!("lock:stream:{user}:{decoded_query}")
}

pub fn download_key(user: &str, query_hash: &str) -> String {
    format!("download:{user}:{query_hash}")
}

pub fn ready_key(user: &str, query_hash: &str) -> String {
    format!("ready:{user}:{query_hash}")
}

pub fn direct_link_key(user: &str, query_hash: &str) -> String {
    format!("direct_link:{user}:{query_hash}")
}

/// Marker that a link for this hash resolved successfully (7 d)
pub fn working_key(store_code: &str, info_hash: &str) -> String {
    format!(
        "working:{}:{}",
        store_code.to_ascii_lowercase(),
        info_hash.to_ascii_lowercase()
    )
}

pub fn force_refresh_key() -> String {
    "force_refresh:all".to_string()
}

pub fn media_update_key(media_key: &str) -> String {
    format!("global_update_needed:{media_key}")
}

/// Best-effort invalidation hint written on working-link detection
pub fn imdb_update_key(imdb_id: &str) -> String {
    format!("imdb_update:{imdb_id}")
}

/// Community cache of public torrents for a media identity
pub fn public_cache_key(media: &MediaRequest) -> String {
    format!("public:{}", hash16(&media_identity(media)))
}

/// Binge-group source pinning (20 m)
pub fn current_source_key(user: &str, stream_id: &str, service: &str) -> String {
    format!("current_source:{user}:{stream_id}:{service}")
}

/// Which stream TTL applies, given the configured services
pub fn stream_ttl(config: &UserConfig) -> Duration {
    if config.has_aggregator() {
        STREAM_TTL_AGGREGATOR
    } else {
        STREAM_TTL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(episode: u32) -> MediaRequest {
        MediaRequest::SeriesEpisode {
            id: "tt0903747".to_string(),
            titles: vec![],
            season: 1,
            episode,
            languages: vec!["fr".to_string()],
        }
    }

    #[test]
    fn test_hash16_shape() {
        let digest = hash16("stream:user:tt1:fr:S01E01");
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_media_key_shared_across_episodes() {
        assert_eq!(media_key(&series(1)), media_key(&series(2)));
    }

    #[test]
    fn test_stream_key_distinct_per_episode_and_user() {
        assert_ne!(stream_key("u1", &series(1)), stream_key("u1", &series(2)));
        assert_ne!(stream_key("u1", &series(1)), stream_key("u2", &series(1)));
    }

    #[test]
    fn test_working_key_lowercased() {
        assert_eq!(working_key("AD", "ABCDEF"), "working:ad:abcdef");
    }
}
