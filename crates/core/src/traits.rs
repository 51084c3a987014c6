//! Capability traits implemented by the provider crates
//!
//! The pipeline is written against these traits so orchestration can be
//! tested with in-memory doubles and the concrete provider clients stay
//! swappable.

use crate::error::Result;
use crate::models::{
    AvailabilityAnnouncement, MediaRequest, PlaybackQuery, RawResult, UserConfig,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Which reconciliation rules the container applies to a client's
/// availability announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    RealDebrid,
    AllDebrid,
    Premiumize,
    Torbox,
    Aggregator,
}

/// Result of adding a magnet to a provider
#[derive(Debug, Clone)]
pub struct MagnetAdd {
    pub id: String,
    pub files: Vec<crate::parsing::FileCandidate>,
}

/// The debrid capability set.
///
/// Implementations must respect their rate limits, retry transient
/// failures per the shared transport policy, and never panic on partial
/// provider responses.
#[async_trait]
pub trait DebridClient: Send + Sync {
    /// 2-letter display code (`RD`, `AD`, ...) or `ST:XX` for aggregated
    fn code(&self) -> String;

    fn provider_kind(&self) -> ProviderKind;

    /// Bulk cache check. Unknown hashes are simply absent from the map;
    /// partial provider failure returns what was gathered.
    async fn check_availability_bulk(
        &self,
        hashes: &[String],
        client_ip: Option<&str>,
    ) -> Result<HashMap<String, AvailabilityAnnouncement>>;

    /// Add a magnet. Idempotent at the provider level: 200 and 201 are
    /// both success.
    async fn add_magnet(&self, magnet: &str, client_ip: Option<&str>) -> Result<MagnetAdd>;

    /// Resolve a playback query to a time-limited direct URL, or `None`
    /// when the provider has nothing playable yet.
    async fn get_stream_link(
        &self,
        query: &PlaybackQuery,
        client_ip: Option<&str>,
    ) -> Result<Option<String>>;

    /// Optional capability; absence means "no caching needed".
    async fn start_background_caching(&self, _magnet: &str) -> bool {
        false
    }
}

/// Shared indexer contract. Failures are logged by the orchestrator and
/// treated as empty result sets, never fatal.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, media: &MediaRequest) -> Result<Vec<RawResult>>;
}

/// Builds the per-request debrid client set from the user configuration.
pub trait DebridSelector: Send + Sync {
    /// Every configured client, aggregator first when enabled
    fn all_for(&self, config: &UserConfig) -> Vec<Arc<dyn DebridClient>>;

    /// The client for a playback service code (`RD`, `ST:AD`, ...)
    fn for_service(&self, config: &UserConfig, service: &str) -> Result<Arc<dyn DebridClient>>;

    /// The client the download flow should use
    fn downloader_for(&self, config: &UserConfig) -> Result<Arc<dyn DebridClient>>;
}

/// Builds the per-request indexer pipeline, in priority order.
pub trait IndexerSelector: Send + Sync {
    fn for_config(&self, config: &UserConfig) -> Vec<Arc<dyn IndexerClient>>;
}

/// API-key validation, backed by persistent storage the core does not own.
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    /// `Ok` for an active, unexpired key; `Unauthorized` otherwise.
    async fn validate(&self, api_key: &str) -> Result<()>;
}

/// Key/value store with TTLs and single-instance distributed locks.
///
/// Redis in production; the in-memory implementation backs tests. All
/// cross-request coordination goes through this trait.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// SETNX + TTL. `true` when this caller owns the lock.
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Must tolerate "already released / expired" without error.
    async fn unlock(&self, key: &str) -> Result<()>;
}

impl dyn CacheStore {
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            None => Ok(None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::debug!("discarding undeserializable cache entry {key}: {e}");
                    Ok(None)
                }
            },
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| crate::StreamarrError::CacheError {
            message: format!("serialization failed for {key}: {e}"),
        })?;
        self.set_raw(key, &raw, ttl).await
    }
}
