//! Search orchestration
//!
//! Two-tier cached search with single-flight locking. The descriptor
//! cache (`stream:*`) serves repeat requests directly, after a
//! post-processing pass that upgrades entries whose torrent resolved
//! successfully since. The unfiltered result cache (`media:*`) spares
//! the indexers; it is only refilled under the per-key search lock.

use crate::builder::StreamDescriptorBuilder;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use streamarr_core::container::TorrentSmartContainer;
use streamarr_core::keys;
use streamarr_core::models::{
    MediaRequest, Privacy, RawResult, StreamDescriptor, TorrentItem, UserConfig,
};
use streamarr_core::traits::{CacheStore, DebridSelector, IndexerSelector};
use streamarr_core::{Result, StreamarrError};
use streamarr_ranking::{sort_items, LanguagePriorityFilter, ResultsPerQualityFilter, SortMode};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// End-to-end deadline for a foreground search
    pub search_deadline: Duration,
    /// Deadline for the next-episode background pre-fetch
    pub prefetch_deadline: Duration,
    pub lock_poll_interval: Duration,
    pub lock_poll_attempts: u32,
    pub prefetch_enabled: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            search_deadline: Duration::from_secs(30),
            prefetch_deadline: Duration::from_secs(8),
            lock_poll_interval: Duration::from_secs(1),
            lock_poll_attempts: 30,
            prefetch_enabled: true,
        }
    }
}

#[derive(Clone)]
pub struct SearchOrchestrator {
    cache: Arc<dyn CacheStore>,
    indexers: Arc<dyn IndexerSelector>,
    debrids: Arc<dyn DebridSelector>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        indexers: Arc<dyn IndexerSelector>,
        debrids: Arc<dyn DebridSelector>,
        settings: SearchSettings,
    ) -> Self {
        SearchOrchestrator {
            cache,
            indexers,
            debrids,
            settings,
        }
    }

    pub async fn search(
        &self,
        media: &MediaRequest,
        config: &UserConfig,
        client_ip: &str,
    ) -> Result<Vec<StreamDescriptor>> {
        let descriptors = self.search_inner(media, config, client_ip).await?;

        if self.settings.prefetch_enabled {
            if let Some(next) = media.next_episode() {
                self.spawn_prefetch(next, config.clone(), client_ip.to_string());
            }
        }
        Ok(descriptors)
    }

    async fn search_inner(
        &self,
        media: &MediaRequest,
        config: &UserConfig,
        client_ip: &str,
    ) -> Result<Vec<StreamDescriptor>> {
        let user = config.user_identifier(client_ip);
        let stream_key = keys::stream_key(&user, media);

        let invalidated = self.invalidation_pending(media).await;
        if !invalidated {
            if let Some(descriptors) = self
                .cache
                .as_ref()
                .get_json::<Vec<StreamDescriptor>>(&stream_key)
                .await?
            {
                debug!("stream cache hit for {stream_key}");
                return self.post_process(descriptors, &stream_key).await;
            }
        }

        let lock_key = keys::search_lock_key(&stream_key);
        if !self.cache.try_lock(&lock_key, keys::LOCK_TTL).await? {
            return self.await_other_searcher(&stream_key).await;
        }

        let outcome = tokio::time::timeout(
            self.settings.search_deadline,
            self.run_pipeline(media, config, client_ip, &stream_key),
        )
        .await;
        self.cache.unlock(&lock_key).await.ok();

        match outcome {
            Ok(result) => result,
            Err(_) => Err(StreamarrError::Timeout {
                operation: "search".to_string(),
            }),
        }
    }

    /// Someone else holds the search lock; poll for their result.
    async fn await_other_searcher(&self, stream_key: &str) -> Result<Vec<StreamDescriptor>> {
        for _ in 0..self.settings.lock_poll_attempts {
            tokio::time::sleep(self.settings.lock_poll_interval).await;
            if let Some(descriptors) = self
                .cache
                .as_ref()
                .get_json::<Vec<StreamDescriptor>>(stream_key)
                .await?
            {
                debug!("picked up {stream_key} from concurrent search");
                return Ok(descriptors);
            }
        }
        Err(StreamarrError::ServiceBusy {
            operation: "search".to_string(),
        })
    }

    async fn invalidation_pending(&self, media: &MediaRequest) -> bool {
        let cache = self.cache.as_ref();
        if cache
            .exists(&keys::force_refresh_key())
            .await
            .unwrap_or(false)
        {
            info!("global refresh flag set, bypassing stream cache");
            return true;
        }
        if cache
            .exists(&keys::imdb_update_key(media.imdb_id()))
            .await
            .unwrap_or(false)
        {
            return true;
        }
        let media_flag = keys::media_update_key(&keys::media_key(media));
        if cache.exists(&media_flag).await.unwrap_or(false) {
            cache.delete(&media_flag).await.ok();
            return true;
        }
        false
    }

    /// Upgrade cached descriptors whose torrent resolved successfully
    /// since the list was built, and rewrite the cache when anything
    /// changed.
    async fn post_process(
        &self,
        mut descriptors: Vec<StreamDescriptor>,
        stream_key: &str,
    ) -> Result<Vec<StreamDescriptor>> {
        let mut changed = false;
        for descriptor in descriptors.iter_mut() {
            let (Some(service), Some(info_hash)) = (
                descriptor.service.clone(),
                descriptor.info_hash.clone(),
            ) else {
                continue;
            };
            if service == "DL" {
                continue;
            }
            let provider_code = service.strip_prefix("ST:").unwrap_or(&service);
            let working_key = keys::working_key(provider_code, &info_hash);
            if !self.cache.exists(&working_key).await.unwrap_or(false) {
                continue;
            }
            let prefix = format!("⚡{service}+");
            if !descriptor.name.starts_with(&prefix) {
                *descriptor = descriptor.with_prefix(&prefix);
                changed = true;
                info!("upgraded descriptor for {info_hash} via {working_key}");
            }
            // Keep the marker alive while the stream stays in rotation
            self.cache
                .set_raw(&working_key, "1", keys::WORKING_TTL)
                .await
                .ok();
        }
        if changed {
            self.cache
                .as_ref()
                .set_json(stream_key, &descriptors, keys::STREAM_REFRESH_TTL)
                .await
                .ok();
        }
        Ok(descriptors)
    }

    async fn run_pipeline(
        &self,
        media: &MediaRequest,
        config: &UserConfig,
        client_ip: &str,
        stream_key: &str,
    ) -> Result<Vec<StreamDescriptor>> {
        let media_key = keys::media_key(media);
        let raw_results: Vec<RawResult> = match self
            .cache
            .as_ref()
            .get_json::<Vec<RawResult>>(&media_key)
            .await?
        {
            Some(results) => {
                info!("media cache hit: {} raw results", results.len());
                results
            }
            None => {
                let results = self.query_indexers(media, config).await;
                self.cache
                    .as_ref()
                    .set_json(&media_key, &results, keys::MEDIA_TTL)
                    .await
                    .ok();
                results
            }
        };

        let mut items: Vec<TorrentItem> = raw_results
            .iter()
            .cloned()
            .map(|raw| TorrentItem::from_raw(raw, media.kind()))
            .collect();
        LanguagePriorityFilter::apply(&mut items);
        let mut container = TorrentSmartContainer::new(items);

        self.fan_out_availability(&mut container, media, config, client_ip)
            .await;

        if config.cache {
            let public: Vec<RawResult> = raw_results
                .iter()
                .filter(|r| r.privacy == Privacy::Public)
                .cloned()
                .collect();
            if !public.is_empty() {
                self.cache
                    .as_ref()
                    .set_json(&keys::public_cache_key(media), &public, keys::MEDIA_TTL)
                    .await
                    .ok();
            }
        }

        let sort_mode = SortMode::parse(&config.sort);
        let mut best = container.best_matching(media);
        sort_items(&mut best, sort_mode);
        let best = ResultsPerQualityFilter::new(config.results_per_quality, sort_mode).apply(best);

        let builder = StreamDescriptorBuilder::new(config)?;
        let descriptors = builder.build(&best, media);

        self.cache
            .as_ref()
            .set_json(stream_key, &descriptors, keys::stream_ttl(config))
            .await
            .ok();
        info!(
            "search pipeline produced {} descriptors for {}",
            descriptors.len(),
            media.imdb_id()
        );
        Ok(descriptors)
    }

    /// Indexers run in priority order; the next one is only consulted
    /// while the result floor is unmet. Short hashes are discarded and
    /// duplicates dropped across indexers.
    async fn query_indexers(&self, media: &MediaRequest, config: &UserConfig) -> Vec<RawResult> {
        let floor = config.min_cached_results as usize;
        let mut collected: Vec<RawResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut any_ran = false;

        for indexer in self.indexers.for_config(config) {
            if any_ran && collected.len() >= floor {
                break;
            }
            any_ran = true;
            match indexer.search(media).await {
                Ok(results) => {
                    let found = results.len();
                    for mut result in results {
                        result.info_hash = result.info_hash.to_ascii_lowercase();
                        if !result.has_valid_hash() {
                            continue;
                        }
                        if seen.insert(result.info_hash.clone()) {
                            collected.push(result);
                        }
                    }
                    info!(
                        "indexer {}: {found} results, {} total after dedup",
                        indexer.name(),
                        collected.len()
                    );
                }
                Err(e) => {
                    warn!("indexer {} failed, continuing: {e}", indexer.name());
                }
            }
        }
        collected
    }

    /// Concurrent availability fan-out; each provider response merges
    /// through the container's per-kind rules. A provider failure only
    /// reduces the result set.
    async fn fan_out_availability(
        &self,
        container: &mut TorrentSmartContainer,
        media: &MediaRequest,
        config: &UserConfig,
        client_ip: &str,
    ) {
        let hashes = container.unresolved_hashes();
        if hashes.is_empty() {
            return;
        }
        let clients = self.debrids.all_for(config);
        let checks = clients.iter().map(|client| {
            let hashes = hashes.clone();
            async move {
                let result = client
                    .check_availability_bulk(&hashes, Some(client_ip))
                    .await;
                (client.code(), client.provider_kind(), result)
            }
        });
        for (code, kind, result) in join_all(checks).await {
            match result {
                Ok(announcements) => {
                    debug!("{code}: {} announcements", announcements.len());
                    container.update_availability(&announcements, kind, media);
                }
                Err(e) => warn!("{code}: availability check failed: {e}"),
            }
        }
    }

    fn spawn_prefetch(&self, media: MediaRequest, config: UserConfig, client_ip: String) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let deadline = orchestrator.settings.prefetch_deadline;
            let result = tokio::time::timeout(
                deadline,
                orchestrator.search_inner(&media, &config, &client_ip),
            )
            .await;
            match result {
                Ok(Ok(descriptors)) => debug!(
                    "pre-fetched {} descriptors for next episode",
                    descriptors.len()
                ),
                Ok(Err(e)) => debug!("next-episode pre-fetch failed: {e}"),
                Err(_) => debug!("next-episode pre-fetch timed out after {deadline:?}"),
            }
        });
    }
}
