//! Playback resolution
//!
//! Resolves a decoded playback query to a direct URL. Concurrent
//! requests for the same query single-flight on a distributed lock;
//! the losers poll the link cache. The download service runs a small
//! state machine over Redis flags:
//!
//! ```text
//!   NEW -> IN_PROGRESS -> READY -> (expired) -> NEW
//!              |
//!              +--(error)-> NEW
//! ```

use std::sync::Arc;
use streamarr_core::keys;
use streamarr_core::models::{PlaybackQuery, UserConfig};
use streamarr_core::traits::{CacheStore, DebridClient, DebridSelector};
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, info, warn};

pub struct PlaybackResolver {
    cache: Arc<dyn CacheStore>,
    debrids: Arc<dyn DebridSelector>,
    /// Well-known "content not ready yet" video
    placeholder_url: String,
    lock_poll_interval: std::time::Duration,
    lock_poll_attempts: u32,
}

impl PlaybackResolver {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        debrids: Arc<dyn DebridSelector>,
        placeholder_url: String,
    ) -> Self {
        PlaybackResolver {
            cache,
            debrids,
            placeholder_url,
            lock_poll_interval: std::time::Duration::from_secs(1),
            lock_poll_attempts: 30,
        }
    }

    pub fn with_poll_policy(
        mut self,
        interval: std::time::Duration,
        attempts: u32,
    ) -> Self {
        self.lock_poll_interval = interval;
        self.lock_poll_attempts = attempts;
        self
    }

    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    /// Resolve a playback query. `decoded_query` is the exact JSON the
    /// client carried; cache keys and locks are derived from it.
    pub async fn resolve(
        &self,
        config: &UserConfig,
        query: &PlaybackQuery,
        decoded_query: &str,
        client_ip: &str,
    ) -> Result<String> {
        let user = config.user_identifier(client_ip);
        if query.service == "DL" {
            return self.resolve_download(config, query, decoded_query, &user, client_ip).await;
        }

        let link_key = keys::stream_link_key(&user, decoded_query);
        let lock_key = keys::stream_lock_key(&user, decoded_query);
        // Binge sessions pin the service that already delivered this
        // torrent: consecutive episodes of a pack share the info hash,
        // so they share the pin.
        let pin_key = query
            .resolved_info_hash()
            .map(|hash| keys::current_source_key(&user, &format!("stream-{hash}"), &query.service));

        if self.cache.try_lock(&lock_key, keys::LOCK_TTL).await? {
            let outcome = self
                .resolve_under_lock(config, query, &link_key, pin_key.as_deref(), client_ip)
                .await;
            self.cache.unlock(&lock_key).await.ok();
            return outcome;
        }

        // Another request is resolving the same query; wait on its result
        for _ in 0..self.lock_poll_attempts {
            tokio::time::sleep(self.lock_poll_interval).await;
            if let Some(link) = self.cache.get_raw(&link_key).await? {
                debug!("picked up stream link from concurrent resolution");
                return Ok(link);
            }
        }
        Err(StreamarrError::ServiceBusy {
            operation: "playback".to_string(),
        })
    }

    async fn resolve_under_lock(
        &self,
        config: &UserConfig,
        query: &PlaybackQuery,
        link_key: &str,
        pin_key: Option<&str>,
        client_ip: &str,
    ) -> Result<String> {
        if let Some(link) = self.cache.get_raw(link_key).await? {
            debug!("stream link cache hit");
            self.mark_working(query, &query.service).await;
            return Ok(link);
        }

        // A pinned source from an earlier episode wins over the service
        // the descriptor was built with; fall back when its client can
        // no longer be constructed.
        let mut service = query.service.clone();
        if let Some(pin_key) = pin_key {
            if let Some(pinned) = self.cache.get_raw(pin_key).await? {
                if pinned != service {
                    debug!("binge pin: resolving via {pinned} instead of {service}");
                }
                service = pinned;
            }
        }
        let client = match self.debrids.for_service(config, &service) {
            Ok(client) => client,
            Err(e) if service != query.service => {
                debug!("pinned service {service} unusable ({e}), using {}", query.service);
                self.debrids.for_service(config, &query.service)?
            }
            Err(e) => return Err(e),
        };

        match client.get_stream_link(query, Some(client_ip)).await {
            Ok(Some(link)) => {
                self.cache
                    .set_raw(link_key, &link, keys::STREAM_LINK_TTL)
                    .await
                    .ok();
                if let Some(pin_key) = pin_key {
                    self.cache
                        .set_raw(pin_key, &client.code(), keys::CURRENT_SOURCE_TTL)
                        .await
                        .ok();
                }
                self.mark_working(query, &client.code()).await;
                info!("resolved stream link via {}", client.code());
                Ok(link)
            }
            Ok(None) => {
                debug!("{} returned no link yet", client.code());
                Ok(self.placeholder_url.clone())
            }
            // Provider failures reduce to the placeholder, never to a 5xx
            Err(
                e @ (StreamarrError::InvalidRequest { .. }
                | StreamarrError::Unauthorized
                | StreamarrError::ConfigurationError { .. }),
            ) => Err(e),
            Err(e) => {
                warn!("provider error during resolution: {e}");
                Ok(self.placeholder_url.clone())
            }
        }
    }

    /// Download-service flow: kick the provider once and answer with
    /// the placeholder until the content turns playable.
    async fn resolve_download(
        &self,
        config: &UserConfig,
        query: &PlaybackQuery,
        decoded_query: &str,
        user: &str,
        client_ip: &str,
    ) -> Result<String> {
        let query_hash = keys::hash16(decoded_query);
        let download_key = keys::download_key(user, &query_hash);
        let ready_key = keys::ready_key(user, &query_hash);
        let direct_key = keys::direct_link_key(user, &query_hash);

        let downloader = self.debrids.downloader_for(config)?;

        if self.cache.get_raw(&ready_key).await?.as_deref() == Some(keys::READY) {
            if let Some(link) = self.cache.get_raw(&direct_key).await? {
                return Ok(link);
            }
            // READY but the link expired; resolve again
            if let Some(link) = self.try_stream_link(&downloader, query, client_ip).await {
                self.cache
                    .set_raw(&direct_key, &link, keys::DIRECT_LINK_TTL)
                    .await
                    .ok();
                self.cache
                    .set_raw(&ready_key, keys::READY, keys::READY_TTL)
                    .await
                    .ok();
                return Ok(link);
            }
            return Ok(self.placeholder_url.clone());
        }

        if self.cache.get_raw(&download_key).await?.as_deref() == Some(keys::IN_PROGRESS) {
            // Probe once; promote to READY when the content landed
            if let Some(link) = self.try_stream_link(&downloader, query, client_ip).await {
                self.cache.delete(&download_key).await.ok();
                self.cache
                    .set_raw(&ready_key, keys::READY, keys::READY_TTL)
                    .await
                    .ok();
                self.cache
                    .set_raw(&direct_key, &link, keys::DIRECT_LINK_TTL)
                    .await
                    .ok();
                self.mark_working(query, &downloader.code()).await;
                info!("download completed, direct link cached");
                return Ok(link);
            }
            debug!("download still in progress");
            return Ok(self.placeholder_url.clone());
        }

        // NEW: flag the download and kick the provider
        self.cache
            .set_raw(&download_key, keys::IN_PROGRESS, keys::DOWNLOAD_FLAG_TTL)
            .await?;
        let started = self.start_download(&downloader, query, client_ip).await;
        if let Err(e) = started {
            self.cache.delete(&download_key).await.ok();
            warn!("failed to start download: {e}");
        }
        Ok(self.placeholder_url.clone())
    }

    async fn start_download(
        &self,
        downloader: &Arc<dyn DebridClient>,
        query: &PlaybackQuery,
        client_ip: &str,
    ) -> Result<()> {
        let magnet = query
            .magnet
            .clone()
            .or_else(|| query.resolved_info_hash().map(|h| format!("magnet:?xt=urn:btih:{h}")))
            .ok_or_else(|| StreamarrError::InvalidRequest {
                message: "download query carries no magnet or hash".to_string(),
            })?;
        if downloader.start_background_caching(&magnet).await {
            info!("background caching started via {}", downloader.code());
            return Ok(());
        }
        downloader.add_magnet(&magnet, Some(client_ip)).await?;
        info!("magnet queued via {}", downloader.code());
        Ok(())
    }

    async fn try_stream_link(
        &self,
        downloader: &Arc<dyn DebridClient>,
        query: &PlaybackQuery,
        client_ip: &str,
    ) -> Option<String> {
        match downloader.get_stream_link(query, Some(client_ip)).await {
            Ok(link) => link,
            Err(e) => {
                debug!("stream link probe failed: {e}");
                None
            }
        }
    }

    /// Remember that this torrent resolved through this provider so
    /// later searches can upgrade stale descriptors. Aggregator
    /// resolutions additionally trigger one global cache refresh.
    async fn mark_working(&self, query: &PlaybackQuery, service_code: &str) {
        let Some(info_hash) = query.resolved_info_hash() else {
            return;
        };
        let provider_code = service_code.strip_prefix("ST:").unwrap_or(service_code);
        if provider_code.is_empty() || provider_code == "DL" {
            return;
        }
        self.cache
            .set_raw(
                &keys::working_key(provider_code, &info_hash),
                "1",
                keys::WORKING_TTL,
            )
            .await
            .ok();
        if service_code.starts_with("ST:") {
            self.cache
                .set_raw(&keys::force_refresh_key(), "1", keys::FORCE_REFRESH_TTL)
                .await
                .ok();
        }
    }
}
