//! Zilean (DMM) aggregated-database indexer
//!
//! Zilean indexes Debrid Media Manager hash lists, so its results are
//! the most likely to be cached at the debrid providers and run first
//! in the pipeline. Responses are cached per instance for 15 minutes;
//! this cache is process-local and never authoritative.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use streamarr_core::models::{MediaRequest, Privacy, RawResult};
use streamarr_core::retry::{with_retries, RetrySchedule};
use streamarr_core::traits::IndexerClient;
use streamarr_core::{Result, StreamarrError};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

const LOCAL_CACHE_TTL: Duration = Duration::from_secs(900);
const INDEXER_NAME: &str = "zilean";

pub struct ZileanClient {
    client: reqwest::Client,
    base_url: String,
    cache: Mutex<HashMap<String, (Instant, Vec<RawResult>)>>,
}

impl ZileanClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        ZileanClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn query_text(media: &MediaRequest) -> String {
        match media {
            MediaRequest::Movie { id, titles, .. }
            | MediaRequest::SeriesEpisode { id, titles, .. } => titles
                .first()
                .cloned()
                .unwrap_or_else(|| id.clone()),
        }
    }

    async fn fetch(&self, media: &MediaRequest) -> Result<Vec<Value>> {
        let query = Self::query_text(media);
        let response = match media.season_episode() {
            Some((season, episode)) => {
                let url = format!(
                    "{}/dmm/filtered?query={}&season={season}&episode={episode}",
                    self.base_url,
                    urlencoding::encode(&query)
                );
                self.client
                    .get(url)
                    .timeout(Duration::from_secs(20))
                    .send()
                    .await
            }
            None => {
                self.client
                    .post(format!("{}/dmm/search", self.base_url))
                    .timeout(Duration::from_secs(20))
                    .json(&json!({ "queryText": query }))
                    .send()
                    .await
            }
        }
        .map_err(|e| StreamarrError::ProviderTransient {
            service: INDEXER_NAME.to_string(),
            error: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(StreamarrError::ProviderTransient {
                service: INDEXER_NAME.to_string(),
                error: format!("HTTP {}", response.status()),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StreamarrError::ProviderTransient {
                service: INDEXER_NAME.to_string(),
                error: format!("invalid JSON: {e}"),
            })?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    fn to_raw_result(entry: &Value) -> Option<RawResult> {
        let info_hash = entry["info_hash"].as_str()?.to_ascii_lowercase();
        let raw_title = entry["raw_title"].as_str()?.to_string();
        let size_bytes = entry["size"]
            .as_u64()
            .or_else(|| entry["size"].as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(0);
        let languages = entry["languages"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_lowercase))
                    .collect()
            })
            .unwrap_or_default();
        Some(RawResult {
            raw_title,
            info_hash,
            size_bytes,
            magnet: None,
            torrent_file_url: None,
            seeders: 0,
            languages,
            indexer_name: INDEXER_NAME.to_string(),
            privacy: Privacy::Public,
        })
    }

    fn cache_key(media: &MediaRequest) -> String {
        match media.season_episode() {
            Some((season, episode)) => {
                format!("{}:{season}:{episode}", Self::query_text(media))
            }
            None => Self::query_text(media),
        }
    }
}

#[async_trait]
impl IndexerClient for ZileanClient {
    fn name(&self) -> &str {
        INDEXER_NAME
    }

    async fn search(&self, media: &MediaRequest) -> Result<Vec<RawResult>> {
        let key = Self::cache_key(media);
        {
            let cache = self.cache.lock().await;
            if let Some((stored_at, results)) = cache.get(&key) {
                if stored_at.elapsed() < LOCAL_CACHE_TTL {
                    debug!("zilean: local cache hit for {key}");
                    return Ok(results.clone());
                }
            }
        }

        let entries =
            with_retries(&RetrySchedule::indexer(), "zilean search", || self.fetch(media)).await?;

        let results: Vec<RawResult> = entries
            .iter()
            .filter_map(Self::to_raw_result)
            .collect();
        if results.len() < entries.len() {
            warn!(
                "zilean: dropped {} malformed entries",
                entries.len() - results.len()
            );
        }
        debug!("zilean: {} results for {key}", results.len());

        let mut cache = self.cache.lock().await;
        cache.retain(|_, (stored_at, _)| stored_at.elapsed() < LOCAL_CACHE_TTL);
        cache.insert(key, (Instant::now(), results.clone()));
        Ok(results)
    }
}
