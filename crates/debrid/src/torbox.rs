//! TorBox client
//!
//! The cache check response is authoritative for the batch: hashes it
//! omits are not on TorBox at all. The container clears stale `TB`
//! markers for those.

use crate::http::DebridHttp;
use crate::selection::choose_file;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use streamarr_core::models::{AnnouncedFile, AvailabilityAnnouncement, PlaybackQuery};
use streamarr_core::parsing::FileCandidate;
use streamarr_core::traits::{DebridClient, MagnetAdd, ProviderKind};
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.torbox.app/v1/api";
const READY_WAIT: Duration = Duration::from_secs(60);
const READY_INTERVAL: Duration = Duration::from_secs(1);

pub struct TorboxClient {
    http: DebridHttp,
    token: String,
    base_url: String,
}

impl TorboxClient {
    pub fn new(client: reqwest::Client, token: &str) -> Self {
        Self::with_base_url(client, token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, token: &str, base_url: &str) -> Self {
        TorboxClient {
            http: DebridHttp::new(client, "torbox"),
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), format!("Bearer {}", self.token))]
    }

    fn files_from_entry(entry: &Value) -> Vec<AnnouncedFile> {
        entry["files"]
            .as_array()
            .map(|files| {
                files
                    .iter()
                    .enumerate()
                    .map(|(index, file)| AnnouncedFile {
                        file_index: index as u32,
                        file_name: file["name"].as_str().unwrap_or("").to_string(),
                        size_bytes: file["size"].as_u64().unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn find_torrent(&self, torrent_id: u64) -> Result<Option<Value>> {
        let url = format!(
            "{}/torrents/mylist?bypass_cache=true&id={torrent_id}",
            self.base_url
        );
        let response = self.http.get_json(&url, &self.headers()).await?;
        Ok(response.and_then(|v| {
            let data = &v["data"];
            if data.is_array() {
                data.as_array()
                    .and_then(|list| {
                        list.iter()
                            .find(|t| t["id"].as_u64() == Some(torrent_id))
                            .cloned()
                    })
            } else if data.is_object() {
                Some(data.clone())
            } else {
                None
            }
        }))
    }
}

#[async_trait]
impl DebridClient for TorboxClient {
    fn code(&self) -> String {
        "TB".to_string()
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Torbox
    }

    async fn check_availability_bulk(
        &self,
        hashes: &[String],
        _client_ip: Option<&str>,
    ) -> Result<HashMap<String, AvailabilityAnnouncement>> {
        let mut announcements = HashMap::new();
        if hashes.is_empty() {
            return Ok(announcements);
        }
        let url = format!(
            "{}/torrents/checkcached?hash={}&format=object&list_files=true",
            self.base_url,
            hashes.join(",")
        );
        let response = match self.http.get_json(&url, &self.headers()).await {
            Ok(value) => value,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("torbox cache check rejected: {e}");
                return Ok(announcements);
            }
            Err(e) => return Err(e),
        };
        let Some(response) = response else {
            return Ok(announcements);
        };
        if response["success"].as_bool() == Some(false) {
            warn!("torbox API error: {}", response["detail"]);
            return Ok(announcements);
        }
        let Some(data) = response["data"].as_object() else {
            return Ok(announcements);
        };
        for (hash, entry) in data {
            if entry.is_null() {
                continue;
            }
            let hash = hash.to_ascii_lowercase();
            announcements.insert(
                hash.clone(),
                AvailabilityAnnouncement {
                    info_hash: hash,
                    files: Self::files_from_entry(entry),
                    cached: true,
                    store: "torbox".to_string(),
                },
            );
        }
        debug!(
            "torbox: {} of {} hashes cached",
            announcements.len(),
            hashes.len()
        );
        Ok(announcements)
    }

    async fn add_magnet(&self, magnet: &str, _client_ip: Option<&str>) -> Result<MagnetAdd> {
        let response = self
            .http
            .post_form(
                &format!("{}/torrents/createtorrent", self.base_url),
                &self.headers(),
                vec![
                    ("magnet".to_string(), magnet.to_string()),
                    ("seed".to_string(), "1".to_string()),
                    ("allow_zip".to_string(), "false".to_string()),
                ],
            )
            .await?
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "torbox".to_string(),
                error: "empty createtorrent response".to_string(),
            })?;
        let id = response["data"]["torrent_id"]
            .as_u64()
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "torbox".to_string(),
                error: "createtorrent response missing torrent_id".to_string(),
            })?;
        Ok(MagnetAdd {
            id: id.to_string(),
            files: Vec::new(),
        })
    }

    async fn get_stream_link(
        &self,
        query: &PlaybackQuery,
        _client_ip: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(magnet) = query
            .magnet
            .clone()
            .or_else(|| query.resolved_info_hash().map(|h| format!("magnet:?xt=urn:btih:{h}")))
        else {
            return Err(StreamarrError::InvalidRequest {
                message: "playback query carries no magnet or hash".to_string(),
            });
        };

        let added = match self.add_magnet(&magnet, None).await {
            Ok(added) => added,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("torbox rejected magnet: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let torrent_id: u64 = added.id.parse().unwrap_or_default();

        // Wait for the torrent's file listing to land
        let deadline = tokio::time::Instant::now() + READY_WAIT;
        let torrent = loop {
            if let Some(torrent) = self.find_torrent(torrent_id).await? {
                let finished = torrent["download_finished"].as_bool() == Some(true)
                    || torrent["download_present"].as_bool() == Some(true);
                if finished {
                    break Some(torrent);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("torbox torrent {torrent_id} not ready in time");
                break None;
            }
            tokio::time::sleep(READY_INTERVAL).await;
        };
        let Some(torrent) = torrent else {
            return Ok(None);
        };

        let files = torrent["files"].as_array().cloned().unwrap_or_default();
        let candidates: Vec<FileCandidate> = files
            .iter()
            .map(|file| FileCandidate {
                file_index: file["id"].as_u64().unwrap_or(0) as u32,
                file_name: file["name"]
                    .as_str()
                    .or_else(|| file["short_name"].as_str())
                    .unwrap_or("")
                    .to_string(),
                size_bytes: file["size"].as_u64().unwrap_or(0),
            })
            .collect();
        let selected = choose_file(&candidates, query)?;

        let url = format!(
            "{}/torrents/requestdl?token={}&torrent_id={torrent_id}&file_id={}",
            self.base_url, self.token, selected.file_index
        );
        let response = self.http.get_json(&url, &self.headers()).await?;
        Ok(response.and_then(|v| v["data"].as_str().map(String::from)))
    }

    async fn start_background_caching(&self, magnet: &str) -> bool {
        match self.add_magnet(magnet, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!("torbox background caching failed: {e}");
                false
            }
        }
    }
}
