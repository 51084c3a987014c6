//! Premiumize client
//!
//! Premiumize distinguishes "accepted" from "instantly playable": the
//! cache check reports presence per hash, and only the transcoded flag
//! means the file can stream right away. The announcement's `cached`
//! carries the transcoded verdict; the container records it as
//! `pm_cached` next to the `PM` availability code.

use crate::http::DebridHttp;
use crate::selection::choose_file;
use async_trait::async_trait;
use std::collections::HashMap;
use streamarr_core::models::{AnnouncedFile, AvailabilityAnnouncement, PlaybackQuery};
use streamarr_core::parsing::FileCandidate;
use streamarr_core::traits::{DebridClient, MagnetAdd, ProviderKind};
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://www.premiumize.me/api";

pub struct PremiumizeClient {
    http: DebridHttp,
    token: String,
    base_url: String,
}

impl PremiumizeClient {
    pub fn new(client: reqwest::Client, token: &str) -> Self {
        Self::with_base_url(client, token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, token: &str, base_url: &str) -> Self {
        PremiumizeClient {
            http: DebridHttp::new(client, "premiumize"),
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}?apikey={}", self.base_url, endpoint, self.token)
    }
}

#[async_trait]
impl DebridClient for PremiumizeClient {
    fn code(&self) -> String {
        "PM".to_string()
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Premiumize
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
        let mut url = self.url("/cache/check");
        for hash in hashes {
            url.push_str(&format!("&items[]={hash}"));
        }
        let response = match self.http.get_json(&url, &[]).await {
            Ok(value) => value,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("premiumize cache check rejected: {e}");
                return Ok(announcements);
            }
            Err(e) => return Err(e),
        };
        let Some(response) = response else {
            return Ok(announcements);
        };
        if response["status"].as_str() != Some("success") {
            warn!("premiumize API error: {response}");
            return Ok(announcements);
        }
        let present = response["response"].as_array().cloned().unwrap_or_default();
        let transcoded = response["transcoded"].as_array().cloned().unwrap_or_default();
        let filenames = response["filename"].as_array().cloned().unwrap_or_default();
        let filesizes = response["filesize"].as_array().cloned().unwrap_or_default();

        for (position, hash) in hashes.iter().enumerate() {
            if present.get(position).and_then(|v| v.as_bool()) != Some(true) {
                continue;
            }
            let cached = transcoded.get(position).and_then(|v| v.as_bool()) == Some(true);
            let mut files = Vec::new();
            if cached {
                if let Some(name) = filenames.get(position).and_then(|v| v.as_str()) {
                    let size = filesizes
                        .get(position)
                        .and_then(|v| {
                            v.as_u64()
                                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                        })
                        .unwrap_or(0);
                    files.push(AnnouncedFile {
                        file_index: 0,
                        file_name: name.to_string(),
                        size_bytes: size,
                    });
                }
            }
            let hash = hash.to_ascii_lowercase();
            announcements.insert(
                hash.clone(),
                AvailabilityAnnouncement {
                    info_hash: hash,
                    files,
                    cached,
                    store: "premiumize".to_string(),
                },
            );
        }
        debug!(
            "premiumize: {} of {} hashes known ({} transcoded)",
            announcements.len(),
            hashes.len(),
            announcements.values().filter(|a| a.cached).count()
        );
        Ok(announcements)
    }

    async fn add_magnet(&self, magnet: &str, _client_ip: Option<&str>) -> Result<MagnetAdd> {
        let response = self
            .http
            .post_form(
                &self.url("/transfer/create"),
                &[],
                vec![("src".to_string(), magnet.to_string())],
            )
            .await?
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "premiumize".to_string(),
                error: "empty transfer/create response".to_string(),
            })?;
        let id = response["id"]
            .as_str()
            .map(String::from)
            .or_else(|| response["id"].as_u64().map(|v| v.to_string()))
            .unwrap_or_default();
        Ok(MagnetAdd {
            id,
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

        let response = match self
            .http
            .post_form(
                &self.url("/transfer/directdl"),
                &[],
                vec![("src".to_string(), magnet)],
            )
            .await
        {
            Ok(value) => value,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("premiumize directdl rejected: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some(response) = response else {
            return Ok(None);
        };
        if response["status"].as_str() != Some("success") {
            debug!("premiumize has no direct download: {}", response["message"]);
            return Ok(None);
        }
        let content = response["content"].as_array().cloned().unwrap_or_default();
        let candidates: Vec<FileCandidate> = content
            .iter()
            .enumerate()
            .map(|(index, entry)| FileCandidate {
                file_index: index as u32,
                file_name: entry["path"].as_str().unwrap_or("").to_string(),
                size_bytes: entry["size"].as_u64().unwrap_or(0),
            })
            .collect();
        let selected = choose_file(&candidates, query)?;
        let entry = &content[selected.file_index as usize];
        Ok(entry["stream_link"]
            .as_str()
            .or_else(|| entry["link"].as_str())
            .map(String::from))
    }

    async fn start_background_caching(&self, magnet: &str) -> bool {
        match self.add_magnet(magnet, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!("premiumize background caching failed: {e}");
                false
            }
        }
    }
}
