//! Real-Debrid client

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
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";
const READY_WAIT: Duration = Duration::from_secs(60);
const READY_INTERVAL: Duration = Duration::from_secs(1);

pub struct RealDebridClient {
    http: DebridHttp,
    token: String,
    base_url: String,
}

impl RealDebridClient {
    pub fn new(client: reqwest::Client, token: &str) -> Self {
        Self::with_base_url(client, token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, token: &str, base_url: &str) -> Self {
        RealDebridClient {
            http: DebridHttp::new(client, "real-debrid"),
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), format!("Bearer {}", self.token))]
    }

    fn ip_param(client_ip: Option<&str>) -> Vec<(String, String)> {
        client_ip
            .map(|ip| vec![("ip".to_string(), ip.to_string())])
            .unwrap_or_default()
    }

    async fn torrent_info(&self, id: &str) -> Result<Option<Value>> {
        self.http
            .get_json(&format!("{}/torrents/info/{id}", self.base_url), &self.headers())
            .await
    }

    fn files_from_info(info: &Value) -> Vec<FileCandidate> {
        info["files"]
            .as_array()
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| {
                        Some(FileCandidate {
                            file_index: f["id"].as_u64()? as u32,
                            file_name: f["path"]
                                .as_str()?
                                .trim_start_matches('/')
                                .to_string(),
                            size_bytes: f["bytes"].as_u64().unwrap_or(0),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DebridClient for RealDebridClient {
    fn code(&self) -> String {
        "RD".to_string()
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::RealDebrid
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
        // One path segment per hash, batched to keep URLs bounded
        for chunk in hashes.chunks(100) {
            let url = format!(
                "{}/torrents/instantAvailability/{}",
                self.base_url,
                chunk.join("/")
            );
            let response = match self.http.get_json(&url, &self.headers()).await {
                Ok(value) => value,
                Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                    warn!("real-debrid availability check rejected: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(Value::Object(by_hash)) = response else {
                continue;
            };
            for (hash, details) in by_hash {
                let Some(variants) = details["rd"].as_array() else {
                    continue;
                };
                if variants.is_empty() {
                    continue;
                }
                let mut files = Vec::new();
                for variant in variants {
                    let Some(variant) = variant.as_object() else {
                        continue;
                    };
                    for (index, file) in variant {
                        let Ok(file_index) = index.parse::<u32>() else {
                            continue;
                        };
                        if files
                            .iter()
                            .any(|f: &AnnouncedFile| f.file_index == file_index)
                        {
                            continue;
                        }
                        files.push(AnnouncedFile {
                            file_index,
                            file_name: file["filename"].as_str().unwrap_or("").to_string(),
                            size_bytes: file["filesize"].as_u64().unwrap_or(0),
                        });
                    }
                }
                let hash = hash.to_ascii_lowercase();
                announcements.insert(
                    hash.clone(),
                    AvailabilityAnnouncement {
                        info_hash: hash,
                        files,
                        cached: true,
                        store: "realdebrid".to_string(),
                    },
                );
            }
        }
        debug!(
            "real-debrid: {} of {} hashes instantly available",
            announcements.len(),
            hashes.len()
        );
        Ok(announcements)
    }

    async fn add_magnet(&self, magnet: &str, client_ip: Option<&str>) -> Result<MagnetAdd> {
        let mut form = vec![("magnet".to_string(), magnet.to_string())];
        form.extend(Self::ip_param(client_ip));
        let added = self
            .http
            .post_form(
                &format!("{}/torrents/addMagnet", self.base_url),
                &self.headers(),
                form,
            )
            .await?
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "real-debrid".to_string(),
                error: "empty addMagnet response".to_string(),
            })?;
        let id = added["id"]
            .as_str()
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "real-debrid".to_string(),
                error: "addMagnet response missing id".to_string(),
            })?
            .to_string();
        let files = match self.torrent_info(&id).await? {
            Some(info) => Self::files_from_info(&info),
            None => Vec::new(),
        };
        Ok(MagnetAdd { id, files })
    }

    async fn get_stream_link(
        &self,
        query: &PlaybackQuery,
        client_ip: Option<&str>,
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

        let added = match self.add_magnet(&magnet, client_ip).await {
            Ok(added) => added,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("real-debrid rejected magnet: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let selected = choose_file(&added.files, query)?;
        info!(
            "real-debrid: selected file {} ({})",
            selected.file_index, selected.file_name
        );
        self.http
            .post_form(
                &format!("{}/torrents/selectFiles/{}", self.base_url, added.id),
                &self.headers(),
                vec![("files".to_string(), selected.file_index.to_string())],
            )
            .await?;

        // Wait for the torrent to report a link for the selected file
        let deadline = tokio::time::Instant::now() + READY_WAIT;
        let link = loop {
            if let Some(info) = self.torrent_info(&added.id).await? {
                let status = info["status"].as_str().unwrap_or("");
                let links = info["links"].as_array().cloned().unwrap_or_default();
                if status == "downloaded" && !links.is_empty() {
                    break links[0].as_str().map(String::from);
                }
                if matches!(status, "error" | "magnet_error" | "dead") {
                    warn!("real-debrid torrent {} failed with status {status}", added.id);
                    break None;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("real-debrid torrent {} not ready in time", added.id);
                break None;
            }
            tokio::time::sleep(READY_INTERVAL).await;
        };
        let Some(link) = link else {
            return Ok(None);
        };

        let mut form = vec![("link".to_string(), link)];
        form.extend(Self::ip_param(client_ip));
        let unrestricted = self
            .http
            .post_form(
                &format!("{}/unrestrict/link", self.base_url),
                &self.headers(),
                form,
            )
            .await?;
        Ok(unrestricted
            .and_then(|v| v["download"].as_str().map(String::from)))
    }

    async fn start_background_caching(&self, magnet: &str) -> bool {
        match self.add_magnet(magnet, None).await {
            Ok(added) => {
                let result = self
                    .http
                    .post_form(
                        &format!("{}/torrents/selectFiles/{}", self.base_url, added.id),
                        &self.headers(),
                        vec![("files".to_string(), "all".to_string())],
                    )
                    .await;
                result.is_ok()
            }
            Err(e) => {
                warn!("real-debrid background caching failed: {e}");
                false
            }
        }
    }
}
