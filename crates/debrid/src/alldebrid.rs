//! AllDebrid client
//!
//! AllDebrid treats a recognized magnet as instantly playable; file
//! details arrive as a nested folder tree that gets flattened here with
//! a running file index.

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

const DEFAULT_BASE_URL: &str = "https://api.alldebrid.com/v4";
const AGENT: &str = "streamarr";
const READY_WAIT: Duration = Duration::from_secs(60);
const READY_INTERVAL: Duration = Duration::from_secs(1);

pub struct AllDebridClient {
    http: DebridHttp,
    token: String,
    base_url: String,
}

impl AllDebridClient {
    pub fn new(client: reqwest::Client, token: &str) -> Self {
        Self::with_base_url(client, token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, token: &str, base_url: &str) -> Self {
        AllDebridClient {
            http: DebridHttp::new(client, "alldebrid"),
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str, extra: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{}?agent={}&apikey={}",
            self.base_url, endpoint, AGENT, self.token
        );
        for (name, value) in extra {
            url.push_str(&format!("&{name}={}", urlencoding::encode(value)));
        }
        url
    }

    /// Flatten the `files`/`e` folder nesting into indexed candidates.
    fn flatten_files(nodes: &[Value], files: &mut Vec<FileCandidate>, next_index: &mut u32) {
        for node in nodes {
            if let Some(children) = node["e"].as_array() {
                Self::flatten_files(children, files, next_index);
                continue;
            }
            let name = node["n"].as_str().unwrap_or("").to_string();
            files.push(FileCandidate {
                file_index: *next_index,
                file_name: name,
                size_bytes: node["s"].as_u64().unwrap_or(0),
            });
            *next_index += 1;
        }
    }

    fn announced(files: &[FileCandidate]) -> Vec<AnnouncedFile> {
        files
            .iter()
            .map(|f| AnnouncedFile {
                file_index: f.file_index,
                file_name: f.file_name.clone(),
                size_bytes: f.size_bytes,
            })
            .collect()
    }
}

#[async_trait]
impl DebridClient for AllDebridClient {
    fn code(&self) -> String {
        "AD".to_string()
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::AllDebrid
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
        let form: Vec<(String, String)> = hashes
            .iter()
            .map(|h| ("magnets[]".to_string(), h.clone()))
            .collect();
        let response = match self
            .http
            .post_form(&self.url("/magnet/instant", &[]), &[], form)
            .await
        {
            Ok(value) => value,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("alldebrid availability check rejected: {e}");
                return Ok(announcements);
            }
            Err(e) => return Err(e),
        };
        let Some(response) = response else {
            return Ok(announcements);
        };
        if response["status"].as_str() != Some("success") {
            warn!("alldebrid API error: {}", response["error"]["message"]);
            return Ok(announcements);
        }
        let Some(magnets) = response["data"]["magnets"].as_array() else {
            return Ok(announcements);
        };
        for magnet in magnets {
            if magnet["instant"].as_bool() != Some(true) {
                continue;
            }
            let Some(hash) = magnet["hash"].as_str() else {
                continue;
            };
            let hash = hash.to_ascii_lowercase();
            let mut files = Vec::new();
            if let Some(nodes) = magnet["files"].as_array() {
                let mut index = 0;
                Self::flatten_files(nodes, &mut files, &mut index);
            }
            announcements.insert(
                hash.clone(),
                AvailabilityAnnouncement {
                    info_hash: hash,
                    files: Self::announced(&files),
                    cached: true,
                    store: "alldebrid".to_string(),
                },
            );
        }
        debug!(
            "alldebrid: {} of {} hashes instant",
            announcements.len(),
            hashes.len()
        );
        Ok(announcements)
    }

    async fn add_magnet(&self, magnet: &str, _client_ip: Option<&str>) -> Result<MagnetAdd> {
        let response = self
            .http
            .get_json(&self.url("/magnet/upload", &[("magnets[]", magnet)]), &[])
            .await?
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "alldebrid".to_string(),
                error: "empty upload response".to_string(),
            })?;
        let id = response["data"]["magnets"][0]["id"]
            .as_u64()
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: "alldebrid".to_string(),
                error: "upload response missing magnet id".to_string(),
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
                warn!("alldebrid rejected magnet: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Wait for Ready status, collecting the link list
        let deadline = tokio::time::Instant::now() + READY_WAIT;
        let links = loop {
            let status = self
                .http
                .get_json(&self.url("/magnet/status", &[("id", &added.id)]), &[])
                .await?;
            if let Some(status) = status {
                let magnet_status = &status["data"]["magnets"];
                if magnet_status["status"].as_str() == Some("Ready") {
                    break magnet_status["links"].as_array().cloned().unwrap_or_default();
                }
                if matches!(
                    magnet_status["status"].as_str(),
                    Some("Error") | Some("File too big") | Some("Upload fail")
                ) {
                    warn!("alldebrid magnet {} failed", added.id);
                    return Ok(None);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                debug!("alldebrid magnet {} not ready in time", added.id);
                return Ok(None);
            }
            tokio::time::sleep(READY_INTERVAL).await;
        };

        let candidates: Vec<FileCandidate> = links
            .iter()
            .enumerate()
            .map(|(index, link)| FileCandidate {
                file_index: index as u32,
                file_name: link["filename"].as_str().unwrap_or("").to_string(),
                size_bytes: link["size"].as_u64().unwrap_or(0),
            })
            .collect();
        let selected = choose_file(&candidates, query)?;
        let Some(locked_link) = links[selected.file_index as usize]["link"].as_str() else {
            return Ok(None);
        };

        let unlocked = self
            .http
            .get_json(&self.url("/link/unlock", &[("link", locked_link)]), &[])
            .await?;
        Ok(unlocked.and_then(|v| v["data"]["link"].as_str().map(String::from)))
    }

    async fn start_background_caching(&self, magnet: &str) -> bool {
        match self.add_magnet(magnet, None).await {
            Ok(_) => true,
            Err(e) => {
                warn!("alldebrid background caching failed: {e}");
                false
            }
        }
    }
}
