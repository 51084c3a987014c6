//! StremThru aggregator client
//!
//! A DebridClient that fronts several stores behind a single upstream
//! gateway. The store name and bearer token travel as dedicated headers
//! on every request; availability codes come back as `ST:<XX>` where
//! `<XX>` is the underlying store's 2-letter code.

use crate::http::DebridHttp;
use crate::selection::choose_file;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use streamarr_core::models::{
    AnnouncedFile, AvailabilityAnnouncement, PlaybackQuery, StoreName, UserConfig,
};
use streamarr_core::parsing::FileCandidate;
use streamarr_core::traits::{DebridClient, MagnetAdd, ProviderKind};
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, info, warn};

const CHECK_CHUNK: usize = 50;

/// Token auto-detection order when no store is pinned
const AUTO_DETECT_ORDER: [StoreName; 4] = [
    StoreName::RealDebrid,
    StoreName::Premiumize,
    StoreName::Torbox,
    StoreName::AllDebrid,
];

pub struct StremThruClient {
    http: DebridHttp,
    base_url: String,
    store: StoreName,
    token: String,
}

impl StremThruClient {
    pub fn new(
        client: reqwest::Client,
        gateway_url: &str,
        store: StoreName,
        token: &str,
    ) -> Self {
        StremThruClient {
            http: DebridHttp::new(client, format!("stremthru-{}", store.as_str())),
            base_url: format!("{}/v0/store", gateway_url.trim_end_matches('/')),
            store,
            token: token.to_string(),
        }
    }

    /// Pick the store from the first valid token, in priority order.
    pub fn auto_detect(
        client: reqwest::Client,
        gateway_url: &str,
        config: &UserConfig,
    ) -> Option<Self> {
        for store in AUTO_DETECT_ORDER {
            if let Some(token) = config.token_for(store).filter(|t| t.is_valid()) {
                info!("stremthru: auto-detected store {}", store.as_str());
                return Some(Self::new(client, gateway_url, store, token.secret()));
            }
        }
        warn!("stremthru: no usable store token found");
        None
    }

    pub fn store(&self) -> StoreName {
        self.store
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "X-StremThru-Store-Name".to_string(),
                self.store.as_str().to_string(),
            ),
            (
                "X-StremThru-Store-Authorization".to_string(),
                format!("Bearer {}", self.token),
            ),
            ("User-Agent".to_string(), "streamarr".to_string()),
        ]
    }

    fn ip_suffix(client_ip: Option<&str>, first: bool) -> String {
        match client_ip {
            Some(ip) => format!("{}client_ip={ip}", if first { "?" } else { "&" }),
            None => String::new(),
        }
    }

    fn files_from_value(files: &Value) -> Vec<AnnouncedFile> {
        files
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|file| {
                        let index = file["index"].as_i64()?;
                        if index < 0 {
                            return None;
                        }
                        Some(AnnouncedFile {
                            file_index: index as u32,
                            file_name: file["name"].as_str().unwrap_or("").to_string(),
                            size_bytes: file["size"].as_u64().unwrap_or(0),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn magnet_info(&self, magnet_id: &str, client_ip: Option<&str>) -> Result<Option<Value>> {
        let url = format!(
            "{}/magnets/{magnet_id}{}",
            self.base_url,
            Self::ip_suffix(client_ip, true)
        );
        let response = self.http.get_json(&url, &self.headers()).await?;
        Ok(response.map(|v| v["data"].clone()))
    }
}

#[async_trait]
impl DebridClient for StremThruClient {
    fn code(&self) -> String {
        format!("ST:{}", self.store.code())
    }

    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Aggregator
    }

    async fn check_availability_bulk(
        &self,
        hashes: &[String],
        client_ip: Option<&str>,
    ) -> Result<HashMap<String, AvailabilityAnnouncement>> {
        let mut announcements = HashMap::new();
        if hashes.is_empty() {
            return Ok(announcements);
        }
        for chunk in hashes.chunks(CHECK_CHUNK) {
            // The gateway takes comma-separated magnet URIs
            let magnets: Vec<String> = chunk
                .iter()
                .map(|hash| {
                    if hash.starts_with("magnet:") {
                        urlencoding::encode(hash).into_owned()
                    } else {
                        let clean = hash.to_ascii_lowercase();
                        let clean = if clean.len() > 40 { &clean[..40] } else { &clean };
                        urlencoding::encode(&format!("magnet:?xt=urn:btih:{clean}")).into_owned()
                    }
                })
                .collect();
            let url = format!(
                "{}/magnets/check?magnet={}{}",
                self.base_url,
                magnets.join(","),
                Self::ip_suffix(client_ip, false)
            );
            let response = match self.http.get_json(&url, &self.headers()).await {
                Ok(value) => value,
                Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                    warn!("stremthru check rejected for store {}: {e}", self.store.as_str());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Some(response) = response else {
                continue;
            };
            let Some(items) = response["data"]["items"].as_array() else {
                continue;
            };
            for item in items {
                let Some(hash) = item["hash"].as_str() else {
                    continue;
                };
                let hash = hash.to_ascii_lowercase();
                // Explicit flag when present; a missing flag means cached
                let cached = match (item["status"].as_str(), item["cached"].as_bool()) {
                    (Some(status), _) => status == "cached",
                    (None, Some(flag)) => flag,
                    (None, None) => true,
                };
                announcements.insert(
                    hash.clone(),
                    AvailabilityAnnouncement {
                        info_hash: hash,
                        files: Self::files_from_value(&item["files"]),
                        cached,
                        store: self.store.as_str().to_string(),
                    },
                );
            }
        }
        debug!(
            "stremthru[{}]: {} of {} hashes announced",
            self.store.as_str(),
            announcements.len(),
            hashes.len()
        );
        Ok(announcements)
    }

    async fn add_magnet(&self, magnet: &str, client_ip: Option<&str>) -> Result<MagnetAdd> {
        let magnet = if magnet.starts_with("magnet:") {
            magnet.to_string()
        } else {
            format!("magnet:?xt=urn:btih:{magnet}")
        };
        let url = format!(
            "{}/magnets{}",
            self.base_url,
            Self::ip_suffix(client_ip, true)
        );
        let response = self
            .http
            .post_json(&url, &self.headers(), json!({ "magnet": magnet }))
            .await?
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: format!("stremthru-{}", self.store.as_str()),
                error: "empty magnet add response".to_string(),
            })?;
        let data = &response["data"];
        let id = data["id"]
            .as_str()
            .map(String::from)
            .or_else(|| data["id"].as_u64().map(|v| v.to_string()))
            .ok_or_else(|| StreamarrError::ProviderTransient {
                service: format!("stremthru-{}", self.store.as_str()),
                error: "magnet add response missing id".to_string(),
            })?;
        let files = Self::files_from_value(&data["files"])
            .into_iter()
            .map(|f| FileCandidate {
                file_index: f.file_index,
                file_name: f.file_name,
                size_bytes: f.size_bytes,
            })
            .collect();
        Ok(MagnetAdd { id, files })
    }

    async fn get_stream_link(
        &self,
        query: &PlaybackQuery,
        client_ip: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(hash) = query.resolved_info_hash() else {
            return Err(StreamarrError::InvalidRequest {
                message: "playback query carries no magnet or hash".to_string(),
            });
        };
        let magnet = query
            .magnet
            .clone()
            .unwrap_or_else(|| format!("magnet:?xt=urn:btih:{hash}"));

        let added = match self.add_magnet(&magnet, client_ip).await {
            Ok(added) => added,
            Err(e) if matches!(e, StreamarrError::ProviderClientError { .. }) => {
                warn!("stremthru rejected magnet {hash}: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        // Full file entries carry the per-file link needed for generation
        let data = match self.magnet_info(&added.id, client_ip).await? {
            Some(data) if data["files"].as_array().is_some_and(|f| !f.is_empty()) => data,
            _ => {
                debug!("stremthru magnet {} has no file listing yet", added.id);
                return Ok(None);
            }
        };
        let files = data["files"].as_array().cloned().unwrap_or_default();
        let candidates: Vec<FileCandidate> = files
            .iter()
            .filter_map(|file| {
                let index = file["index"].as_i64()?;
                if index < 0 {
                    return None;
                }
                Some(FileCandidate {
                    file_index: index as u32,
                    file_name: file["name"].as_str().unwrap_or("").to_string(),
                    size_bytes: file["size"].as_u64().unwrap_or(0),
                })
            })
            .collect();
        let selected = choose_file(&candidates, query)?;
        let Some(file_link) = files
            .iter()
            .find(|f| f["index"].as_i64() == Some(i64::from(selected.file_index)))
            .and_then(|f| f["link"].as_str())
        else {
            warn!(
                "stremthru file {} of magnet {} has no link",
                selected.file_index, added.id
            );
            return Ok(None);
        };

        let url = format!(
            "{}/link/generate{}",
            self.base_url,
            Self::ip_suffix(client_ip, true)
        );
        let response = self
            .http
            .post_json(&url, &self.headers(), json!({ "link": file_link }))
            .await?;
        let link = response.and_then(|v| v["data"]["link"].as_str().map(String::from));
        if let Some(link) = &link {
            info!(
                "stremthru[{}]: generated link for {hash}: {}...",
                self.store.as_str(),
                &link[..link.len().min(60)]
            );
        }
        Ok(link)
    }

    async fn start_background_caching(&self, magnet: &str) -> bool {
        match self.add_magnet(magnet, None).await {
            Ok(added) => {
                info!(
                    "stremthru[{}]: background caching started, id {}",
                    self.store.as_str(),
                    added.id
                );
                true
            }
            Err(e) => {
                warn!("stremthru background caching failed: {e}");
                false
            }
        }
    }
}
