//! Per-request debrid client construction
//!
//! Tokens live in the user's request config, so clients are built per
//! request from a shared HTTP connection pool. The registry resolves
//! service codes for playback, assembles the availability fan-out set,
//! and picks the download service with token-validity fallback.

use crate::{
    AllDebridClient, PremiumizeClient, RealDebridClient, StremThruClient, TorboxClient,
};
use std::sync::Arc;
use streamarr_core::models::{StoreName, UserConfig};
use streamarr_core::traits::{DebridClient, DebridSelector};
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, info, warn};

/// Fallback order when the configured downloader has no usable token
const DOWNLOADER_FALLBACK: [StoreName; 4] = [
    StoreName::Torbox,
    StoreName::RealDebrid,
    StoreName::AllDebrid,
    StoreName::Premiumize,
];

pub struct DebridRegistry {
    client: reqwest::Client,
    default_stremthru_url: Option<String>,
}

impl DebridRegistry {
    pub fn new(client: reqwest::Client, default_stremthru_url: Option<String>) -> Self {
        DebridRegistry {
            client,
            default_stremthru_url,
        }
    }

    fn stremthru_url<'a>(&'a self, config: &'a UserConfig) -> Option<&'a str> {
        config
            .stremthru_url
            .as_deref()
            .or(self.default_stremthru_url.as_deref())
    }

    fn direct_client(
        &self,
        config: &UserConfig,
        store: StoreName,
    ) -> Result<Arc<dyn DebridClient>> {
        let token = config
            .token_for(store)
            .filter(|t| t.is_valid())
            .ok_or_else(|| StreamarrError::ConfigurationError {
                field: "service".to_string(),
                message: format!("no token configured for {}", store.as_str()),
            })?;
        let secret = token.secret();
        Ok(match store {
            StoreName::RealDebrid => Arc::new(RealDebridClient::new(self.client.clone(), secret)),
            StoreName::AllDebrid => Arc::new(AllDebridClient::new(self.client.clone(), secret)),
            StoreName::Premiumize => Arc::new(PremiumizeClient::new(self.client.clone(), secret)),
            StoreName::Torbox => Arc::new(TorboxClient::new(self.client.clone(), secret)),
            other => {
                return Err(StreamarrError::ConfigurationError {
                    field: "service".to_string(),
                    message: format!("{} is only reachable through the aggregator", other.as_str()),
                })
            }
        })
    }

    fn aggregated_client(
        &self,
        config: &UserConfig,
        store: StoreName,
    ) -> Result<Arc<dyn DebridClient>> {
        let url = self
            .stremthru_url(config)
            .ok_or_else(|| StreamarrError::ConfigurationError {
                field: "stremthru_url".to_string(),
                message: "aggregator enabled without a gateway URL".to_string(),
            })?;
        let token = config
            .token_for(store)
            .filter(|t| t.is_valid())
            .ok_or_else(|| StreamarrError::ConfigurationError {
                field: "service".to_string(),
                message: format!("no token configured for store {}", store.as_str()),
            })?;
        Ok(Arc::new(StremThruClient::new(
            self.client.clone(),
            url,
            store,
            token.secret(),
        )))
    }

    /// The downloader store after token-validity substitution.
    fn downloader_store(&self, config: &UserConfig) -> Result<StoreName> {
        let configured = config
            .debrid_downloader
            .as_deref()
            .and_then(|name| StoreName::parse(name).or_else(|| StoreName::from_code(name)))
            .or_else(|| {
                // A single enabled service is an unambiguous downloader
                if config.service.len() == 1 {
                    StoreName::parse(&config.service[0])
                        .or_else(|| StoreName::from_code(&config.service[0]))
                } else {
                    None
                }
            })
            .ok_or_else(|| StreamarrError::ConfigurationError {
                field: "debridDownloader".to_string(),
                message: "multiple services enabled; select a download service".to_string(),
            })?;

        if config.has_valid_token(configured) {
            return Ok(configured);
        }
        for store in DOWNLOADER_FALLBACK {
            if config.has_valid_token(store) {
                warn!(
                    "no valid token for {}, substituting {}",
                    configured.as_str(),
                    store.as_str()
                );
                return Ok(store);
            }
        }
        Err(StreamarrError::ConfigurationError {
            field: "debridDownloader".to_string(),
            message: "no service has a usable token".to_string(),
        })
    }
}

impl DebridSelector for DebridRegistry {
    fn all_for(&self, config: &UserConfig) -> Vec<Arc<dyn DebridClient>> {
        let mut clients: Vec<Arc<dyn DebridClient>> = Vec::new();
        let mut seen: Vec<StoreName> = Vec::new();

        if config.has_aggregator() {
            if let Some(url) = self.stremthru_url(config) {
                if let Some(aggregated) =
                    StremThruClient::auto_detect(self.client.clone(), url, config)
                {
                    clients.push(Arc::new(aggregated));
                }
            }
        }

        for name in &config.service {
            let Some(store) = StoreName::parse(name).or_else(|| StoreName::from_code(name)) else {
                warn!("unknown debrid service '{name}' in config");
                continue;
            };
            if seen.contains(&store) {
                continue;
            }
            seen.push(store);
            match self.direct_client(config, store) {
                Ok(client) => clients.push(client),
                Err(e) => debug!("skipping {}: {e}", store.as_str()),
            }
        }

        info!(
            "debrid fan-out set: {:?}",
            clients.iter().map(|c| c.code()).collect::<Vec<_>>()
        );
        clients
    }

    fn for_service(&self, config: &UserConfig, service: &str) -> Result<Arc<dyn DebridClient>> {
        if let Some(store_code) = service.strip_prefix("ST:") {
            let store =
                StoreName::from_code(store_code).ok_or_else(|| StreamarrError::InvalidRequest {
                    message: format!("unknown aggregator store code: {service}"),
                })?;
            if config.has_aggregator() || self.default_stremthru_url.is_some() {
                return self.aggregated_client(config, store);
            }
            // Aggregator disabled but an aggregator code arrived; try the
            // underlying store directly.
            return self.direct_client(config, store);
        }
        if service == "DL" {
            return self.downloader_for(config);
        }
        let store = StoreName::from_code(service).ok_or_else(|| StreamarrError::InvalidRequest {
            message: format!("unknown service code: {service}"),
        })?;
        self.direct_client(config, store)
    }

    fn downloader_for(&self, config: &UserConfig) -> Result<Arc<dyn DebridClient>> {
        let store = self.downloader_store(config)?;
        if config.has_aggregator() {
            if let Ok(client) = self.aggregated_client(config, store) {
                return Ok(client);
            }
        }
        self.direct_client(config, store)
    }
}
