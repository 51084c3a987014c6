//! Per-request indexer pipeline assembly
//!
//! Priority order: community cache first (cheapest, most likely cached
//! at the debrids), then the Zilean aggregated database, then Jackett.
//! Each stage only runs while the result floor is unmet, which the
//! orchestrator enforces.

use crate::{JackettClient, PublicCacheIndexer, ZileanClient};
use std::sync::Arc;
use streamarr_core::models::UserConfig;
use streamarr_core::traits::{CacheStore, IndexerClient, IndexerSelector};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct IndexerEndpoints {
    pub zilean_url: Option<String>,
    pub jackett_url: Option<String>,
    pub jackett_api_key: Option<String>,
}

pub struct IndexerRegistry {
    client: reqwest::Client,
    store: Arc<dyn CacheStore>,
    endpoints: IndexerEndpoints,
    /// One Zilean client per process so its local cache survives requests
    zilean: Option<Arc<ZileanClient>>,
}

impl IndexerRegistry {
    pub fn new(
        client: reqwest::Client,
        store: Arc<dyn CacheStore>,
        endpoints: IndexerEndpoints,
    ) -> Self {
        let zilean = endpoints
            .zilean_url
            .as_deref()
            .map(|url| Arc::new(ZileanClient::new(client.clone(), url)));
        IndexerRegistry {
            client,
            store,
            endpoints,
            zilean,
        }
    }
}

impl IndexerSelector for IndexerRegistry {
    fn for_config(&self, config: &UserConfig) -> Vec<Arc<dyn IndexerClient>> {
        let mut indexers: Vec<Arc<dyn IndexerClient>> = Vec::new();

        if config.cache {
            indexers.push(Arc::new(PublicCacheIndexer::new(self.store.clone())));
        }
        if config.zilean {
            if let Some(zilean) = &self.zilean {
                indexers.push(zilean.clone());
            }
        }
        if config.jackett {
            if let (Some(url), Some(key)) = (
                self.endpoints.jackett_url.as_deref(),
                self.endpoints.jackett_api_key.as_deref(),
            ) {
                indexers.push(Arc::new(JackettClient::new(self.client.clone(), url, key)));
            }
        }

        debug!(
            "indexer pipeline: {:?}",
            indexers.iter().map(|i| i.name()).collect::<Vec<_>>()
        );
        indexers
    }
}
