//! Community result cache as an indexer
//!
//! Public torrents from earlier searches are published back to the
//! shared cache; reading them first often satisfies the result floor
//! without touching any upstream indexer.

use async_trait::async_trait;
use std::sync::Arc;
use streamarr_core::keys;
use streamarr_core::models::{MediaRequest, RawResult};
use streamarr_core::traits::{CacheStore, IndexerClient};
use streamarr_core::Result;
use tracing::debug;

const INDEXER_NAME: &str = "public-cache";

pub struct PublicCacheIndexer {
    store: Arc<dyn CacheStore>,
}

impl PublicCacheIndexer {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        PublicCacheIndexer { store }
    }
}

#[async_trait]
impl IndexerClient for PublicCacheIndexer {
    fn name(&self) -> &str {
        INDEXER_NAME
    }

    async fn search(&self, media: &MediaRequest) -> Result<Vec<RawResult>> {
        let key = keys::public_cache_key(media);
        let results: Vec<RawResult> = self
            .store
            .as_ref()
            .get_json(&key)
            .await?
            .unwrap_or_default();
        debug!("public cache: {} results under {key}", results.len());
        Ok(results)
    }
}
