//! In-memory cache store with TTL support
//!
//! Backs tests and degraded single-process operation. Semantics mirror
//! the Redis store: expired entries behave as absent, locks are
//! first-caller-wins with TTL, releases never fail.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use streamarr_core::traits::CacheStore;
use streamarr_core::Result;
use tracing::trace;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                trace!("cache hit for key: {key}");
                Ok(Some(entry.value.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > Instant::now());
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        trace!("cached value for key: {key} with TTL {ttl:?}");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
