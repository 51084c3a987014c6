//! Redis cache store
//!
//! Single source of shared mutable state. Locks are the standard
//! single-instance SETNX + TTL scheme; releases tolerate an already
//! expired lock.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use streamarr_core::traits::CacheStore;
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, info};

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(to_cache_error)?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(to_cache_error)?;
        info!("connected to Redis at {url}");
        Ok(RedisStore { connection })
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

fn to_cache_error(e: redis::RedisError) -> StreamarrError {
    StreamarrError::CacheError {
        message: e.to_string(),
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        connection.get(key).await.map_err(to_cache_error)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut connection = self.connection.clone();
        connection
            .set_ex(key, value, Self::ttl_secs(ttl))
            .await
            .map_err(to_cache_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: u64 = connection.del(key).await.map_err(to_cache_error)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut connection = self.connection.clone();
        connection.exists(key).await.map_err(to_cache_error)
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut connection = self.connection.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut connection)
            .await
            .map_err(to_cache_error)?;
        let owned = acquired.is_some();
        debug!("lock {key}: {}", if owned { "acquired" } else { "held elsewhere" });
        Ok(owned)
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        // Deleting an expired or absent lock is fine
        let _: std::result::Result<u64, _> = connection.del(key).await;
        Ok(())
    }
}
