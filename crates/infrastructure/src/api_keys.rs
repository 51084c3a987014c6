//! API key validation against Postgres
//!
//! The key table is owned by the management layer; the pipeline only
//! reads it to gate requests and touches usage counters best-effort.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::Row;
use streamarr_core::traits::ApiKeyValidator;
use streamarr_core::{Result, StreamarrError};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: i64,
    pub api_key: Uuid,
    pub is_active: bool,
    pub never_expire: bool,
    pub expiration_date: Option<i64>,
    pub latest_query_date: Option<i64>,
    pub total_queries: i64,
    pub name: Option<String>,
    pub proxied_links: bool,
}

pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        ApiKeyRepository { pool }
    }

    pub async fn find(&self, api_key: &str) -> Result<Option<ApiKeyRecord>> {
        let parsed = Uuid::parse_str(api_key).map_err(|_| StreamarrError::Unauthorized)?;
        let row = sqlx::query(
            "SELECT id, api_key, is_active, never_expire, expiration_date, \
             latest_query_date, total_queries, name, proxied_links \
             FROM api_keys WHERE api_key = $1",
        )
        .bind(parsed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StreamarrError::DatabaseError {
            message: e.to_string(),
        })?;

        Ok(row.map(|row| ApiKeyRecord {
            id: row.get("id"),
            api_key: row.get("api_key"),
            is_active: row.get("is_active"),
            never_expire: row.get("never_expire"),
            expiration_date: row.get("expiration_date"),
            latest_query_date: row.get("latest_query_date"),
            total_queries: row.get("total_queries"),
            name: row.get("name"),
            proxied_links: row.get("proxied_links"),
        }))
    }

    async fn touch(&self, id: i64) {
        let result = sqlx::query(
            "UPDATE api_keys SET latest_query_date = $1, total_queries = total_queries + 1 \
             WHERE id = $2",
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!("failed to touch api key {id}: {e}");
        }
    }
}

#[async_trait]
impl ApiKeyValidator for ApiKeyRepository {
    async fn validate(&self, api_key: &str) -> Result<()> {
        let record = self
            .find(api_key)
            .await?
            .ok_or(StreamarrError::Unauthorized)?;
        if !record.is_active {
            debug!("api key {} is revoked", record.id);
            return Err(StreamarrError::Unauthorized);
        }
        if !record.never_expire {
            let expired = record
                .expiration_date
                .map(|when| when < Utc::now().timestamp())
                .unwrap_or(true);
            if expired {
                debug!("api key {} is expired", record.id);
                return Err(StreamarrError::Unauthorized);
            }
        }
        self.touch(record.id).await;
        Ok(())
    }
}
