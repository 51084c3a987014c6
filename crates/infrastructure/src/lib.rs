//! Streamarr infrastructure module
//!
//! Concrete backends for the core traits: the Redis cache store that
//! carries all cross-request state (keys, locks, invalidation flags),
//! an in-memory store for tests and degraded operation, and the
//! Postgres API-key repository (consumed, not owned).

pub mod api_keys;
pub mod memory;
pub mod redis_store;

pub use api_keys::{ApiKeyRecord, ApiKeyRepository};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
